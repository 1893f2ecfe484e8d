// crates/tfstated-core/src/lib.rs
// ============================================================================
// Module: tfstated Core Library
// Description: Public API surface for the tfstated core.
// Purpose: Expose the entity model, lock record, codec, and store interfaces.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! tfstated core holds everything the remote state server agrees on regardless
//! of the storage backend: identifiers, the state/version/lock/account model,
//! the at-rest encryption codec, password hashing, and the store contracts the
//! HTTP layer programs against. Backends implement [`StateStore`] and
//! [`AccountStore`] and report failures through [`StoreError`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AccountStore;
pub use interfaces::SharedAccountStore;
pub use interfaces::SharedStateStore;
pub use interfaces::StateStore;
pub use interfaces::StoreError;
