// crates/tfstated-core/src/core/model.rs
// ============================================================================
// Module: tfstated Records
// Description: States, versions, accounts, and operation outcomes.
// Purpose: Define the persisted entity model shared by store backends.
// Dependencies: crate::core::{identifiers, lock}
// ============================================================================

//! ## Overview
//! A [`State`] is one named document. Each successful write appends an
//! immutable [`Version`]; the version with the greatest identifier is the
//! current body. Accounts author versions. Timestamps are unix seconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::identifiers::AccountId;
use crate::core::identifiers::StateId;
use crate::core::identifiers::VersionId;
use crate::core::lock::Lock;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One named state document.
///
/// # Invariants
/// - `path` is unique across the store.
/// - At most one lock is held at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// State identifier.
    pub id: StateId,
    /// Unique state path.
    pub path: String,
    /// Lock currently held, if any.
    pub lock: Option<Lock>,
    /// Creation time in unix seconds.
    pub created: i64,
    /// Last write time in unix seconds.
    pub updated: i64,
}

/// Immutable snapshot of a state body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Version identifier.
    pub id: VersionId,
    /// Owning state.
    pub state_id: StateId,
    /// Authoring account.
    pub account_id: AccountId,
    /// Decrypted body bytes.
    pub body: Vec<u8>,
    /// Lock held on the state when the version was written.
    pub lock: Option<Lock>,
    /// Creation time in unix seconds.
    pub created: i64,
}

/// Version listing entry without the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSummary {
    /// Version identifier.
    pub id: VersionId,
    /// Owning state.
    pub state_id: StateId,
    /// Authoring account.
    pub account_id: AccountId,
    /// Lock held on the state when the version was written.
    pub lock: Option<Lock>,
    /// Creation time in unix seconds.
    pub created: i64,
    /// Size of the encrypted body in bytes.
    pub stored_bytes: u64,
}

/// Authenticated caller of the HTTP protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account identifier.
    pub id: AccountId,
    /// Unique username.
    pub username: String,
    /// Whether the account administers the server.
    pub is_admin: bool,
    /// Creation time in unix seconds.
    pub created: i64,
    /// Last successful authentication in unix seconds.
    pub last_login: Option<i64>,
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

/// Result of an acquire-or-inspect lock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The supplied lock is now held.
    Acquired,
    /// Another lock is held; the state is untouched.
    Held(Lock),
}

/// Result of a versioned write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The version was inserted and retention applied.
    Committed,
    /// The supplied token does not match the held lock; nothing was written.
    LockMismatch,
}
