// crates/tfstated-core/src/core/mod.rs
// ============================================================================
// Module: tfstated Core Types
// Description: Identifiers, records, lock payloads, and cryptographic helpers.
// Purpose: Provide stable, serializable types shared by every tfstated crate.
// Dependencies: serde, uuid, time, aes, cbc, argon2
// ============================================================================

//! ## Overview
//! Core types describe the persisted records of the state server. They are
//! plain data; all transactional behaviour lives in the store backends.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod crypto;
pub mod identifiers;
pub mod lock;
pub mod model;
pub mod password;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::SECONDS_PER_DAY;
pub use clock::unix_seconds;
pub use crypto::AES256_IV_SIZE;
pub use crypto::AES256_KEY_SIZE;
pub use crypto::Aes256Key;
pub use crypto::CryptoError;
pub use identifiers::AccountId;
pub use identifiers::IdentifierError;
pub use identifiers::StateId;
pub use identifiers::VersionId;
pub use lock::Lock;
pub use lock::LockError;
pub use model::Account;
pub use model::LockOutcome;
pub use model::State;
pub use model::Version;
pub use model::VersionSummary;
pub use model::WriteOutcome;
pub use password::PasswordError;
pub use password::generate_password;
pub use password::hash_password;
pub use password::verify_password;
