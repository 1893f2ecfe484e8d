// crates/tfstated-core/src/interfaces/mod.rs
// ============================================================================
// Module: tfstated Interfaces
// Description: Backend-agnostic contracts for state and account storage.
// Purpose: Define the surfaces the HTTP protocol layer programs against.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The HTTP layer never touches SQL. It calls [`StateStore`] for the remote
//! state protocol and [`AccountStore`] for basic authentication. Both traits
//! are synchronous; async callers move them onto a blocking thread.
//! Implementations must fail closed: any persistence failure aborts the
//! enclosing transaction and surfaces as [`StoreError::Internal`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::crypto::CryptoError;
use crate::core::identifiers::AccountId;
use crate::core::identifiers::IdentifierError;
use crate::core::lock::Lock;
use crate::core::lock::LockError;
use crate::core::model::Account;
use crate::core::model::LockOutcome;
use crate::core::model::Version;
use crate::core::model::WriteOutcome;
use crate::core::password::PasswordError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Store error taxonomy shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("state store not found: {0}")]
    NotFound(String),
    /// A lock held by another client blocks the operation.
    #[error("state store lock conflict: {0}")]
    LockConflict(String),
    /// A state already exists at the path.
    #[error("state store duplicate path: {0}")]
    DuplicatePath(String),
    /// Caller input is invalid.
    #[error("state store invalid input: {0}")]
    Validation(String),
    /// Encryption or decryption failed.
    #[error("state store crypto error: {0}")]
    Crypto(String),
    /// Persistence failed or the backend is unusable.
    #[error("state store internal error: {0}")]
    Internal(String),
}

impl From<CryptoError> for StoreError {
    fn from(err: CryptoError) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<LockError> for StoreError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Malformed(_) | LockError::InvalidId(_) => Self::Validation(err.to_string()),
            LockError::Serialization(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<IdentifierError> for StoreError {
    fn from(err: IdentifierError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<PasswordError> for StoreError {
    fn from(err: PasswordError) -> Self {
        Self::Internal(err.to_string())
    }
}

// ============================================================================
// SECTION: State Store
// ============================================================================

/// Remote state storage with advisory locking and bounded history.
pub trait StateStore {
    /// Creates a state with its first version.
    ///
    /// Returns `None` without mutating anything when the path already exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence or encryption fails.
    fn create(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
    ) -> Result<Option<Version>, StoreError>;

    /// Returns the decrypted body of the current version.
    ///
    /// Unknown paths and states without versions read as empty bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence or decryption fails.
    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;

    /// Appends a version, checking `lock_id` against the held lock when non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence or encryption fails.
    fn write(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
        lock_id: &str,
    ) -> Result<WriteOutcome, StoreError>;

    /// Deletes a state and its versions. Returns whether a state was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn delete(&self, path: &str) -> Result<bool, StoreError>;

    /// Acquires the lock, or reports the lock already held.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lock is invalid or persistence fails.
    fn acquire_or_inspect(&self, path: &str, lock: &Lock) -> Result<LockOutcome, StoreError>;

    /// Releases the lock when the stored lock equals `lock`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn release(&self, path: &str, lock: &Lock) -> Result<bool, StoreError>;

    /// Clears any lock on the path without a token check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn force_unlock(&self, path: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Account Store
// ============================================================================

/// Account lookup for basic authentication.
pub trait AccountStore {
    /// Verifies credentials and records the login.
    ///
    /// Returns `None` for unknown users or wrong passwords.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persistence fails.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, StoreError>;
}

// ============================================================================
// SECTION: Shared Store Wrappers
// ============================================================================

/// Shared state store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedStateStore {
    /// Inner store implementation.
    inner: Arc<dyn StateStore + Send + Sync>,
}

impl SharedStateStore {
    /// Wraps a state store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl StateStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl StateStore for SharedStateStore {
    fn create(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
    ) -> Result<Option<Version>, StoreError> {
        self.inner.create(path, account_id, body)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.read(path)
    }

    fn write(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
        lock_id: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.inner.write(path, account_id, body, lock_id)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        self.inner.delete(path)
    }

    fn acquire_or_inspect(&self, path: &str, lock: &Lock) -> Result<LockOutcome, StoreError> {
        self.inner.acquire_or_inspect(path, lock)
    }

    fn release(&self, path: &str, lock: &Lock) -> Result<bool, StoreError> {
        self.inner.release(path, lock)
    }

    fn force_unlock(&self, path: &str) -> Result<bool, StoreError> {
        self.inner.force_unlock(path)
    }
}

/// Shared account store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedAccountStore {
    /// Inner store implementation.
    inner: Arc<dyn AccountStore + Send + Sync>,
}

impl SharedAccountStore {
    /// Wraps an account store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl AccountStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }
}

impl AccountStore for SharedAccountStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, StoreError> {
        self.inner.authenticate(username, password)
    }
}
