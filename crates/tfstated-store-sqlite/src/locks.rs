// crates/tfstated-store-sqlite/src/locks.rs
// ============================================================================
// Module: SQLite Lock Coordinator
// Description: Acquire, release, and force-unlock over the per-state lock.
// Purpose: Give Terraform clients an exclusive advisory lock per state path.
// Dependencies: tfstated-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! The lock lives in the `lock` column of the state row as the canonical
//! serialized [`Lock`]. Acquire reads and sets it inside one write
//! transaction, so two racing acquirers are serialized by the write handle and
//! exactly one wins. Release is a single compare-and-swap statement over the
//! serialized text. Locks never expire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use tfstated_core::Lock;
use tfstated_core::LockOutcome;
use tfstated_core::StateId;
use tfstated_core::StoreError;
use tfstated_core::unix_seconds;

use crate::states::parse_stored_lock;
use crate::store::SqliteStateStore;
use crate::store::TxOutcome;
use crate::store::db_error;

// ============================================================================
// SECTION: Lock Coordinator
// ============================================================================

impl SqliteStateStore {
    /// Acquires `lock` on `path`, creating the state when the path is unseen.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty lock ID and
    /// [`StoreError::Internal`] when persistence fails.
    pub fn acquire_lock(&self, path: &str, lock: &Lock) -> Result<LockOutcome, StoreError> {
        if lock.id.is_empty() {
            return Err(StoreError::Validation("lock id must not be empty".to_string()));
        }
        let lock_text = lock.to_json()?;
        self.with_transaction(|tx| -> Result<TxOutcome<LockOutcome>, StoreError> {
            let existing: Option<(String, Option<String>)> = tx
                .query_row("SELECT id, lock FROM states WHERE path = ?1", params![path], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()
                .map_err(|err| db_error(&err))?;
            match existing {
                None => {
                    let now = unix_seconds();
                    tx.execute(
                        "INSERT INTO states (id, path, lock, created, updated) VALUES (?1, ?2, \
                         ?3, ?4, ?4)",
                        params![StateId::generate().to_string(), path, lock_text, now],
                    )
                    .map_err(|err| db_error(&err))?;
                    tracing::debug!(path, lock_id = %lock.id, "lock acquired on new state");
                    Ok(TxOutcome::Commit(LockOutcome::Acquired))
                }
                Some((state_id, None)) => {
                    tx.execute(
                        "UPDATE states SET lock = ?1 WHERE id = ?2",
                        params![lock_text, state_id],
                    )
                    .map_err(|err| db_error(&err))?;
                    tracing::debug!(path, lock_id = %lock.id, "lock acquired");
                    Ok(TxOutcome::Commit(LockOutcome::Acquired))
                }
                Some((_, Some(held))) => {
                    let held = parse_stored_lock(&held)?;
                    tracing::debug!(path, held_by = %held.id, "lock already held");
                    Ok(TxOutcome::Rollback(LockOutcome::Held(held)))
                }
            }
        })
    }

    /// Releases the lock on `path` when the stored lock equals `lock`.
    ///
    /// Returns `false` when no state matched, which makes a repeated release
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when persistence fails.
    pub fn release_lock(&self, path: &str, lock: &Lock) -> Result<bool, StoreError> {
        let lock_text = lock.to_json()?;
        let released = self.with_transaction(|tx| -> Result<TxOutcome<bool>, StoreError> {
            let changed = tx
                .execute(
                    "UPDATE states SET lock = NULL WHERE path = ?1 AND lock = ?2",
                    params![path, lock_text],
                )
                .map_err(|err| db_error(&err))?;
            Ok(TxOutcome::Commit(changed == 1))
        })?;
        tracing::debug!(path, lock_id = %lock.id, released, "lock release");
        Ok(released)
    }

    /// Clears any lock on `path` without checking the token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when persistence fails.
    pub fn force_unlock_state(&self, path: &str) -> Result<bool, StoreError> {
        let cleared = self.with_transaction(|tx| -> Result<TxOutcome<bool>, StoreError> {
            let changed = tx
                .execute(
                    "UPDATE states SET lock = NULL WHERE path = ?1 AND lock IS NOT NULL",
                    params![path],
                )
                .map_err(|err| db_error(&err))?;
            Ok(TxOutcome::Commit(changed == 1))
        })?;
        if cleared {
            tracing::info!(path, "lock force-cleared");
        }
        Ok(cleared)
    }
}
