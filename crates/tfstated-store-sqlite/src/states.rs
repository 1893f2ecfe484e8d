// crates/tfstated-store-sqlite/src/states.rs
// ============================================================================
// Module: SQLite Version Store
// Description: State creation, reads, versioned writes, deletion, retention.
// Purpose: Persist encrypted state bodies with bounded version history.
// Dependencies: tfstated-core, rusqlite, tracing
// ============================================================================

//! ## Overview
//! Each successful write appends an encrypted version and then trims the
//! state's history. The trim keeps the `versions_history_limit` most recent
//! versions among those older than the age floor, plus every younger version,
//! and deletes the rest. The clock is sampled once per write: the new
//! version's timestamp, the state's `updated` touch, and the age cutoff all
//! use the same value.
//!
//! A write carrying a non-empty lock token is refused, without side effects,
//! when the token does not match the lock currently held on the state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Transaction;
use rusqlite::params;
use tfstated_core::AccountId;
use tfstated_core::Lock;
use tfstated_core::SECONDS_PER_DAY;
use tfstated_core::State;
use tfstated_core::StateId;
use tfstated_core::StoreError;
use tfstated_core::Version;
use tfstated_core::VersionId;
use tfstated_core::VersionSummary;
use tfstated_core::WriteOutcome;
use tfstated_core::unix_seconds;

use crate::store::SqliteStateStore;
use crate::store::SqliteStoreError;
use crate::store::TxOutcome;
use crate::store::db_error;
use crate::store::is_constraint_violation;

// ============================================================================
// SECTION: Version Store
// ============================================================================

impl SqliteStateStore {
    /// Creates a state at `path` with `body` as its first version.
    ///
    /// Returns `None`, leaving the store untouched, when the path exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when encryption or persistence fails.
    pub fn create_state(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
    ) -> Result<Option<Version>, StoreError> {
        let sealed = self.key().encrypt(body)?;
        self.with_transaction(|tx| -> Result<TxOutcome<Option<Version>>, StoreError> {
            let now = unix_seconds();
            let state_id = StateId::generate();
            let inserted = tx.execute(
                "INSERT INTO states (id, path, created, updated) VALUES (?1, ?2, ?3, ?3)",
                params![state_id.to_string(), path, now],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_constraint_violation(&err) => {
                    tracing::debug!(path, "create skipped, path exists");
                    return Ok(TxOutcome::Rollback(None));
                }
                Err(err) => return Err(db_error(&err).into()),
            }
            let version_id = insert_version(tx, state_id, account_id, &sealed, None, now)?;
            tracing::debug!(path, version_id = %version_id, "state created");
            Ok(TxOutcome::Commit(Some(Version {
                id: version_id,
                state_id,
                account_id,
                body: body.to_vec(),
                lock: None,
                created: now,
            })))
        })
    }

    /// Returns the decrypted body of the current version of `path`.
    ///
    /// Unknown paths and states without versions read as empty bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query or decryption fails.
    pub fn read_state(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let sealed = self.with_read(|connection| -> Result<Option<Vec<u8>>, StoreError> {
            connection
                .query_row(
                    "SELECT versions.data FROM versions JOIN states ON states.id = \
                     versions.state_id WHERE states.path = ?1 ORDER BY versions.id DESC LIMIT 1",
                    params![path],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_error(&err).into())
        })?;
        match sealed {
            Some(sealed) => Ok(self.key().decrypt(&sealed)?),
            None => Ok(Vec::new()),
        }
    }

    /// Appends a version of `path`, creating the state when absent.
    ///
    /// A non-empty `lock_id` must equal the ID of the lock currently held;
    /// otherwise nothing is written and [`WriteOutcome::LockMismatch`] is
    /// returned. An empty `lock_id` skips the check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when encryption or persistence fails.
    pub fn write_state(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
        lock_id: &str,
    ) -> Result<WriteOutcome, StoreError> {
        let sealed = self.key().encrypt(body)?;
        let limit = self.config().versions_history_limit;
        let minimum_days = self.config().versions_history_minimum_days;
        self.with_transaction(|tx| -> Result<TxOutcome<WriteOutcome>, StoreError> {
            let now = unix_seconds();
            let existing: Option<(String, Option<String>)> = tx
                .query_row("SELECT id, lock FROM states WHERE path = ?1", params![path], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()
                .map_err(|err| db_error(&err))?;
            let (state_id, lock_text) = match existing {
                Some((id, lock_text)) => (parse_state_id(&id)?, lock_text),
                None => {
                    let state_id = StateId::generate();
                    tx.execute(
                        "INSERT INTO states (id, path, created, updated) VALUES (?1, ?2, ?3, ?3)",
                        params![state_id.to_string(), path, now],
                    )
                    .map_err(|err| db_error(&err))?;
                    (state_id, None)
                }
            };
            if !lock_id.is_empty() {
                let held = lock_text.as_deref().map(parse_stored_lock).transpose()?;
                if held.as_ref().is_none_or(|held| held.id != lock_id) {
                    tracing::warn!(
                        path,
                        held_by = held.as_ref().map_or("", |held| held.id.as_str()),
                        "write rejected, lock token mismatch"
                    );
                    return Ok(TxOutcome::Rollback(WriteOutcome::LockMismatch));
                }
            }
            let version_id =
                insert_version(tx, state_id, account_id, &sealed, lock_text.as_deref(), now)?;
            tx.execute(
                "UPDATE states SET updated = ?1 WHERE id = ?2",
                params![now, state_id.to_string()],
            )
            .map_err(|err| db_error(&err))?;
            let trimmed = trim_versions(tx, state_id, now, limit, minimum_days)?;
            tracing::debug!(path, version_id = %version_id, trimmed, "state written");
            Ok(TxOutcome::Commit(WriteOutcome::Committed))
        })
    }

    /// Deletes the state at `path` together with its versions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when persistence fails.
    pub fn delete_state(&self, path: &str) -> Result<bool, StoreError> {
        let deleted = self.with_transaction(|tx| -> Result<TxOutcome<bool>, StoreError> {
            let changed = tx
                .execute("DELETE FROM states WHERE path = ?1", params![path])
                .map_err(|err| db_error(&err))?;
            Ok(TxOutcome::Commit(changed == 1))
        })?;
        if deleted {
            tracing::debug!(path, "state deleted");
        }
        Ok(deleted)
    }

    /// Moves a state to a new path.
    ///
    /// Returns `false` when `id` is unknown or `new_path` is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] when persistence fails.
    pub fn rename_state(&self, id: StateId, new_path: &str) -> Result<bool, StoreError> {
        self.with_transaction(|tx| -> Result<TxOutcome<bool>, StoreError> {
            let renamed = tx.execute(
                "UPDATE states SET path = ?1 WHERE id = ?2",
                params![new_path, id.to_string()],
            );
            match renamed {
                Ok(changed) => Ok(TxOutcome::Commit(changed == 1)),
                Err(err) if is_constraint_violation(&err) => Ok(TxOutcome::Rollback(false)),
                Err(err) => Err(db_error(&err).into()),
            }
        })
    }

    // ========================================================================
    // SECTION: Inspection
    // ========================================================================

    /// Lists every state ordered by path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or a row is corrupt.
    pub fn list_states(&self) -> Result<Vec<State>, StoreError> {
        self.with_read(|connection| -> Result<Vec<State>, StoreError> {
            let mut stmt = connection
                .prepare("SELECT id, path, lock, created, updated FROM states ORDER BY path")
                .map_err(|err| db_error(&err))?;
            let rows = stmt.query_map([], StateRow::from_row).map_err(|err| db_error(&err))?;
            let mut states = Vec::new();
            for row in rows {
                states.push(row.map_err(|err| db_error(&err))?.into_state()?);
            }
            Ok(states)
        })
    }

    /// Loads the state at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or the row is corrupt.
    pub fn load_state(&self, path: &str) -> Result<Option<State>, StoreError> {
        self.with_read(|connection| {
            query_state(
                connection,
                "SELECT id, path, lock, created, updated FROM states WHERE path = ?1",
                path,
            )
        })
    }

    /// Loads the state with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or the row is corrupt.
    pub fn load_state_by_id(&self, id: StateId) -> Result<Option<State>, StoreError> {
        self.with_read(|connection| {
            query_state(
                connection,
                "SELECT id, path, lock, created, updated FROM states WHERE id = ?1",
                &id.to_string(),
            )
        })
    }

    /// Lists the versions of `path`, newest first, without bodies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or a row is corrupt.
    pub fn list_versions(&self, path: &str) -> Result<Vec<VersionSummary>, StoreError> {
        self.with_read(|connection| -> Result<Vec<VersionSummary>, StoreError> {
            let mut stmt = connection
                .prepare(
                    "SELECT versions.id, versions.state_id, versions.account_id, versions.lock, \
                     versions.created, length(versions.data) FROM versions JOIN states ON \
                     states.id = versions.state_id WHERE states.path = ?1 ORDER BY versions.id \
                     DESC",
                )
                .map_err(|err| db_error(&err))?;
            let rows = stmt
                .query_map(params![path], |row| {
                    let id: String = row.get(0)?;
                    let state_id: String = row.get(1)?;
                    let account_id: String = row.get(2)?;
                    let lock: Option<String> = row.get(3)?;
                    let created: i64 = row.get(4)?;
                    let length: i64 = row.get(5)?;
                    Ok((id, state_id, account_id, lock, created, length))
                })
                .map_err(|err| db_error(&err))?;
            let mut summaries = Vec::new();
            for row in rows {
                let (id, state_id, account_id, lock, created, length) =
                    row.map_err(|err| db_error(&err))?;
                let stored_bytes = u64::try_from(length).map_err(|_| {
                    SqliteStoreError::Corrupt(format!("negative body length for version {id}"))
                })?;
                summaries.push(VersionSummary {
                    id: parse_version_id(&id)?,
                    state_id: parse_state_id(&state_id)?,
                    account_id: parse_account_id(&account_id)?,
                    lock: lock.as_deref().map(parse_stored_lock).transpose()?,
                    created,
                    stored_bytes,
                });
            }
            Ok(summaries)
        })
    }

    /// Loads a single version with its decrypted body.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query or decryption fails.
    pub fn load_version(&self, id: VersionId) -> Result<Option<Version>, StoreError> {
        let row = self.with_read(|connection| -> Result<_, StoreError> {
            connection
                .query_row(
                    "SELECT state_id, account_id, data, lock, created FROM versions WHERE id = ?1",
                    params![id.to_string()],
                    |row| {
                        let state_id: String = row.get(0)?;
                        let account_id: String = row.get(1)?;
                        let data: Vec<u8> = row.get(2)?;
                        let lock: Option<String> = row.get(3)?;
                        let created: i64 = row.get(4)?;
                        Ok((state_id, account_id, data, lock, created))
                    },
                )
                .optional()
                .map_err(|err| db_error(&err).into())
        })?;
        let Some((state_id, account_id, data, lock, created)) = row else {
            return Ok(None);
        };
        Ok(Some(Version {
            id,
            state_id: parse_state_id(&state_id)?,
            account_id: parse_account_id(&account_id)?,
            body: self.key().decrypt(&data)?,
            lock: lock.as_deref().map(parse_stored_lock).transpose()?,
            created,
        }))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Inserts a version row and returns its identifier.
fn insert_version(
    tx: &Transaction<'_>,
    state_id: StateId,
    account_id: AccountId,
    sealed: &[u8],
    lock_text: Option<&str>,
    now: i64,
) -> Result<VersionId, SqliteStoreError> {
    let version_id = VersionId::generate();
    tx.execute(
        "INSERT INTO versions (id, state_id, account_id, data, lock, created) VALUES (?1, ?2, \
         ?3, ?4, ?5, ?6)",
        params![
            version_id.to_string(),
            state_id.to_string(),
            account_id.to_string(),
            sealed,
            lock_text,
            now
        ],
    )
    .map_err(|err| db_error(&err))?;
    Ok(version_id)
}

/// Deletes versions of `state_id` beyond the retention window.
///
/// Finds the `limit`-th most recent version created at or before the age
/// cutoff and deletes every version with a smaller identifier. Returns the
/// number of versions deleted.
fn trim_versions(
    tx: &Transaction<'_>,
    state_id: StateId,
    now: i64,
    limit: u32,
    minimum_days: u32,
) -> Result<usize, SqliteStoreError> {
    let cutoff = now.saturating_sub(i64::from(minimum_days).saturating_mul(SECONDS_PER_DAY));
    let deleted = tx
        .execute(
            "DELETE FROM versions WHERE state_id = ?1 AND id < (SELECT MIN(id) FROM (SELECT id \
             FROM versions WHERE state_id = ?1 AND created <= ?2 ORDER BY id DESC LIMIT ?3))",
            params![state_id.to_string(), cutoff, i64::from(limit)],
        )
        .map_err(|err| db_error(&err))?;
    Ok(deleted)
}

/// Raw `states` row.
struct StateRow {
    /// Stored identifier text.
    id: String,
    /// State path.
    path: String,
    /// Stored lock text.
    lock: Option<String>,
    /// Creation time.
    created: i64,
    /// Last write time.
    updated: i64,
}

impl StateRow {
    /// Reads a row selected as `id, path, lock, created, updated`.
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            lock: row.get(2)?,
            created: row.get(3)?,
            updated: row.get(4)?,
        })
    }

    /// Validates stored fields into a [`State`].
    fn into_state(self) -> Result<State, SqliteStoreError> {
        Ok(State {
            id: parse_state_id(&self.id)?,
            path: self.path,
            lock: self.lock.as_deref().map(parse_stored_lock).transpose()?,
            created: self.created,
            updated: self.updated,
        })
    }
}

/// Runs a single-state query keyed by one text parameter.
fn query_state(
    connection: &Connection,
    sql: &str,
    key: &str,
) -> Result<Option<State>, StoreError> {
    let row = connection
        .query_row(sql, params![key], StateRow::from_row)
        .optional()
        .map_err(|err| db_error(&err))?;
    Ok(row.map(StateRow::into_state).transpose()?)
}

/// Parses a stored lock payload.
pub(crate) fn parse_stored_lock(text: &str) -> Result<Lock, SqliteStoreError> {
    Lock::from_json(text.as_bytes())
        .map_err(|err| SqliteStoreError::Corrupt(format!("stored lock: {err}")))
}

/// Parses a stored state identifier.
fn parse_state_id(text: &str) -> Result<StateId, SqliteStoreError> {
    StateId::parse(text).map_err(|err| SqliteStoreError::Corrupt(format!("state id: {err}")))
}

/// Parses a stored version identifier.
fn parse_version_id(text: &str) -> Result<VersionId, SqliteStoreError> {
    VersionId::parse(text).map_err(|err| SqliteStoreError::Corrupt(format!("version id: {err}")))
}

/// Parses a stored account identifier.
pub(crate) fn parse_account_id(text: &str) -> Result<AccountId, SqliteStoreError> {
    AccountId::parse(text).map_err(|err| SqliteStoreError::Corrupt(format!("account id: {err}")))
}
