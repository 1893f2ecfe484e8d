// crates/tfstated-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite State Store
// Description: Connection discipline and transaction scoping for tfstated.
// Purpose: Own the read pool, the single write connection, and store config.
// Dependencies: tfstated-core, rusqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteStateStore`] holds two logical handles to one `SQLite` file: a pool
//! of read-only connections used round-robin for lookups, and exactly one
//! write connection through which every insert, update, and delete flows.
//! The write connection is the mutation mutex: two writers on the same path
//! are serialized by it, and the loser observes the winner's committed state.
//!
//! Every mutating operation runs inside [`SqliteStateStore::with_transaction`],
//! which opens an `IMMEDIATE` transaction so the write lock is taken before
//! any read. If a rollback fails the write handle is marked tainted and all
//! later mutations fail fast.
//!
//! Security posture: database contents are untrusted; stored identifiers and
//! lock payloads are re-validated when rows are loaded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::TryLockError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use tfstated_core::Account;
use tfstated_core::AccountId;
use tfstated_core::AccountStore;
use tfstated_core::Aes256Key;
use tfstated_core::Lock;
use tfstated_core::LockOutcome;
use tfstated_core::StateStore;
use tfstated_core::StoreError;
use tfstated_core::Version;
use tfstated_core::WriteOutcome;
use thiserror::Error;

use crate::migrations::migrate;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of versions kept per state regardless of age.
pub const DEFAULT_VERSIONS_HISTORY_LIMIT: u32 = 128;
/// Default minimum age in days before a version may be trimmed.
pub const DEFAULT_VERSIONS_HISTORY_MINIMUM_DAYS: u32 = 28;
/// Minimum read pool size.
const MIN_READ_POOL_SIZE: usize = 4;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` state store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `read_pool_size` and `versions_history_limit` are greater than zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Number of read-only connections.
    pub read_pool_size: usize,
    /// Versions always kept per state.
    pub versions_history_limit: u32,
    /// Minimum age in days before versions beyond the limit are trimmed.
    pub versions_history_minimum_days: u32,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            read_pool_size: default_read_pool_size(),
            versions_history_limit: DEFAULT_VERSIONS_HISTORY_LIMIT,
            versions_history_minimum_days: DEFAULT_VERSIONS_HISTORY_MINIMUM_DAYS,
        }
    }
}

/// Returns the default read connection pool size: `max(4, parallelism)`.
#[must_use]
pub fn default_read_pool_size() -> usize {
    std::thread::available_parallelism()
        .map_or(MIN_READ_POOL_SIZE, std::num::NonZeroUsize::get)
        .max(MIN_READ_POOL_SIZE)
}

/// Validates runtime limits in the store configuration.
fn validate_runtime_limits(config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    if config.read_pool_size == 0 {
        return Err(SqliteStoreError::Invalid(
            "read_pool_size must be greater than zero".to_string(),
        ));
    }
    if config.versions_history_limit == 0 {
        return Err(SqliteStoreError::Invalid(
            "versions_history_limit must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages never embed state bodies or key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row fails validation.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store configuration or input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// A rollback failed and the write connection can no longer be trusted.
    #[error("sqlite store write handle tainted: {0}")]
    Tainted(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Invalid(message) => Self::Validation(message),
            SqliteStoreError::Io(_)
            | SqliteStoreError::Db(_)
            | SqliteStoreError::Corrupt(_)
            | SqliteStoreError::VersionMismatch(_)
            | SqliteStoreError::Tainted(_) => Self::Internal(error.to_string()),
        }
    }
}

/// Maps a rusqlite error into a store DB error.
pub(crate) fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Returns true when `err` is a uniqueness or other constraint violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Decides whether a transaction body's effects are committed.
#[derive(Debug)]
pub(crate) enum TxOutcome<T> {
    /// Commit and return the value.
    Commit(T),
    /// Roll back and return the value.
    Rollback(T),
}

/// `SQLite`-backed state, lock, version, and account store.
///
/// # Invariants
/// - All mutations go through the single write connection.
/// - Read connections are opened read-only after migrations complete.
#[derive(Clone)]
pub struct SqliteStateStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Data encryption key for version bodies.
    key: Aes256Key,
    /// Single writer connection guarded by a mutex.
    write_connection: Arc<Mutex<Connection>>,
    /// Set once a rollback fails; mutations are refused afterwards.
    tainted: Arc<AtomicBool>,
    /// Read-only connection pool used for read path isolation under WAL.
    read_connections: Arc<Vec<Mutex<Connection>>>,
    /// Round-robin cursor for read connection selection.
    read_cursor: Arc<AtomicUsize>,
}

impl SqliteStateStore {
    /// Opens the store, applying pending schema migrations first.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated, or the configuration is invalid.
    pub fn open(config: SqliteStoreConfig, key: Aes256Key) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        validate_runtime_limits(&config)?;
        let mut write_connection = open_write_connection(&config)?;
        migrate(&mut write_connection)?;
        let mut read_connections = Vec::with_capacity(config.read_pool_size);
        for _ in 0 .. config.read_pool_size {
            read_connections.push(Mutex::new(open_read_connection(&config)?));
        }
        tracing::debug!(
            path = %config.path.display(),
            read_pool_size = config.read_pool_size,
            "sqlite state store opened"
        );
        Ok(Self {
            config,
            key,
            write_connection: Arc::new(Mutex::new(write_connection)),
            tainted: Arc::new(AtomicBool::new(false)),
            read_connections: Arc::new(read_connections),
            read_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the data encryption key.
    pub(crate) const fn key(&self) -> &Aes256Key {
        &self.key
    }

    /// Returns true once a failed rollback has disabled the write handle.
    #[must_use]
    pub fn is_tainted(&self) -> bool {
        self.tainted.load(Ordering::Acquire)
    }

    /// Runs `query` on a pooled read-only connection.
    ///
    /// Slots are probed round-robin without blocking; only when every slot is
    /// busy does the caller wait on its starting slot.
    pub(crate) fn with_read<T, E>(
        &self,
        query: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<SqliteStoreError>,
    {
        let len = self.read_connections.len();
        let start = self.read_cursor.fetch_add(1, Ordering::Relaxed) % len;
        for offset in 0 .. len {
            match self.read_connections[(start + offset) % len].try_lock() {
                Ok(guard) => return query(&guard),
                Err(TryLockError::WouldBlock) => {}
                Err(TryLockError::Poisoned(_)) => {
                    return Err(SqliteStoreError::Db("read mutex poisoned".to_string()).into());
                }
            }
        }
        let guard = self.read_connections[start]
            .lock()
            .map_err(|_| SqliteStoreError::Db("read mutex poisoned".to_string()))?;
        query(&guard)
    }

    /// Runs `operation` inside an `IMMEDIATE` transaction on the write handle.
    ///
    /// The transaction commits when `operation` returns
    /// [`TxOutcome::Commit`] and rolls back on [`TxOutcome::Rollback`] or an
    /// error. The operation's error is surfaced unchanged.
    pub(crate) fn with_transaction<T, E>(
        &self,
        operation: impl FnOnce(&Transaction<'_>) -> Result<TxOutcome<T>, E>,
    ) -> Result<T, E>
    where
        E: From<SqliteStoreError>,
    {
        if self.is_tainted() {
            return Err(SqliteStoreError::Tainted(
                "a previous rollback failed; restart required".to_string(),
            )
            .into());
        }
        let mut guard = self
            .write_connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("write mutex poisoned".to_string()))?;
        let mut rollback_failed = false;
        let result = {
            let tx = guard
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(|err| db_error(&err))?;
            match operation(&tx) {
                Ok(TxOutcome::Commit(value)) => {
                    tx.commit().map(|()| value).map_err(|err| db_error(&err).into())
                }
                Ok(TxOutcome::Rollback(value)) => match tx.rollback() {
                    Ok(()) => Ok(value),
                    Err(err) => {
                        rollback_failed = true;
                        Err(db_error(&err).into())
                    }
                },
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback() {
                        tracing::error!(error = %rollback_err, "sqlite rollback failed");
                        rollback_failed = true;
                    }
                    Err(err)
                }
            }
        };
        if !guard.is_autocommit() && guard.execute_batch("ROLLBACK").is_err() {
            rollback_failed = true;
        }
        if rollback_failed {
            self.tainted.store(true, Ordering::Release);
            tracing::error!("sqlite rollback failed; refusing further writes");
        }
        drop(guard);
        result
    }
}

impl StateStore for SqliteStateStore {
    fn create(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
    ) -> Result<Option<Version>, StoreError> {
        self.create_state(path, account_id, body)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        self.read_state(path)
    }

    fn write(
        &self,
        path: &str,
        account_id: AccountId,
        body: &[u8],
        lock_id: &str,
    ) -> Result<WriteOutcome, StoreError> {
        self.write_state(path, account_id, body, lock_id)
    }

    fn delete(&self, path: &str) -> Result<bool, StoreError> {
        self.delete_state(path)
    }

    fn acquire_or_inspect(&self, path: &str, lock: &Lock) -> Result<LockOutcome, StoreError> {
        self.acquire_lock(path, lock)
    }

    fn release(&self, path: &str, lock: &Lock) -> Result<bool, StoreError> {
        self.release_lock(path, lock)
    }

    fn force_unlock(&self, path: &str) -> Result<bool, StoreError> {
        self.force_unlock_state(path)
    }
}

impl AccountStore for SqliteStateStore {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Account>, StoreError> {
        self.authenticate_account(username, password)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path_string == ":memory:" {
        return Err(SqliteStoreError::Invalid(
            "in-memory databases cannot back a read pool".to_string(),
        ));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens the write connection with durability pragmas.
fn open_write_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| db_error(&err))?;
    apply_common_pragmas(&connection, config)?;
    connection
        .execute_batch("PRAGMA journal_mode = WAL;")
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch("PRAGMA synchronous = NORMAL;")
        .map_err(|err| db_error(&err))?;
    Ok(connection)
}

/// Opens a read-only pool connection.
fn open_read_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| db_error(&err))?;
    apply_common_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies pragmas shared by read and write connections.
fn apply_common_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
