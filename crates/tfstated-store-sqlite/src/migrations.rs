// crates/tfstated-store-sqlite/src/migrations.rs
// ============================================================================
// Module: SQLite Schema Migrator
// Description: Ordered, once-only application of schema scripts.
// Purpose: Bring a database file to the current schema before first use.
// Dependencies: rusqlite, tracing
// ============================================================================

//! ## Overview
//! Schema changes are an ordered, immutable list of SQL scripts. The number of
//! applied scripts is recorded in the single row of `schema_version`; a
//! missing table means nothing has been applied. Pending scripts run in one
//! transaction together with the tracking update, so a failure leaves the
//! database exactly as it was.
//!
//! Scripts are append-only: never edit or reorder a shipped script.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;

use crate::store::SqliteStoreError;
use crate::store::db_error;

// ============================================================================
// SECTION: Scripts
// ============================================================================

/// Schema scripts in application order.
pub const MIGRATIONS: &[&str] = &[
    include_str!("../sql/001_initial_schema.sql"),
    include_str!("../sql/002_version_indexes.sql"),
];

/// Returns the schema version a fully migrated database reports.
#[must_use]
pub fn current_schema_version() -> i64 {
    i64::try_from(MIGRATIONS.len()).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Migrator
// ============================================================================

/// Applies every pending schema script on `connection`.
///
/// # Errors
///
/// Returns [`SqliteStoreError::VersionMismatch`] when the database was written
/// by a newer build, or [`SqliteStoreError::Db`] when a script fails.
pub fn migrate(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    migrate_with(connection, MIGRATIONS)
}

/// Applies pending scripts from `scripts`.
pub(crate) fn migrate_with(
    connection: &mut Connection,
    scripts: &[&str],
) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| db_error(&err))?;
    let applied = applied_version(&tx)?;
    let known = i64::try_from(scripts.len())
        .map_err(|_| SqliteStoreError::Invalid("too many migration scripts".to_string()))?;
    if applied > known {
        return Err(SqliteStoreError::VersionMismatch(format!(
            "database schema version {applied} is newer than supported version {known}"
        )));
    }
    if applied == known {
        return Ok(());
    }
    let start = usize::try_from(applied)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative schema version: {applied}")))?;
    for (index, script) in scripts.iter().enumerate().skip(start) {
        tx.execute_batch(script).map_err(|err| {
            SqliteStoreError::Db(format!("migration {} failed: {err}", index + 1))
        })?;
    }
    tx.execute("DELETE FROM schema_version", []).map_err(|err| db_error(&err))?;
    tx.execute("INSERT INTO schema_version (version) VALUES (?1)", params![known])
        .map_err(|err| db_error(&err))?;
    tx.commit().map_err(|err| db_error(&err))?;
    tracing::info!(from = applied, to = known, "sqlite schema migrated");
    Ok(())
}

/// Reads the applied schema version; a missing tracking table reads as zero.
fn applied_version(connection: &Connection) -> Result<i64, SqliteStoreError> {
    let has_table: bool = connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = \
             'schema_version')",
            [],
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))?;
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> = connection
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    Ok(version.unwrap_or(0))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
