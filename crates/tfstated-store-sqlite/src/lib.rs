// crates/tfstated-store-sqlite/src/lib.rs
// ============================================================================
// Module: tfstated SQLite Store Library
// Description: SQLite-backed state, lock, version, and account storage.
// Purpose: Provide the durable storage engine behind the tfstated server.
// Dependencies: tfstated-core, rusqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! This crate implements [`tfstated_core::StateStore`] and
//! [`tfstated_core::AccountStore`] on top of a single `SQLite` file in WAL
//! mode. Opening the store applies pending schema migrations before anything
//! else touches the database.
//! Security posture: database contents are untrusted and are re-validated on
//! load; state bodies are encrypted at rest with a process-wide key.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod accounts;
mod locks;
pub mod migrations;
mod states;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use accounts::ADMIN_USERNAME;
pub use migrations::current_schema_version;
pub use store::DEFAULT_BUSY_TIMEOUT_MS;
pub use store::DEFAULT_VERSIONS_HISTORY_LIMIT;
pub use store::DEFAULT_VERSIONS_HISTORY_MINIMUM_DAYS;
pub use store::SqliteStateStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::default_read_pool_size;
