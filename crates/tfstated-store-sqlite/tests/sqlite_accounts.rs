// crates/tfstated-store-sqlite/tests/sqlite_accounts.rs
// ============================================================================
// Module: SQLite Account Tests
// Description: Admin bootstrap, account creation, and authentication.
// Purpose: Validate credential storage and the one-shot admin password hook.
// ============================================================================

//! ## Overview
//! Integration tests for the account layer:
//! - The admin bootstrap runs once and announces its password once
//! - Passwords are stored hashed and verify through `authenticate`
//! - Duplicate and malformed usernames are refused

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;
use tfstated_core::AccountStore;
use tfstated_core::Aes256Key;
use tfstated_core::StoreError;
use tfstated_store_sqlite::ADMIN_USERNAME;
use tfstated_store_sqlite::SqliteStateStore;
use tfstated_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(dir: &TempDir) -> SqliteStateStore {
    let config = SqliteStoreConfig::new(dir.path().join("tfstate.db"));
    SqliteStateStore::open(config, Aes256Key::from_bytes([7_u8; 32])).unwrap()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn admin_bootstrap_announces_password_once() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut announced = Vec::new();
    assert!(store.init_admin_account(|password| announced.push(password.to_string())).unwrap());
    assert!(!store.init_admin_account(|password| announced.push(password.to_string())).unwrap());
    assert_eq!(announced.len(), 1);
    let account = store.authenticate(ADMIN_USERNAME, &announced[0]).unwrap().unwrap();
    assert!(account.is_admin);
    assert!(account.last_login.is_some());
}

#[test]
fn admin_bootstrap_resets_demoted_admin() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut first = String::new();
    store.init_admin_account(|password| first = password.to_string()).unwrap();
    let connection = Connection::open(dir.path().join("tfstate.db")).unwrap();
    connection
        .execute("UPDATE accounts SET is_admin = 0 WHERE username = ?1", params![ADMIN_USERNAME])
        .unwrap();
    let mut second = String::new();
    assert!(store.init_admin_account(|password| second = password.to_string()).unwrap());
    assert_ne!(first, second);
    assert!(store.authenticate(ADMIN_USERNAME, &first).unwrap().is_none());
    assert!(store.authenticate(ADMIN_USERNAME, &second).unwrap().unwrap().is_admin);
    assert_eq!(store.list_accounts().unwrap().len(), 1);
}

#[test]
fn passwords_are_not_stored_in_plaintext() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.create_account("alice", "correct horse", false).unwrap().unwrap();
    let connection = Connection::open(dir.path().join("tfstate.db")).unwrap();
    let hash: String = connection
        .query_row("SELECT password_hash FROM accounts WHERE username = 'alice'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(!hash.contains("correct horse"));
}

#[test]
fn authenticate_rejects_wrong_credentials() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.create_account("alice", "secret", false).unwrap().unwrap();
    assert!(store.authenticate("alice", "wrong").unwrap().is_none());
    assert!(store.authenticate("bob", "secret").unwrap().is_none());
    let account = store.load_account_by_username("alice").unwrap().unwrap();
    assert!(account.last_login.is_none());
    let account = store.authenticate("alice", "secret").unwrap().unwrap();
    assert_eq!(account.username, "alice");
    assert!(!account.is_admin);
    let reloaded = store.load_account_by_username("alice").unwrap().unwrap();
    assert_eq!(reloaded.last_login, account.last_login);
}

#[test]
fn duplicate_usernames_are_refused() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    assert!(store.create_account("alice", "one", false).unwrap().is_some());
    assert!(store.create_account("alice", "two", true).unwrap().is_none());
    assert!(store.authenticate("alice", "one").unwrap().is_some());
}

#[test]
fn malformed_usernames_and_empty_passwords_are_invalid() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    for username in ["", "9lives", "with space", "dash-ed"] {
        let Err(err) = store.create_account(username, "pw", false) else {
            panic!("expected username {username} to be rejected");
        };
        assert!(matches!(err, StoreError::Validation(_)));
    }
    let Err(err) = store.create_account("alice", "", false) else {
        panic!("expected empty password to be rejected");
    };
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn accounts_list_in_username_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    store.create_account("carol", "pw", false).unwrap();
    store.create_account("alice", "pw", true).unwrap();
    let names: Vec<String> =
        store.list_accounts().unwrap().into_iter().map(|account| account.username).collect();
    assert_eq!(names, vec!["alice", "carol"]);
}
