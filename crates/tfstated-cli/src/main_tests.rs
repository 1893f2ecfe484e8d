// crates/tfstated-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Argument parsing and maintenance command behavior.
// Purpose: Ensure operator commands act on the store as documented.
// Dependencies: tfstated-cli main helpers
// ============================================================================

//! ## Overview
//! Parses command lines with `Cli::try_parse_from` and runs maintenance
//! commands against a temporary store, capturing their output in memory.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use clap::Parser;
use tempfile::TempDir;
use tfstated_core::Aes256Key;
use tfstated_core::Lock;
use tfstated_core::LockOutcome;
use tfstated_core::StoreError;
use tfstated_store_sqlite::ADMIN_USERNAME;
use tfstated_store_sqlite::SqliteStateStore;
use tfstated_store_sqlite::SqliteStoreConfig;

use super::AccountsCommand;
use super::Cli;
use super::Commands;
use super::ImportCommand;
use super::StatesCommand;
use super::command_accounts;
use super::command_keygen;
use super::command_states;
use super::format_timestamp;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open_store(dir: &TempDir) -> SqliteStateStore {
    let config = SqliteStoreConfig::new(dir.path().join("tfstate.db"));
    let store = SqliteStateStore::open(config, Aes256Key::from_bytes([9_u8; 32])).unwrap();
    store.init_admin_account(|_| {}).unwrap();
    store
}

fn run_states(store: &SqliteStateStore, command: StatesCommand) -> Result<String, String> {
    let mut out = Vec::new();
    command_states(store, command, &mut out).map_err(|err| err.to_string())?;
    Ok(String::from_utf8(out).unwrap())
}

fn import(dir: &TempDir, path: &str, body: &[u8]) -> ImportCommand {
    let file = dir.path().join("import.tfstate");
    std::fs::write(&file, body).unwrap();
    ImportCommand {
        path: path.to_string(),
        file,
        account: ADMIN_USERNAME.to_string(),
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn parses_nested_commands() {
    let cli = Cli::try_parse_from(["tfstated", "states", "import", "/a", "a.tfstate"]).unwrap();
    let Commands::States {
        command: StatesCommand::Import(command),
    } = cli.command
    else {
        panic!("expected states import");
    };
    assert_eq!(command.path, "/a");
    assert_eq!(command.account, ADMIN_USERNAME);

    let cli = Cli::try_parse_from(["tfstated", "accounts", "create", "bob", "--admin"]).unwrap();
    let Commands::Accounts {
        command: AccountsCommand::Create {
            username,
            admin,
        },
    } = cli.command
    else {
        panic!("expected accounts create");
    };
    assert_eq!(username, "bob");
    assert!(admin);
}

#[test]
fn rejects_unknown_commands() {
    assert!(Cli::try_parse_from(["tfstated", "states", "rename"]).is_err());
    assert!(Cli::try_parse_from(["tfstated"]).is_err());
}

// ============================================================================
// SECTION: Commands
// ============================================================================

#[test]
fn keygen_prints_a_usable_key() {
    let mut out = Vec::new();
    command_keygen(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(Aes256Key::from_base64(text.trim()).is_ok());
}

#[test]
fn import_creates_state_once() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let output = run_states(&store, StatesCommand::Import(import(&dir, "/a", b"v1"))).unwrap();
    assert!(output.starts_with("imported /a as version "));
    assert_eq!(store.read_state("/a").unwrap(), b"v1");
    let Err(message) = run_states(&store, StatesCommand::Import(import(&dir, "/a", b"v2"))) else {
        panic!("expected duplicate import to fail");
    };
    assert_eq!(message, StoreError::DuplicatePath("/a".to_string()).to_string());
    assert_eq!(store.read_state("/a").unwrap(), b"v1");
}

#[test]
fn import_requires_a_known_account() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut command = import(&dir, "/a", b"v1");
    command.account = "ghost".to_string();
    let Err(message) = run_states(&store, StatesCommand::Import(command)) else {
        panic!("expected unknown account to fail");
    };
    assert_eq!(message, "account not found: ghost");
}

#[test]
fn unlock_clears_any_lock() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let lock = Lock::with_id("6f1c8f0e-54a4-4c1b-9f0e-3b2f6f0c1d2e");
    assert_eq!(store.acquire_lock("/a", &lock).unwrap(), LockOutcome::Acquired);
    let output = run_states(
        &store,
        StatesCommand::Unlock {
            path: "/a".to_string(),
        },
    )
    .unwrap();
    assert_eq!(output, "unlocked /a\n");
    assert!(store.load_state("/a").unwrap().unwrap().lock.is_none());
    let output = run_states(
        &store,
        StatesCommand::Unlock {
            path: "/a".to_string(),
        },
    )
    .unwrap();
    assert_eq!(output, "no lock held on /a\n");
}

#[test]
fn list_and_versions_describe_stored_states() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let admin = store.load_account_by_username(ADMIN_USERNAME).unwrap().unwrap();
    store.write_state("/b", admin.id, b"one", "").unwrap();
    store.write_state("/a", admin.id, b"two", "").unwrap();
    store.write_state("/a", admin.id, b"three!", "").unwrap();
    let listing = run_states(&store, StatesCommand::List).unwrap();
    let paths: Vec<&str> =
        listing.lines().map(|line| line.split('\t').next().unwrap()).collect();
    assert_eq!(paths, vec!["/a", "/b"]);
    let versions = run_states(
        &store,
        StatesCommand::Versions {
            path: "/a".to_string(),
        },
    )
    .unwrap();
    let lines: Vec<&str> = versions.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains(&admin.id.to_string()));
    let Err(message) = run_states(
        &store,
        StatesCommand::Versions {
            path: "/missing".to_string(),
        },
    ) else {
        panic!("expected missing state to fail");
    };
    assert_eq!(message, StoreError::NotFound("/missing".to_string()).to_string());
}

#[test]
fn delete_reports_missing_paths() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    run_states(&store, StatesCommand::Import(import(&dir, "/a", b"v1"))).unwrap();
    let delete = || StatesCommand::Delete {
        path: "/a".to_string(),
    };
    assert_eq!(run_states(&store, delete()).unwrap(), "deleted /a\n");
    assert_eq!(
        run_states(&store, delete()),
        Err(StoreError::NotFound("/a".to_string()).to_string())
    );
}

#[test]
fn account_creation_prints_a_working_password() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let mut out = Vec::new();
    command_accounts(
        &store,
        AccountsCommand::Create {
            username: "bob".to_string(),
            admin: false,
        },
        &mut out,
    )
    .unwrap();
    let text = String::from_utf8(out).unwrap();
    let password = text.lines().find_map(|line| line.strip_prefix("password: ")).unwrap();
    assert!(store.authenticate_account("bob", password).unwrap().is_some());
    let mut out = Vec::new();
    let duplicate = command_accounts(
        &store,
        AccountsCommand::Create {
            username: "bob".to_string(),
            admin: true,
        },
        &mut out,
    );
    assert!(duplicate.is_err());
}

#[test]
fn timestamps_render_as_rfc3339() {
    assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
    assert_eq!(format_timestamp(i64::MAX), i64::MAX.to_string());
}
