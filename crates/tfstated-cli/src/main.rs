// crates/tfstated-cli/src/main.rs
// ============================================================================
// Module: tfstated CLI Entry Point
// Description: Command dispatcher for the server and operator maintenance.
// Purpose: Start the remote state server and inspect or repair its store.
// Dependencies: clap, tfstated-backend, tfstated-config, tfstated-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! `tfstated serve` runs the Terraform remote state server. The remaining
//! commands open the same database directly for operator tasks: listing
//! states and versions, forcing a stuck lock open, importing a state file,
//! deleting a state, and creating accounts. Every command except `keygen`
//! reads its configuration from `TFSTATED_*` environment variables.

// ============================================================================
// SECTION: Modules
// ============================================================================

#[cfg(test)]
mod main_tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use tfstated_backend::BackendState;
use tfstated_backend::router;
use tfstated_backend::serve;
use tfstated_cli::telemetry::init_tracing;
use tfstated_config::TfstatedConfig;
use tfstated_core::Aes256Key;
use tfstated_core::SharedAccountStore;
use tfstated_core::SharedStateStore;
use tfstated_core::StoreError;
use tfstated_core::generate_password;
use tfstated_store_sqlite::ADMIN_USERNAME;
use tfstated_store_sqlite::SqliteStateStore;
use tfstated_store_sqlite::SqliteStoreConfig;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(name = "tfstated", version, about = "Terraform HTTP remote state server")]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the remote state server.
    Serve,
    /// Print a fresh base64 data encryption key.
    Keygen,
    /// Inspect and repair stored states.
    States {
        /// States subcommand.
        #[command(subcommand)]
        command: StatesCommand,
    },
    /// Manage accounts.
    Accounts {
        /// Accounts subcommand.
        #[command(subcommand)]
        command: AccountsCommand,
    },
}

/// State maintenance commands.
#[derive(Subcommand, Debug)]
enum StatesCommand {
    /// List states with their lock holders.
    List,
    /// List the retained versions of a state, newest first.
    Versions {
        /// State path, for example `/prod/network`.
        path: String,
    },
    /// Clear a lock without checking its token.
    Unlock {
        /// State path.
        path: String,
    },
    /// Create a state from a local state file.
    Import(ImportCommand),
    /// Delete a state and its history.
    Delete {
        /// State path.
        path: String,
    },
}

/// Arguments for `states import`.
#[derive(Args, Debug)]
struct ImportCommand {
    /// State path to create.
    path: String,
    /// Local state file.
    file: PathBuf,
    /// Account recorded as the author of the first version.
    #[arg(long, default_value = ADMIN_USERNAME)]
    account: String,
}

/// Account maintenance commands.
#[derive(Subcommand, Debug)]
enum AccountsCommand {
    /// Create an account with a generated password.
    Create {
        /// Username: a letter followed by letters, digits, or underscores.
        username: String,
        /// Grant administrator rights.
        #[arg(long)]
        admin: bool,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a human-readable message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the command dispatcher.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve => command_serve().await,
        Commands::Keygen => command_keygen(&mut std::io::stdout()),
        Commands::States {
            command,
        } => {
            let store = open_maintenance_store()?;
            command_states(&store, command, &mut std::io::stdout())
        }
        Commands::Accounts {
            command,
        } => {
            let store = open_maintenance_store()?;
            command_accounts(&store, command, &mut std::io::stdout())
        }
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve() -> CliResult<ExitCode> {
    let config = TfstatedConfig::from_process_env()
        .map_err(|err| CliError::new(format!("failed to load configuration: {err}")))?;
    init_tracing(config.log_format, "info");
    let store_config = config.store.clone();
    let key = config.encryption_key.clone();
    let store = tokio::task::spawn_blocking(move || open_store_with_admin(store_config, key))
        .await
        .map_err(|err| CliError::new(format!("store initialization failed: {err}")))??;
    let state = BackendState::new(
        SharedStateStore::from_store(store.clone()),
        SharedAccountStore::from_store(store),
    );
    let app = router(state, config.server.max_body_bytes);
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .map_err(|err| CliError::new(format!("failed to bind {}: {err}", config.server)))?;
    serve(listener, app, shutdown_signal())
        .await
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Opens the store and ensures an administrator account exists.
fn open_store_with_admin(
    config: SqliteStoreConfig,
    key: Aes256Key,
) -> CliResult<SqliteStateStore> {
    let store = SqliteStateStore::open(config, key)
        .map_err(|err| CliError::new(format!("failed to open database: {err}")))?;
    store
        .init_admin_account(|password| {
            tracing::warn!(
                username = ADMIN_USERNAME,
                password,
                "generated administrator password; store it now, it is not shown again"
            );
        })
        .map_err(|err| CliError::new(format!("failed to initialize admin account: {err}")))?;
    Ok(store)
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

// ============================================================================
// SECTION: Keygen Command
// ============================================================================

/// Executes the `keygen` command.
fn command_keygen(out: &mut impl Write) -> CliResult<ExitCode> {
    let key = Aes256Key::generate()
        .map_err(|err| CliError::new(format!("key generation failed: {err}")))?;
    write_line(out, &key.to_base64())?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: States Commands
// ============================================================================

/// Opens the configured store for a maintenance command.
fn open_maintenance_store() -> CliResult<SqliteStateStore> {
    let config = TfstatedConfig::from_process_env()
        .map_err(|err| CliError::new(format!("failed to load configuration: {err}")))?;
    init_tracing(config.log_format, "warn");
    SqliteStateStore::open(config.store, config.encryption_key)
        .map_err(|err| CliError::new(format!("failed to open database: {err}")))
}

/// Executes a `states` subcommand.
fn command_states(
    store: &SqliteStateStore,
    command: StatesCommand,
    out: &mut impl Write,
) -> CliResult<ExitCode> {
    match command {
        StatesCommand::List => {
            let states = store.list_states().map_err(store_error)?;
            for state in states {
                let holder = state.lock.map_or_else(String::new, |lock| {
                    format!("locked by {} ({})", lock.who, lock.id)
                });
                let line =
                    format!("{}\t{}\t{holder}", state.path, format_timestamp(state.updated));
                write_line(out, line.trim_end())?;
            }
        }
        StatesCommand::Versions {
            path,
        } => {
            if store.load_state(&path).map_err(store_error)?.is_none() {
                return Err(store_error(StoreError::NotFound(path)));
            }
            for version in store.list_versions(&path).map_err(store_error)? {
                let lock_id = version.lock.map(|lock| lock.id).unwrap_or_default();
                let line = format!(
                    "{}\t{}\t{}\t{}\t{lock_id}",
                    version.id,
                    format_timestamp(version.created),
                    version.account_id,
                    version.stored_bytes
                );
                write_line(out, line.trim_end())?;
            }
        }
        StatesCommand::Unlock {
            path,
        } => {
            if store.force_unlock_state(&path).map_err(store_error)? {
                tracing::warn!(path = %path, "lock forcibly released");
                write_line(out, &format!("unlocked {path}"))?;
            } else {
                write_line(out, &format!("no lock held on {path}"))?;
            }
        }
        StatesCommand::Import(command) => command_states_import(store, &command, out)?,
        StatesCommand::Delete {
            path,
        } => {
            if !store.delete_state(&path).map_err(store_error)? {
                return Err(store_error(StoreError::NotFound(path)));
            }
            write_line(out, &format!("deleted {path}"))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `states import`.
fn command_states_import(
    store: &SqliteStateStore,
    command: &ImportCommand,
    out: &mut impl Write,
) -> CliResult<()> {
    let body = std::fs::read(&command.file).map_err(|err| {
        CliError::new(format!("failed to read {}: {err}", command.file.display()))
    })?;
    let account = store
        .load_account_by_username(&command.account)
        .map_err(store_error)?
        .ok_or_else(|| CliError::new(format!("account not found: {}", command.account)))?;
    let version = store
        .create_state(&command.path, account.id, &body)
        .map_err(store_error)?
        .ok_or_else(|| store_error(StoreError::DuplicatePath(command.path.clone())))?;
    write_line(out, &format!("imported {} as version {}", command.path, version.id))
}

// ============================================================================
// SECTION: Accounts Commands
// ============================================================================

/// Executes an `accounts` subcommand.
fn command_accounts(
    store: &SqliteStateStore,
    command: AccountsCommand,
    out: &mut impl Write,
) -> CliResult<ExitCode> {
    match command {
        AccountsCommand::Create {
            username,
            admin,
        } => {
            let password = generate_password();
            store
                .create_account(&username, &password, admin)
                .map_err(store_error)?
                .ok_or_else(|| CliError::new(format!("account already exists: {username}")))?;
            write_line(out, &format!("created account {username}"))?;
            write_line(out, &format!("password: {password}"))?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Formats a Unix timestamp as RFC 3339, falling back to the raw seconds.
fn format_timestamp(seconds: i64) -> String {
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|moment| moment.format(&Rfc3339).ok())
        .unwrap_or_else(|| seconds.to_string())
}

/// Maps a store failure into a CLI error.
fn store_error(err: StoreError) -> CliError {
    CliError::new(err.to_string())
}

/// Writes one line to `out`.
fn write_line(out: &mut impl Write, message: &str) -> CliResult<()> {
    writeln!(out, "{message}").map_err(|err| CliError::new(format!("output write failed: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
