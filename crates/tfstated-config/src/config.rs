// crates/tfstated-config/src/config.rs
// ============================================================================
// Module: tfstated Configuration
// Description: TFSTATED_* environment parsing and validation.
// Purpose: Produce store and server settings from the environment.
// Dependencies: tfstated-core, tfstated-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! Configuration is read through a lookup closure rather than directly from
//! the process environment so tests can inject values. Unset variables take
//! their defaults; set-but-invalid variables are errors, never silently
//! replaced by defaults.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use tfstated_core::Aes256Key;
use tfstated_store_sqlite::DEFAULT_BUSY_TIMEOUT_MS;
use tfstated_store_sqlite::DEFAULT_VERSIONS_HISTORY_LIMIT;
use tfstated_store_sqlite::DEFAULT_VERSIONS_HISTORY_MINIMUM_DAYS;
use tfstated_store_sqlite::SqliteStoreConfig;
use tfstated_store_sqlite::default_read_pool_size;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Base64 (or hex) 256-bit data encryption key. Required.
pub const ENV_DATA_ENCRYPTION_KEY: &str = "TFSTATED_DATA_ENCRYPTION_KEY";
/// Versions always kept per state.
pub const ENV_VERSIONS_HISTORY_LIMIT: &str = "TFSTATED_VERSIONS_HISTORY_LIMIT";
/// Minimum age in days before versions beyond the limit are trimmed.
pub const ENV_VERSIONS_HISTORY_MINIMUM_DAYS: &str = "TFSTATED_VERSIONS_HISTORY_MINIMUM_DAYS";
/// `SQLite` database file path.
pub const ENV_DATABASE: &str = "TFSTATED_DATABASE";
/// Listen host.
pub const ENV_HOST: &str = "TFSTATED_HOST";
/// Listen port.
pub const ENV_PORT: &str = "TFSTATED_PORT";
/// Read connection pool size.
pub const ENV_READ_POOL_SIZE: &str = "TFSTATED_READ_POOL_SIZE";
/// `SQLite` busy timeout in milliseconds.
pub const ENV_BUSY_TIMEOUT_MS: &str = "TFSTATED_BUSY_TIMEOUT_MS";
/// Maximum accepted request body size in bytes.
pub const ENV_MAX_BODY_BYTES: &str = "TFSTATED_MAX_BODY_BYTES";
/// Log output format (`text` or `json`).
pub const ENV_LOG_FORMAT: &str = "TFSTATED_LOG_FORMAT";

/// Default database path.
pub const DEFAULT_DATABASE: &str = "./tfstate.db";
/// Default listen host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default maximum request body size (64 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;
/// Hex-encoded key length in characters.
const HEX_KEY_LENGTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required config: {0}")]
    Missing(String),
    /// A variable is set to an unusable value.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid(format!(
                "{ENV_LOG_FORMAT} must be text or json, got {other}"
            ))),
        }
    }
}

/// HTTP listener settings.
///
/// # Invariants
/// - `max_body_bytes` is greater than zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct TfstatedConfig {
    /// Store settings.
    pub store: SqliteStoreConfig,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Data encryption key.
    pub encryption_key: Aes256Key,
    /// Log output format.
    pub log_format: LogFormat,
}

impl TfstatedConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or invalid.
    pub fn from_process_env() -> Result<Self, ConfigError> {
        Self::from_env(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `getenv`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a variable is missing or invalid.
    pub fn from_env(getenv: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let encryption_key = parse_encryption_key(getenv(ENV_DATA_ENCRYPTION_KEY))?;
        let database = getenv(ENV_DATABASE).unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        validate_database_path(Path::new(&database))?;
        let versions_history_limit =
            parse_or(&getenv, ENV_VERSIONS_HISTORY_LIMIT, DEFAULT_VERSIONS_HISTORY_LIMIT)?;
        if versions_history_limit == 0 {
            return Err(ConfigError::Invalid(format!(
                "{ENV_VERSIONS_HISTORY_LIMIT} must be at least 1"
            )));
        }
        let versions_history_minimum_days = parse_or(
            &getenv,
            ENV_VERSIONS_HISTORY_MINIMUM_DAYS,
            DEFAULT_VERSIONS_HISTORY_MINIMUM_DAYS,
        )?;
        let read_pool_size = parse_or(&getenv, ENV_READ_POOL_SIZE, default_read_pool_size())?;
        if read_pool_size == 0 {
            return Err(ConfigError::Invalid(format!("{ENV_READ_POOL_SIZE} must be at least 1")));
        }
        let busy_timeout_ms = parse_or(&getenv, ENV_BUSY_TIMEOUT_MS, DEFAULT_BUSY_TIMEOUT_MS)?;
        let host = getenv(ENV_HOST).unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("{ENV_HOST} must not be empty")));
        }
        let port = parse_or(&getenv, ENV_PORT, DEFAULT_PORT)?;
        let max_body_bytes = parse_or(&getenv, ENV_MAX_BODY_BYTES, DEFAULT_MAX_BODY_BYTES)?;
        if max_body_bytes == 0 {
            return Err(ConfigError::Invalid(format!("{ENV_MAX_BODY_BYTES} must be at least 1")));
        }
        let log_format = match getenv(ENV_LOG_FORMAT) {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };
        Ok(Self {
            store: SqliteStoreConfig {
                path: PathBuf::from(database),
                busy_timeout_ms,
                read_pool_size,
                versions_history_limit,
                versions_history_minimum_days,
            },
            server: ServerConfig {
                host,
                port,
                max_body_bytes,
            },
            encryption_key,
            log_format,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses the data encryption key as hex (64 digits) or base64.
fn parse_encryption_key(value: Option<String>) -> Result<Aes256Key, ConfigError> {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return Err(ConfigError::Missing(ENV_DATA_ENCRYPTION_KEY.to_string()));
    };
    let trimmed = value.trim();
    let parsed = if trimmed.len() == HEX_KEY_LENGTH
        && trimmed.chars().all(|ch| ch.is_ascii_hexdigit())
    {
        Aes256Key::from_hex(trimmed)
    } else {
        Aes256Key::from_base64(trimmed)
    };
    parsed.map_err(|_| {
        ConfigError::Invalid(format!(
            "{ENV_DATA_ENCRYPTION_KEY}: expected 32 bytes as base64 or {HEX_KEY_LENGTH} hex digits"
        ))
    })
}

/// Parses `name` when set, otherwise returns `default`.
fn parse_or<T>(
    getenv: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match getenv(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err| ConfigError::Invalid(format!("{name}={value}: {err}"))),
    }
}

/// Rejects empty database paths and paths naming a directory.
fn validate_database_path(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!("{ENV_DATABASE} must not be empty")));
    }
    if path.is_dir() {
        return Err(ConfigError::Invalid(format!(
            "{ENV_DATABASE} must name a file, not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}
