// crates/tfstated-config/tests/env_validation.rs
// ============================================================================
// Module: Environment Validation Tests
// Description: Defaults, overrides, and rejection of bad TFSTATED_* values.
// Purpose: Ensure configuration fails closed on malformed input.
// ============================================================================

//! ## Overview
//! Drives [`TfstatedConfig::from_env`] through an in-memory variable map.

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

use std::collections::HashMap;

use tempfile::TempDir;
use tfstated_config::ConfigError;
use tfstated_config::DEFAULT_MAX_BODY_BYTES;
use tfstated_config::LogFormat;
use tfstated_config::TfstatedConfig;
use tfstated_core::Aes256Key;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const KEY_HEX: &str = "28278b7c0a25f01d3cab639633b9487f9ea1e9a2176dc9595a3f01323aa44284";

fn load(vars: &[(&str, &str)]) -> Result<TfstatedConfig, ConfigError> {
    let map: HashMap<String, String> =
        vars.iter().map(|(name, value)| ((*name).to_string(), (*value).to_string())).collect();
    TfstatedConfig::from_env(|name| map.get(name).cloned())
}

fn with_key<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut vars = vec![("TFSTATED_DATA_ENCRYPTION_KEY", KEY_HEX)];
    vars.extend_from_slice(extra);
    vars
}

fn assert_invalid(vars: &[(&str, &str)]) {
    let Err(err) = load(vars) else {
        panic!("expected {vars:?} to be rejected");
    };
    assert!(matches!(err, ConfigError::Invalid(_)), "unexpected error {err}");
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn defaults_apply_when_only_key_is_set() {
    let config = load(&with_key(&[])).unwrap();
    assert_eq!(config.store.versions_history_limit, 128);
    assert_eq!(config.store.versions_history_minimum_days, 28);
    assert_eq!(config.store.path.to_str(), Some("./tfstate.db"));
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    assert_eq!(config.server.to_string(), "127.0.0.1:8080");
    assert_eq!(config.log_format, LogFormat::Text);
    assert!(config.store.read_pool_size >= 1);
    assert_eq!(config.encryption_key, Aes256Key::from_hex(KEY_HEX).unwrap());
}

#[test]
fn missing_key_is_reported() {
    let Err(err) = load(&[]) else {
        panic!("expected missing key to fail");
    };
    assert_eq!(err, ConfigError::Missing("TFSTATED_DATA_ENCRYPTION_KEY".to_string()));
    let Err(err) = load(&[("TFSTATED_DATA_ENCRYPTION_KEY", "  ")]) else {
        panic!("expected blank key to fail");
    };
    assert!(matches!(err, ConfigError::Missing(_)));
}

#[test]
fn base64_and_hex_keys_decode_to_the_same_key() {
    let key = Aes256Key::from_hex(KEY_HEX).unwrap();
    let encoded = key.to_base64();
    let config = load(&[("TFSTATED_DATA_ENCRYPTION_KEY", encoded.as_str())]).unwrap();
    assert_eq!(config.encryption_key, key);
}

#[test]
fn short_or_garbage_keys_are_invalid_and_not_echoed() {
    for value in ["c2hvcnQ=", "not base64 at all!", "abcd"] {
        let Err(err) = load(&[("TFSTATED_DATA_ENCRYPTION_KEY", value)]) else {
            panic!("expected key {value} to be rejected");
        };
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(!err.to_string().contains(value));
    }
}

#[test]
fn key_errors_do_not_report_decoder_details() {
    for value in ["AAAA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=", "c2hvcnQ="] {
        let Err(err) = load(&[("TFSTATED_DATA_ENCRYPTION_KEY", value)]) else {
            panic!("expected key {value} to be rejected");
        };
        assert_eq!(
            err,
            ConfigError::Invalid(
                "TFSTATED_DATA_ENCRYPTION_KEY: expected 32 bytes as base64 or 64 hex digits"
                    .to_string()
            )
        );
    }
}

#[test]
fn overrides_are_applied() {
    let config = load(&with_key(&[
        ("TFSTATED_VERSIONS_HISTORY_LIMIT", "3"),
        ("TFSTATED_VERSIONS_HISTORY_MINIMUM_DAYS", "0"),
        ("TFSTATED_DATABASE", "/var/lib/tfstated/state.db"),
        ("TFSTATED_HOST", "::1"),
        ("TFSTATED_PORT", "9090"),
        ("TFSTATED_READ_POOL_SIZE", "2"),
        ("TFSTATED_BUSY_TIMEOUT_MS", "250"),
        ("TFSTATED_MAX_BODY_BYTES", "1024"),
        ("TFSTATED_LOG_FORMAT", "JSON"),
    ]))
    .unwrap();
    assert_eq!(config.store.versions_history_limit, 3);
    assert_eq!(config.store.versions_history_minimum_days, 0);
    assert_eq!(config.store.path.to_str(), Some("/var/lib/tfstated/state.db"));
    assert_eq!(config.store.read_pool_size, 2);
    assert_eq!(config.store.busy_timeout_ms, 250);
    assert_eq!(config.server.to_string(), "[::1]:9090");
    assert_eq!(config.server.max_body_bytes, 1024);
    assert_eq!(config.log_format, LogFormat::Json);
}

#[test]
fn zero_limits_are_rejected() {
    assert_invalid(&with_key(&[("TFSTATED_VERSIONS_HISTORY_LIMIT", "0")]));
    assert_invalid(&with_key(&[("TFSTATED_READ_POOL_SIZE", "0")]));
    assert_invalid(&with_key(&[("TFSTATED_MAX_BODY_BYTES", "0")]));
}

#[test]
fn malformed_numbers_are_rejected_not_defaulted() {
    assert_invalid(&with_key(&[("TFSTATED_VERSIONS_HISTORY_LIMIT", "-1")]));
    assert_invalid(&with_key(&[("TFSTATED_VERSIONS_HISTORY_MINIMUM_DAYS", "four")]));
    assert_invalid(&with_key(&[("TFSTATED_PORT", "70000")]));
    assert_invalid(&with_key(&[("TFSTATED_BUSY_TIMEOUT_MS", "")]));
}

#[test]
fn database_must_be_a_file_path() {
    let dir = TempDir::new().unwrap();
    let dir_path = dir.path().to_str().unwrap().to_string();
    assert_invalid(&with_key(&[("TFSTATED_DATABASE", dir_path.as_str())]));
    assert_invalid(&with_key(&[("TFSTATED_DATABASE", "")]));
}

#[test]
fn unknown_log_format_and_blank_host_are_rejected() {
    assert_invalid(&with_key(&[("TFSTATED_LOG_FORMAT", "xml")]));
    assert_invalid(&with_key(&[("TFSTATED_HOST", " ")]));
}
