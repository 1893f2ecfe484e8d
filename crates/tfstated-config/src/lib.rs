// crates/tfstated-config/src/lib.rs
// ============================================================================
// Module: tfstated Config Library
// Description: Environment configuration model and validation.
// Purpose: Single source of truth for TFSTATED_* environment semantics.
// Dependencies: tfstated-core, tfstated-store-sqlite, thiserror
// ============================================================================

//! ## Overview
//! `tfstated-config` turns the process environment into a validated
//! [`TfstatedConfig`]. Validation is strict and fail-closed: any malformed or
//! out-of-range value aborts startup with a [`ConfigError`] naming the
//! offending variable.
//!
//! Security posture: environment inputs are untrusted; the encryption key is
//! never echoed in error messages.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
