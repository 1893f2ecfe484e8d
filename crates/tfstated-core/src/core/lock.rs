// crates/tfstated-core/src/core/lock.rs
// ============================================================================
// Module: tfstated Lock Record
// Description: Advisory lock payload exchanged with Terraform-style clients.
// Purpose: Give the lock a fixed shape with an explicit serialized form.
// Dependencies: serde, serde_json, time, uuid, thiserror
// ============================================================================

//! ## Overview
//! A [`Lock`] is the JSON document Terraform sends with `LOCK` and `UNLOCK`
//! requests. It is stored verbatim on the state row as serialized text, and
//! release succeeds only when the serialized form of the supplied lock equals
//! the stored text. Because both sides are produced by [`Lock::to_json`], the
//! comparison is insensitive to client field order and whitespace.
//!
//! Security posture: lock payloads are untrusted client input; only the `ID`
//! field is validated, the remaining fields are opaque strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Lock payload errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Lock payload is not valid JSON or has the wrong shape.
    #[error("invalid lock payload: {0}")]
    Malformed(String),
    /// Lock token is missing or not UUID-shaped.
    #[error("invalid lock id: {0}")]
    InvalidId(String),
    /// Lock payload could not be serialized.
    #[error("lock serialization failed: {0}")]
    Serialization(String),
}

// ============================================================================
// SECTION: Lock
// ============================================================================

/// Advisory exclusion token stored on a state.
///
/// # Invariants
/// - Field names serialize exactly as Terraform emits them.
/// - Serialization order is fixed by field declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lock {
    /// Time the client created the lock.
    #[serde(rename = "Created", default, with = "time::serde::rfc3339::option")]
    pub created: Option<OffsetDateTime>,
    /// Opaque lock token.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Free-form client information.
    #[serde(rename = "Info", default)]
    pub info: String,
    /// Operation holding the lock (`OperationTypeApply`, ...).
    #[serde(rename = "Operation", default)]
    pub operation: String,
    /// State path as reported by the client.
    #[serde(rename = "Path", default)]
    pub path: String,
    /// Client tool version.
    #[serde(rename = "Version", default)]
    pub version: String,
    /// Holder identity, usually `user@host`.
    #[serde(rename = "Who", default)]
    pub who: String,
}

impl Lock {
    /// Creates a lock carrying only a token.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Parses a lock from client JSON without validating the token.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Malformed`] when the bytes are not a lock object.
    pub fn from_json(bytes: &[u8]) -> Result<Self, LockError> {
        serde_json::from_slice(bytes).map_err(|err| LockError::Malformed(err.to_string()))
    }

    /// Parses a lock from client JSON and validates its token.
    ///
    /// # Errors
    ///
    /// Returns [`LockError`] when the payload is malformed or the token is invalid.
    pub fn parse_validated(bytes: &[u8]) -> Result<Self, LockError> {
        let lock = Self::from_json(bytes)?;
        lock.validate_id()?;
        Ok(lock)
    }

    /// Returns the canonical serialized form used for storage and comparison.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Serialization`] when the timestamp cannot be formatted.
    pub fn to_json(&self) -> Result<String, LockError> {
        serde_json::to_string(self).map_err(|err| LockError::Serialization(err.to_string()))
    }

    /// Checks that the token is a UUID.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidId`] when the token is empty or not UUID-shaped.
    pub fn validate_id(&self) -> Result<(), LockError> {
        if self.id.is_empty() {
            return Err(LockError::InvalidId("lock id is empty".to_string()));
        }
        Uuid::parse_str(&self.id)
            .map_err(|err| LockError::InvalidId(format!("{}: {err}", self.id)))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
