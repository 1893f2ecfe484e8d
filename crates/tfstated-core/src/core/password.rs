// crates/tfstated-core/src/core/password.rs
// ============================================================================
// Module: tfstated Password Hashing
// Description: Argon2id hashing and verification of account passwords.
// Purpose: Keep plaintext passwords out of persistent storage.
// Dependencies: argon2, rand, uuid, thiserror
// ============================================================================

//! ## Overview
//! Passwords are stored as argon2id PHC strings with a per-password random
//! salt. Generated passwords are random UUIDv4 strings, long enough for basic
//! auth and easy to paste into a Terraform backend block.

// ============================================================================
// SECTION: Imports
// ============================================================================

use argon2::Argon2;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use rand::rngs::OsRng;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Password hashing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordError {
    /// Hashing failed.
    #[error("password hashing failed: {0}")]
    Hash(String),
}

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes a password into an argon2id PHC string.
///
/// # Errors
///
/// Returns [`PasswordError::Hash`] when argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordError::Hash(err.to_string()))
}

/// Verifies a password against a stored PHC string.
///
/// Unparseable hashes never verify.
#[must_use]
pub fn verify_password(password: &str, phc: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(phc) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Generates a random password.
#[must_use]
pub fn generate_password() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
