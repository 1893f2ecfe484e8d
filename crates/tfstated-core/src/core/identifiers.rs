// crates/tfstated-core/src/core/identifiers.rs
// ============================================================================
// Module: tfstated Identifiers
// Description: Time-sortable identifiers for states, versions, and accounts.
// Purpose: Provide strongly typed UUIDv7 identifiers with stable string forms.
// Dependencies: uuid, thiserror
// ============================================================================

//! ## Overview
//! Every persisted record is keyed by a UUIDv7. The embedded millisecond
//! timestamp makes identifiers sort by creation time, which the version store
//! relies on: the greatest version identifier of a state is its current body.
//! Identifiers are stored as hyphenated lowercase text so that SQLite text
//! ordering matches UUID ordering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Identifier parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Input is not a UUID.
    #[error("invalid identifier: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Declares a UUIDv7-backed identifier newtype.
macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh time-sortable identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::now_v7())
            }

            /// Parses an identifier from its textual form.
            ///
            /// # Errors
            ///
            /// Returns [`IdentifierError::Invalid`] when `value` is not a UUID.
            pub fn parse(value: &str) -> Result<Self, IdentifierError> {
                Uuid::parse_str(value)
                    .map(Self)
                    .map_err(|err| IdentifierError::Invalid(format!("{value}: {err}")))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.hyphenated().fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = IdentifierError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value)
            }
        }
    };
}

uuid_identifier!(
    /// Identifier of a state document.
    StateId
);

uuid_identifier!(
    /// Identifier of an immutable state version. Greater means more recent.
    VersionId
);

uuid_identifier!(
    /// Identifier of an account authoring versions.
    AccountId
);

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    #[test]
    fn generated_identifiers_sort_by_creation() {
        let first = VersionId::generate();
        let second = VersionId::generate();
        assert!(first < second);
        assert!(first.to_string() < second.to_string());
    }

    #[test]
    fn parse_round_trips_display() {
        let id = StateId::generate();
        let parsed: StateId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(AccountId::parse("not-a-uuid").is_err());
    }
}
