// crates/tfstated-backend/src/auth.rs
// ============================================================================
// Module: Basic Authentication
// Description: Authorization header parsing and account verification.
// Purpose: Resolve the account that authors a remote state request.
// Dependencies: tfstated-core, axum, base64, tokio
// ============================================================================

//! ## Overview
//! Terraform sends HTTP basic credentials on every request. A missing or
//! unparsable header answers 401 with a challenge; credentials that do not
//! verify answer 403.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tfstated_core::Account;
use tfstated_core::AccountStore;
use tfstated_core::SharedAccountStore;

use crate::error::BackendError;
use crate::protocol::run_blocking;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `WWW-Authenticate` challenge sent with 401 responses.
pub const BASIC_REALM: &str = "Basic realm=\"tfstated\", charset=\"UTF-8\"";
/// Authorization scheme prefix.
const BASIC_PREFIX: &str = "Basic ";

// ============================================================================
// SECTION: Credentials
// ============================================================================

/// Username and password decoded from an `Authorization: Basic` header.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Account username.
    pub username: String,
    /// Plaintext password.
    pub password: String,
}

impl BasicCredentials {
    /// Decodes credentials from request headers.
    ///
    /// Returns `None` when the header is absent, uses another scheme, or
    /// does not decode to `username:password`.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
        let (scheme, encoded) = value.split_at_checked(BASIC_PREFIX.len())?;
        if !scheme.eq_ignore_ascii_case(BASIC_PREFIX) {
            return None;
        }
        let decoded = BASE64.decode(encoded.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Authenticates the request against the account store.
///
/// # Errors
///
/// Returns [`BackendError::Unauthorized`] without usable credentials,
/// [`BackendError::Forbidden`] when they do not verify, and
/// [`BackendError::Internal`] when the store fails.
pub(crate) async fn authenticate(
    accounts: &SharedAccountStore,
    headers: &HeaderMap,
) -> Result<Account, BackendError> {
    let credentials = BasicCredentials::from_headers(headers).ok_or(BackendError::Unauthorized)?;
    let accounts = accounts.clone();
    let account = run_blocking(move || {
        accounts.authenticate(&credentials.username, &credentials.password)
    })
    .await?;
    account.ok_or(BackendError::Forbidden)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use axum::http::HeaderValue;

    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn decodes_basic_credentials() {
        let encoded = BASE64.encode("alice:pa:ss");
        let credentials =
            BasicCredentials::from_headers(&headers_with(&format!("Basic {encoded}"))).unwrap();
        assert_eq!(credentials.username, "alice");
        assert_eq!(credentials.password, "pa:ss");
        let lower = BasicCredentials::from_headers(&headers_with(&format!("basic {encoded}")));
        assert!(lower.is_some());
    }

    #[test]
    fn rejects_unusable_headers() {
        assert!(BasicCredentials::from_headers(&HeaderMap::new()).is_none());
        assert!(BasicCredentials::from_headers(&headers_with("Bearer abc")).is_none());
        assert!(BasicCredentials::from_headers(&headers_with("Basic !!!")).is_none());
        let no_colon = BASE64.encode("alice");
        assert!(
            BasicCredentials::from_headers(&headers_with(&format!("Basic {no_colon}"))).is_none()
        );
        assert!(BasicCredentials::from_headers(&headers_with("Basic")).is_none());
    }
}
