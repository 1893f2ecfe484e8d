// crates/tfstated-backend/src/error.rs
// ============================================================================
// Module: Backend Errors
// Description: Request failures and their HTTP rendering.
// Purpose: Translate store outcomes into protocol status codes.
// Dependencies: tfstated-core, axum, serde, thiserror
// ============================================================================

//! ## Overview
//! Every failed request renders as `{"msg": ..., "status": ...}`. Internal
//! details are logged and replaced with a generic message on the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;
use tfstated_core::StoreError;
use thiserror::Error;

use crate::auth::BASIC_REALM;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Request-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No usable basic credentials were supplied.
    #[error("Unauthorized")]
    Unauthorized,
    /// Credentials were supplied but did not verify.
    #[error("Forbidden")]
    Forbidden,
    /// The request is malformed.
    #[error("{0}")]
    BadRequest(String),
    /// The state path does not exist.
    #[error("{0}")]
    NotFound(String),
    /// The verb is not part of the protocol.
    #[error("{0}")]
    MethodNotAllowed(String),
    /// A lock blocks the request.
    #[error("{0}")]
    Conflict(String),
    /// The store or runtime failed.
    #[error("{0}")]
    Internal(String),
}

impl BackendError {
    /// Returns the HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for BackendError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::LockConflict(message) | StoreError::DuplicatePath(message) => {
                Self::Conflict(message)
            }
            StoreError::Validation(message) => Self::BadRequest(message),
            StoreError::Crypto(_) | StoreError::Internal(_) => Self::Internal(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Wire shape of an error response.
#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    /// Human-readable message.
    pub(crate) msg: String,
    /// Numeric HTTP status.
    pub(crate) status: u16,
}

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let mut response = (
            status,
            Json(ErrorBody {
                msg,
                status: status.as_u16(),
            }),
        )
            .into_response();
        if matches!(self, Self::Unauthorized) {
            response.headers_mut().insert(WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_REALM));
        }
        response
    }
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

    use super::*;

    #[test]
    fn store_errors_map_to_protocol_statuses() {
        let cases = [
            (StoreError::NotFound("x".to_string()), StatusCode::NOT_FOUND),
            (StoreError::LockConflict("x".to_string()), StatusCode::CONFLICT),
            (StoreError::DuplicatePath("x".to_string()), StatusCode::CONFLICT),
            (StoreError::Validation("x".to_string()), StatusCode::BAD_REQUEST),
            (StoreError::Crypto("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
            (StoreError::Internal("x".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(BackendError::from(err).status(), status);
        }
    }

    #[test]
    fn unauthorized_carries_challenge() {
        let response = BackendError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), BASIC_REALM);
        let response = BackendError::Forbidden.into_response();
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());
    }
}
