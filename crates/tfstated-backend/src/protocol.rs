// crates/tfstated-backend/src/protocol.rs
// ============================================================================
// Module: Remote State Protocol
// Description: Verb dispatch and per-verb handlers for state paths.
// Purpose: Implement GET, POST, LOCK, UNLOCK, and DELETE over the store.
// Dependencies: tfstated-core, axum, serde, tokio
// ============================================================================

//! ## Overview
//! Every request that is not a health check lands in [`dispatch`]. The verb
//! is checked first, then credentials, then the path. The root path never
//! names a state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Deserialize;
use tfstated_core::Account;
use tfstated_core::Lock;
use tfstated_core::LockOutcome;
use tfstated_core::StateStore;
use tfstated_core::StoreError;
use tfstated_core::WriteOutcome;

use crate::auth::authenticate;
use crate::error::BackendError;
use crate::server::BackendState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `LOCK` extension verb.
const LOCK: &[u8] = b"LOCK";
/// `UNLOCK` extension verb.
const UNLOCK: &[u8] = b"UNLOCK";
/// Root path, which never names a state.
const ROOT_PATH: &str = "/";
/// JSON media type.
const APPLICATION_JSON: &str = "application/json";

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Protocol verbs served on state paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    /// Read the current version.
    Get,
    /// Append a version.
    Post,
    /// Acquire the lock.
    Lock,
    /// Release the lock.
    Unlock,
    /// Delete the state.
    Delete,
}

impl Verb {
    /// Maps an HTTP method onto a protocol verb.
    fn from_method(method: &Method) -> Option<Self> {
        if *method == Method::GET {
            return Some(Self::Get);
        }
        if *method == Method::POST {
            return Some(Self::Post);
        }
        if *method == Method::DELETE {
            return Some(Self::Delete);
        }
        match method.as_str().as_bytes() {
            LOCK => Some(Self::Lock),
            UNLOCK => Some(Self::Unlock),
            _ => None,
        }
    }

    /// Returns the verb name used in messages.
    const fn name(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Lock => "LOCK",
            Self::Unlock => "UNLOCK",
            Self::Delete => "DELETE",
        }
    }
}

/// Routes a state path request to its verb handler.
pub(crate) async fn dispatch(
    State(state): State<BackendState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(verb) = Verb::from_method(&method) else {
        return BackendError::MethodNotAllowed(format!("method {method} not allowed"))
            .into_response();
    };
    let result = match authenticate(&state.accounts, &headers).await {
        Ok(account) => handle(&state, verb, &uri, &account, body).await,
        Err(err) => Err(err),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

/// Runs an authenticated verb against the path in `uri`.
async fn handle(
    state: &BackendState,
    verb: Verb,
    uri: &Uri,
    account: &Account,
    body: Bytes,
) -> Result<Response, BackendError> {
    let path = uri.path().to_string();
    if path == ROOT_PATH {
        let message = format!("no state path provided, cannot {} /", verb.name());
        return Err(if verb == Verb::Lock {
            BackendError::NotFound(message)
        } else {
            BackendError::BadRequest(message)
        });
    }
    match verb {
        Verb::Get => get_state(state, path).await,
        Verb::Post => post_state(state, path, uri, account, body).await,
        Verb::Lock => lock_state(state, path, &body).await,
        Verb::Unlock => unlock_state(state, path, &body).await,
        Verb::Delete => delete_state(state, path).await,
    }
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST` query parameters.
#[derive(Debug, Default, Deserialize)]
struct WriteParams {
    /// Lock token held by the writer, empty for an unlocked push.
    #[serde(rename = "ID", default)]
    id: String,
}

/// Returns the current state body.
async fn get_state(state: &BackendState, path: String) -> Result<Response, BackendError> {
    let states = state.states.clone();
    let body = run_blocking(move || states.read(&path)).await?;
    let headers = [
        (CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache")),
        (CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON)),
    ];
    Ok((StatusCode::OK, headers, body).into_response())
}

/// Appends a version, checking the `ID` query token when present.
async fn post_state(
    state: &BackendState,
    path: String,
    uri: &Uri,
    account: &Account,
    body: Bytes,
) -> Result<Response, BackendError> {
    let Query(params) = Query::<WriteParams>::try_from_uri(uri)
        .map_err(|err| BackendError::BadRequest(format!("invalid query: {err}")))?;
    if body.is_empty() {
        return Err(BackendError::BadRequest("request body is empty".to_string()));
    }
    let states = state.states.clone();
    let account_id = account.id;
    let outcome =
        run_blocking(move || states.write(&path, account_id, &body, &params.id)).await?;
    match outcome {
        WriteOutcome::Committed => Ok(StatusCode::OK.into_response()),
        WriteOutcome::LockMismatch => {
            Err(BackendError::Conflict("lock id mismatch, state not written".to_string()))
        }
    }
}

/// Acquires the lock or answers 409 with the current holder.
async fn lock_state(
    state: &BackendState,
    path: String,
    body: &[u8],
) -> Result<Response, BackendError> {
    let lock = Lock::parse_validated(body).map_err(StoreError::from)?;
    let states = state.states.clone();
    let outcome = run_blocking(move || states.acquire_or_inspect(&path, &lock)).await?;
    match outcome {
        LockOutcome::Acquired => Ok(StatusCode::OK.into_response()),
        LockOutcome::Held(existing) => lock_response(StatusCode::CONFLICT, &existing),
    }
}

/// Releases the lock or answers 409 echoing the supplied lock.
async fn unlock_state(
    state: &BackendState,
    path: String,
    body: &[u8],
) -> Result<Response, BackendError> {
    let lock = Lock::parse_validated(body).map_err(StoreError::from)?;
    let states = state.states.clone();
    let supplied = lock.clone();
    let released = run_blocking(move || states.release(&path, &supplied)).await?;
    if released {
        Ok(StatusCode::OK.into_response())
    } else {
        lock_response(StatusCode::CONFLICT, &lock)
    }
}

/// Deletes the state and its history.
async fn delete_state(state: &BackendState, path: String) -> Result<Response, BackendError> {
    let states = state.states.clone();
    let message = format!("state path not found: {path}");
    let removed = run_blocking(move || states.delete(&path)).await?;
    if removed {
        Ok(StatusCode::OK.into_response())
    } else {
        Err(BackendError::NotFound(message))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders a lock record as a JSON response body.
fn lock_response(status: StatusCode, lock: &Lock) -> Result<Response, BackendError> {
    let body = lock.to_json().map_err(StoreError::from)?;
    Ok((status, [(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))], body)
        .into_response())
}

/// Runs a synchronous store call on the blocking pool.
///
/// # Errors
///
/// Returns the mapped store error, or [`BackendError::Internal`] when the
/// blocking task panics or is cancelled.
pub(crate) async fn run_blocking<T, F>(call: F) -> Result<T, BackendError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|err| BackendError::Internal(format!("store task failed: {err}")))?
        .map_err(BackendError::from)
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
    fn verbs_map_from_methods() {
        assert_eq!(Verb::from_method(&Method::GET), Some(Verb::Get));
        assert_eq!(Verb::from_method(&Method::POST), Some(Verb::Post));
        assert_eq!(Verb::from_method(&Method::DELETE), Some(Verb::Delete));
        assert_eq!(Verb::from_method(&Method::from_bytes(LOCK).unwrap()), Some(Verb::Lock));
        assert_eq!(Verb::from_method(&Method::from_bytes(UNLOCK).unwrap()), Some(Verb::Unlock));
        assert_eq!(Verb::from_method(&Method::PUT), None);
        assert_eq!(Verb::from_method(&Method::from_bytes(b"lock").unwrap()), None);
    }

    #[test]
    fn write_params_default_to_unlocked_push() {
        let uri: Uri = "/a".parse().unwrap();
        let Query(params) = Query::<WriteParams>::try_from_uri(&uri).unwrap();
        assert!(params.id.is_empty());
        let uri: Uri = "/a?ID=abc".parse().unwrap();
        let Query(params) = Query::<WriteParams>::try_from_uri(&uri).unwrap();
        assert_eq!(params.id, "abc");
    }
}
