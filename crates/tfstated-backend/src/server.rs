// crates/tfstated-backend/src/server.rs
// ============================================================================
// Module: Backend Server
// Description: Router assembly, request logging, and the serve loop.
// Purpose: Expose the remote state protocol on a TCP listener.
// Dependencies: tfstated-core, axum, tokio, tracing
// ============================================================================

//! ## Overview
//! [`router`] builds the full application so tests can drive it in memory;
//! [`serve`] runs it on a bound listener until the shutdown future resolves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::time::Instant;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Request;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use serde_json::json;
use tfstated_core::SharedAccountStore;
use tfstated_core::SharedStateStore;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::protocol::dispatch;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server lifecycle errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be inspected or bound.
    #[error("bind error: {0}")]
    Bind(String),
    /// The serve loop failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Stores shared by every request handler.
#[derive(Clone)]
pub struct BackendState {
    /// State, version, and lock storage.
    pub states: SharedStateStore,
    /// Credential verification.
    pub accounts: SharedAccountStore,
}

impl BackendState {
    /// Bundles the stores behind the protocol handlers.
    #[must_use]
    pub const fn new(states: SharedStateStore, accounts: SharedAccountStore) -> Self {
        Self {
            states,
            accounts,
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the protocol router.
///
/// `GET /healthz` answers without authentication; every other method on
/// `/healthz` and every other path goes through the state protocol.
pub fn router(state: BackendState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/healthz", get(healthz).fallback(dispatch))
        .fallback(dispatch)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Serves `app` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError`] when the listener address is unavailable or the
/// serve loop fails.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let addr = listener.local_addr().map_err(|err| ServerError::Bind(err.to_string()))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|err| ServerError::Transport(err.to_string()))?;
    tracing::info!("server stopped");
    Ok(())
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Liveness probe.
async fn healthz() -> impl IntoResponse {
    Json(json!({}))
}

/// Logs one event per request with its outcome and latency.
async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms,
        "request"
    );
    response
}
