// crates/tfstated-backend/src/lib.rs
// ============================================================================
// Module: tfstated Backend Library
// Description: Terraform HTTP remote state protocol over axum.
// Purpose: Map remote state verbs onto the core store contracts.
// Dependencies: tfstated-core, axum, tokio, tracing
// ============================================================================

//! ## Overview
//! The backend speaks the Terraform `http` backend protocol: `GET`, `POST`,
//! `LOCK`, `UNLOCK`, and `DELETE` against arbitrary state paths, each behind
//! HTTP basic authentication, plus an unauthenticated `GET /healthz`.
//! Store calls are synchronous and run on the blocking pool.
//! Security posture: request bodies, paths, and credentials are untrusted;
//! lock payloads are validated before reaching the store.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod auth;
mod error;
mod protocol;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::BASIC_REALM;
pub use auth::BasicCredentials;
pub use error::BackendError;
pub use server::BackendState;
pub use server::ServerError;
pub use server::router;
pub use server::serve;
