// crates/tfstated-cli/src/lib.rs
// ============================================================================
// Module: tfstated CLI Library
// Description: Shared helpers for the tfstated binary.
// Purpose: Keep process-wide setup out of the command dispatcher.
// Dependencies: tfstated-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! Support code for the `tfstated` binary.

pub mod telemetry;
