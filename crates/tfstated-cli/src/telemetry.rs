// crates/tfstated-cli/src/telemetry.rs
// ============================================================================
// Module: Telemetry
// Description: Global tracing subscriber installation.
// Purpose: Route structured logs to stderr as text or JSON lines.
// Dependencies: tfstated-config, tracing-subscriber
// ============================================================================

//! ## Overview
//! `RUST_LOG` overrides the default directive. Logs always go to stderr so
//! command output on stdout stays machine-readable. Only the first call in a
//! process installs a subscriber.

use tfstated_config::LogFormat;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Installs the global subscriber with `default_directive` unless `RUST_LOG` is set.
pub fn init_tracing(format: LogFormat, default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => {
            registry.with(fmt::layer().with_target(false).with_writer(std::io::stderr)).try_init()
        }
        LogFormat::Json => registry
            .with(fmt::layer().with_target(false).json().with_writer(std::io::stderr))
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
