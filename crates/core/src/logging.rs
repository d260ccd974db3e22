//! Structured logging for mesh processes.
//!
//! Security-relevant events are emitted on the [`SECURITY_TARGET`] target so
//! they can be filtered independently, e.g. `RUST_LOG=info,security=debug`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing target for security events (registrations, sends, tamper, etc.)
pub const SECURITY_TARGET: &str = "security";

/// Initialize the logging system with human readable output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use himesh_core::logging;
///
/// logging::init();
/// tracing::info!("Mesh node started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for log aggregation.
///
/// # Example
/// ```no_run
/// use himesh_core::logging;
///
/// logging::init_json();
/// tracing::info!(mesh = "himalayan-mesh", "Mesh node started");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
