//! Diagnostic tracing for the access-control service.
//!
//! Mutation state transitions log at `debug`, replicated commits at `info`,
//! push rejections at `warn` and committed-but-unpushed states at `error`.
//! The git history itself is the audit log; tracing is never persisted.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=gatekeeper=debug gatekeeper add-group team
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
