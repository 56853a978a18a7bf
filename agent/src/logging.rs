//! Diagnostic tracing for the agent.
//!
//! Everything goes to stderr so stdout carries only command output (answers,
//! the tool catalogue).

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`. Compact format on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=toolagent=debug toolagent run "compare appendectomy prices"
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
