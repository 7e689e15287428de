//! Tracing setup for the agent binary.
//!
//! Log lines are the agent's only report of what it did, so the default level
//! is `info`. `--quiet` lowers it to `warn`. `RUST_LOG` overrides both.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=reflex_agent=debug reflex-agent --server-url http://10.0.0.5:3000
/// ```
pub fn init(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
