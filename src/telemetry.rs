//! Tracing subscriber setup for binaries.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global formatting subscriber filtered by `directives`.
///
/// `RUST_LOG` syntax applies. An unparsable filter falls back to
/// `sprintline=info`.
///
/// # Errors
///
/// Returns an error when a global subscriber is already installed.
pub fn init_tracing(directives: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("sprintline=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}
