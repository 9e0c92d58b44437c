//! Tracing bootstrap

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides `default_directive`.
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
