//! Host-side tracing setup.

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `UTMKEEP_LOG`, then `RUST_LOG`,
/// defaulting to `info`. Does nothing if a global subscriber is already set.
pub fn init() {
    let filter = std::env::var("UTMKEEP_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .try_init();
}
