//! Tracing subscriber setup

use tether_core::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `--verbose`, which wins over the configured filter.
pub fn init(verbose: bool, config: &LoggingConfig) {
    let fallback = if verbose { "debug" } else { config.filter.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .init();
}
