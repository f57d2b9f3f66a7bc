use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .compact()
        .init();
}
