use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the
/// configured level. Returns `false` when a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(!init_logging(&config));
    }
}
