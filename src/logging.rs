//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use crate::error::ChainError;
use tracing::Level;

pub fn parse_level(level: &str) -> Result<Level, ChainError> {
    level
        .parse::<Level>()
        .map_err(|_| ChainError::ConfigError(format!("Unknown log level: {}", level)))
}

/// Install a fmt subscriber at the configured level. A subscriber that is
/// already installed is left in place.
pub fn init(config: &LoggingConfig) -> Result<(), ChainError> {
    let level = parse_level(&config.level)?;
    if tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert_eq!(parse_level("WARN").unwrap(), Level::WARN);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_init_twice() {
        let config = LoggingConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_ok());
    }
}
