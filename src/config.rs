//! Configuration management for forkledger

use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Blocks whose parent sits more than this many heights below the best tip
/// are no longer admissible.
pub const CUTOFF_AGE: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_cutoff_age")]
    pub cutoff_age: u64,
    /// Retained block nodes above which retention pruning kicks in.
    #[serde(default = "default_max_retained_nodes")]
    pub max_retained_nodes: usize,
    /// Value of the coinbase output in locally assembled blocks.
    #[serde(default = "default_coinbase_reward")]
    pub coinbase_reward: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            cutoff_age: default_cutoff_age(),
            max_retained_nodes: default_max_retained_nodes(),
            coinbase_reward: default_coinbase_reward(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn from_toml_str(config_str: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.chain.max_retained_nodes as u64 <= self.chain.cutoff_age {
            return Err(ChainError::ConfigError(format!(
                "chain.max_retained_nodes ({}) must exceed chain.cutoff_age ({})",
                self.chain.max_retained_nodes, self.chain.cutoff_age
            )));
        }

        if self.chain.coinbase_reward < 0 {
            return Err(ChainError::ConfigError(
                "chain.coinbase_reward cannot be negative".to_string(),
            ));
        }

        crate::logging::parse_level(&self.logging.level)?;
        Ok(())
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ChainError> {
    match fs::read_to_string(path.as_ref()) {
        Ok(config_str) => Config::from_toml_str(&config_str),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Config::default()),
        Err(e) => Err(e.into()),
    }
}

fn default_cutoff_age() -> u64 {
    CUTOFF_AGE
}

fn default_max_retained_nodes() -> usize {
    100
}

fn default_coinbase_reward() -> i64 {
    25
}

fn default_log_level() -> String {
    "info".to_string()
}
