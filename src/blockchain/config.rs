use serde::Deserialize;
use thiserror::Error;

use std::fs;
use std::path::Path;

/// A SHA-256 hex digest has 64 characters, more leading zeros can never be found
pub const MAX_DIFFICULTY: usize = 64;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Tunables of a [`Ledger`](super::Ledger)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Leading zero hex digits a block hash needs
    pub difficulty: usize,

    /// Amount paid to the miner of each block
    pub mining_reward: i64,

    /// Maximum number of queued transactions
    pub max_pending: usize,

    /// Queue a reward for the same miner after each mined block
    pub preseed_reward: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            difficulty: 2,
            mining_reward: 100,
            max_pending: 1024,
            preseed_reward: false,
        }
    }
}

impl LedgerConfig {
    /// Parses a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "difficulty {} exceeds the maximum of {}",
                self.difficulty, MAX_DIFFICULTY
            )));
        }

        if self.mining_reward <= 0 {
            return Err(ConfigError::Invalid(format!(
                "mining_reward must be positive: {}",
                self.mining_reward
            )));
        }

        if self.max_pending == 0 {
            return Err(ConfigError::Invalid("max_pending must be at least 1".to_string()));
        }

        Ok(())
    }
}
