//! Configuration module for the SIS3316 converter
//!
//! The DAQ layout (how many cards wrote the file, how many channels each
//! card carries) is not derivable from the stream and must match the run
//! that produced the input.
//!
//! # Example
//! ```ignore
//! let config = Config::load("config.toml")?;
//! let reader = SpillReader::from_config(&config.daq);
//! ```

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daq: DaqConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Run-specific DAQ layout
#[derive(Debug, Clone, Deserialize)]
pub struct DaqConfig {
    /// Number of SIS3316 cards that contributed to the stream
    #[serde(default = "default_cards")]
    pub cards: u16,

    /// Channels stored per card
    #[serde(default = "default_channels_per_card")]
    pub channels_per_card: u16,
}

impl Default for DaqConfig {
    fn default() -> Self {
        Self {
            cards: default_cards(),
            channels_per_card: default_channels_per_card(),
        }
    }
}

fn default_cards() -> u16 {
    1
}

fn default_channels_per_card() -> u16 {
    16
}

/// Output file settings
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory for converted event files
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_output_directory() -> String {
    ".".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check layout constraints the stream format assumes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daq.cards == 0 {
            return Err(ConfigError::Invalid {
                field: "daq.cards",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.daq.channels_per_card == 0 {
            return Err(ConfigError::Invalid {
                field: "daq.channels_per_card",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
