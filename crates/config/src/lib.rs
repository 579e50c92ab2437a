//! tasklog configuration
//!
//! TOML-backed settings for the per-task syslog collector. Every section is
//! optional; an empty document yields the defaults.
//!
//! The collector itself never reads files. An orchestrator that keeps these
//! settings in its own config file can load them with [`Config::from_file`] or
//! `FromStr` and hand the pieces to the collector.
//!
//! ```
//! use std::str::FromStr;
//! use tasklog_config::Config;
//!
//! let config = Config::from_str("[rotation]\nmax_files = 3").unwrap();
//! assert_eq!(config.rotation.max_files, 3);
//! ```

mod collector;
mod error;
mod logging;
mod rotation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use collector::CollectorConfig;
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use rotation::{DEFAULT_MAX_FILE_SIZE_MB, DEFAULT_MAX_FILES, RotationPolicy};

use serde::Deserialize;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings
    pub log: LogConfig,

    /// Listener, bridge and shutdown tunables
    pub collector: CollectorConfig,

    /// Default rotation policy for task logs
    pub rotation: RotationPolicy,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, is not valid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.collector.validate()?;
        self.rotation.validate()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
