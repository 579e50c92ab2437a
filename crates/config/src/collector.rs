//! Collector runtime tunables
//!
//! Sizes for the listener, the record channel and the pipe feeding the
//! rotating file, plus the shutdown deadline used by `exit`.

use serde::Deserialize;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Collector configuration
///
/// # Example
///
/// ```toml
/// [collector]
/// record_queue_size = 256
/// shutdown_timeout = "2s"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Host name resolved when probing ports and binding the listener
    /// Default: "localhost"
    pub bind_host: String,

    /// Capacity of the channel between the listener and the bridge pump
    /// Default: 1024 records
    pub record_queue_size: usize,

    /// Bytes the pipe between bridge and sink may hold before the pump blocks
    /// Default: 64KB
    pub pipe_buffer_size: usize,

    /// Read buffer per syslog connection
    /// Default: 64KB
    pub read_buffer_size: usize,

    /// Longest accepted syslog line; longer lines are dropped
    /// Default: 64KB
    pub max_message_size: usize,

    /// Write buffer in front of each log file
    /// Default: 64KB
    pub write_buffer_size: usize,

    /// Interval at which the sink flushes buffered bytes to disk
    /// Default: 100ms
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// How long `exit` waits for each background task before aborting it
    /// Default: 5s
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            bind_host: "localhost".into(),
            record_queue_size: 1024,
            pipe_buffer_size: 64 * 1024,
            read_buffer_size: 64 * 1024,
            max_message_size: 64 * 1024,
            write_buffer_size: 64 * 1024,
            flush_interval: Duration::from_millis(100),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl CollectorConfig {
    /// Check every size is non-zero
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("record_queue_size", self.record_queue_size),
            ("pipe_buffer_size", self.pipe_buffer_size),
            ("read_buffer_size", self.read_buffer_size),
            ("max_message_size", self.max_message_size),
            ("write_buffer_size", self.write_buffer_size),
        ];
        for (field, value) in sizes {
            if value == 0 {
                return Err(ConfigError::invalid_value(
                    "collector",
                    field,
                    "must be greater than 0",
                ));
            }
        }
        if self.bind_host.is_empty() {
            return Err(ConfigError::invalid_value(
                "collector",
                "bind_host",
                "must not be empty",
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ConfigError::invalid_value(
                "collector",
                "flush_interval",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CollectorConfig::default();
        assert_eq!(config.bind_host, "localhost");
        assert_eq!(config.record_queue_size, 1024);
        assert_eq!(config.pipe_buffer_size, 64 * 1024);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_durations() {
        let toml = r#"
flush_interval = "50ms"
shutdown_timeout = "2s"
"#;
        let config: CollectorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.flush_interval, Duration::from_millis(50));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(2));
        assert_eq!(config.record_queue_size, 1024);
    }

    #[test]
    fn test_zero_size_rejected() {
        let config = CollectorConfig {
            pipe_buffer_size: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pipe_buffer_size"));
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = CollectorConfig {
            bind_host: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
