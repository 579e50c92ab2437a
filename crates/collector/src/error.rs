//! Collector errors

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tasklog_config::ConfigError;

/// Result type for collector operations
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Errors returned by the collector's lifecycle operations
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    /// Every port in the range is taken, the range is empty, or the host
    /// did not resolve
    #[error("no free port in range {lower}..={upper}")]
    NoFreePort { lower: u16, upper: u16 },

    /// The task has no resolvable directory
    #[error("no directory found for task '{task}'")]
    DirectoryNotFound { task: String },

    /// The listener could not bind the allocated address
    #[error("failed to bind syslog listener to {address}: {source}")]
    ListenerBindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The log directory or first log file could not be created
    #[error("failed to open task log in {path}: {source}")]
    SinkInitFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Rotation policy or collector tunables are invalid
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// `launch` called on a collector that is not idle
    #[error("collector already launched")]
    AlreadyLaunched,

    /// Operation requires a running collector
    #[error("collector is not running")]
    NotRunning,

    /// A background task did not stop in time and was aborted
    #[error("{task} did not stop within {timeout:?}")]
    ShutdownTimeout {
        task: &'static str,
        timeout: Duration,
    },

    /// A global log subscriber is already installed
    #[error("failed to install log subscriber: {0}")]
    LoggingInit(#[from] tracing_subscriber::util::TryInitError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Per-record decode failure; the record is dropped and the stream continues
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_failure() {
        let err = CollectorError::NoFreePort {
            lower: 10000,
            upper: 10010,
        };
        assert_eq!(err.to_string(), "no free port in range 10000..=10010");

        let err = CollectorError::DirectoryNotFound {
            task: "web".into(),
        };
        assert!(err.to_string().contains("'web'"));

        let err = CollectorError::ShutdownTimeout {
            task: "log sink",
            timeout: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "log sink did not stop within 5s");
    }

    #[test]
    fn test_config_error_converts() {
        let err: CollectorError =
            ConfigError::invalid_value("rotation", "max_files", "must be at least 1").into();
        assert!(matches!(err, CollectorError::InvalidConfig(_)));
    }
}
