//! Logging configuration
//!
//! Level and output format for the subscriber installed by
//! `tasklog_collector::init_logging`.

use serde::Deserialize;

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Name understood by `tracing_subscriber::EnvFilter`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Console,
    /// JSON structured logging
    Json,
}

/// Logging configuration
///
/// # Example
///
/// ```toml
/// [log]
/// level = "debug"
/// format = "json"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level applied to the collector's own targets
    pub level: LogLevel,

    /// Output format
    pub format: LogFormat,
}

impl LogConfig {
    /// Filter directive limiting the level to the tasklog crates
    ///
    /// Other targets stay at `warn` so a chatty embedder dependency does not
    /// drown the collector's events.
    pub fn filter_directive(&self) -> String {
        let level = self.level.as_str();
        format!(
            "warn,tasklog_collector={level},tasklog_sources={level},tasklog_sinks={level}"
        )
    }
}
