//! Tasklog - Sinks
//!
//! File output for task logs. A sink consumes one byte stream and writes it
//! into numbered files that rotate by size and are pruned by count.
//!
//! ```text
//! [byte stream] --> [FileRotator] --> <dir>/<base>.0, <base>.1, ...
//!                        ^
//!                  RotationLimitsHandle (live limit changes)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tasklog_sinks::{FileRotator, FileRotatorConfig, RotationLimits};
//!
//! let config = FileRotatorConfig::new("/alloc/web/local", "web.stdout");
//! let rotator = FileRotator::new(config, RotationLimits::new(10, 10 * 1024 * 1024))?;
//! let limits = rotator.limits_handle();
//!
//! let (writer, reader) = tokio::io::duplex(64 * 1024);
//! tokio::spawn(rotator.run(reader));
//! ```

/// Rotating file sink - size-bounded numbered files
pub mod rotating_file;

/// Shared utilities (segment writers, rate-limited logging)
pub mod util;

pub use rotating_file::{
    FileRotator, FileRotatorConfig, RotationLimits, RotationLimitsHandle, RotatorError,
    RotatorMetrics, RotatorMetricsSnapshot,
};
