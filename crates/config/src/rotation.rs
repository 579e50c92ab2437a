//! Log rotation policy
//!
//! How many files a task's log may occupy and how large each may grow.
//! Sizes are configured in megabytes and converted to bytes with checked
//! arithmetic, so an implausible value is rejected instead of wrapping.

use serde::Deserialize;

use crate::error::{ConfigError, Result};

/// Default number of rotated files kept per task
pub const DEFAULT_MAX_FILES: u32 = 10;

/// Default maximum size of one log file (MB)
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 10;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Rotation policy for a task's log files
///
/// # Example
///
/// ```toml
/// [rotation]
/// max_files = 5
/// max_file_size_mb = 20
/// ```
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RotationPolicy {
    /// Maximum number of files kept on disk (oldest evicted first)
    /// Default: 10
    pub max_files: u32,

    /// Maximum size of a single file in megabytes
    /// Default: 10
    pub max_file_size_mb: u64,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
        }
    }
}

impl RotationPolicy {
    /// Create a policy from explicit limits
    pub fn new(max_files: u32, max_file_size_mb: u64) -> Self {
        Self {
            max_files,
            max_file_size_mb,
        }
    }

    /// Maximum file size in bytes (`max_file_size_mb * 1024 * 1024`)
    ///
    /// # Errors
    ///
    /// Returns `InvalidValue` if the size is zero or the conversion overflows.
    pub fn max_file_size_bytes(&self) -> Result<u64> {
        if self.max_file_size_mb == 0 {
            return Err(ConfigError::invalid_value(
                "rotation",
                "max_file_size_mb",
                "must be at least 1",
            ));
        }
        self.max_file_size_mb
            .checked_mul(BYTES_PER_MB)
            .ok_or_else(|| {
                ConfigError::invalid_value(
                    "rotation",
                    "max_file_size_mb",
                    format!("{} MB does not fit in a byte count", self.max_file_size_mb),
                )
            })
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(ConfigError::invalid_value(
                "rotation",
                "max_files",
                "must be at least 1",
            ));
        }
        self.max_file_size_bytes().map(|_| ())
    }
}
