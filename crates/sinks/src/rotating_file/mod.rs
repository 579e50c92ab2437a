//! Rotating File Sink - size-bounded task log files
//!
//! Consumes a single byte stream and spreads it over numbered files,
//! starting a new file whenever the current one reaches the size limit and
//! deleting the oldest files beyond the count limit.
//!
//! # Directory Structure
//!
//! ```text
//! <task_dir>/local/
//! ├── web.stdout.3   # oldest kept
//! ├── web.stdout.4
//! └── web.stdout.5   # currently written
//! ```
//!
//! Indexes only grow. A restarted rotator appends to the highest existing
//! index, so output from an earlier run is never overwritten.
//!
//! # Limits
//!
//! Limits live behind an `ArcSwap` and are read before every write, so a
//! [`RotationLimitsHandle`] can change them while the rotator runs:
//!
//! - a smaller size limit rotates before the next write, the current file is
//!   never truncated
//! - a smaller count limit is applied at the next rotation
//!
//! # Backpressure
//!
//! The rotator pulls from its reader only after the previous chunk has been
//! written, so a writer on the other side of a bounded pipe waits for disk.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::util::{BufferedSegmentWriter, SegmentWrite, SegmentWriter};

/// Size of each read from the input stream (64KB)
const READ_CHUNK_SIZE: usize = 64 * 1024;

// =============================================================================
// Configuration
// =============================================================================

/// Size and count limits for a rotated file set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationLimits {
    /// Files kept on disk, current file included
    pub max_files: usize,

    /// Bytes after which a new file is started
    pub max_file_bytes: u64,
}

impl RotationLimits {
    pub fn new(max_files: usize, max_file_bytes: u64) -> Self {
        Self {
            max_files,
            max_file_bytes,
        }
    }

    fn validate(&self) -> Result<(), RotatorError> {
        if self.max_files == 0 || self.max_file_bytes == 0 {
            return Err(RotatorError::InvalidLimits(*self));
        }
        Ok(())
    }
}

/// Rotating file configuration
#[derive(Debug, Clone)]
pub struct FileRotatorConfig {
    /// Directory holding the files (created if missing)
    pub dir: PathBuf,

    /// File name before the `.<index>` suffix
    pub base_name: String,

    /// Write buffer per file
    pub buffer_size: usize,

    /// Interval for flushing buffered bytes
    pub flush_interval: Duration,
}

impl FileRotatorConfig {
    pub fn new(dir: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
            buffer_size: crate::util::DEFAULT_BUFFER_SIZE,
            flush_interval: Duration::from_millis(100),
        }
    }

    /// Path of the file with the given index
    pub fn file_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("{}.{}", self.base_name, index))
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Rotating file errors
#[derive(Debug, thiserror::Error)]
pub enum RotatorError {
    /// Directory or first file could not be created
    #[error("failed to open log file in {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Limits of zero files or zero bytes
    #[error("invalid rotation limits: {0:?}")]
    InvalidLimits(RotationLimits),

    /// I/O error while reading input or writing files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// =============================================================================
// Metrics
// =============================================================================

/// Rotating file metrics
#[derive(Debug, Default)]
pub struct RotatorMetrics {
    pub bytes_written: AtomicU64,
    pub files_rotated: AtomicU64,
    pub files_removed: AtomicU64,
    pub write_errors: AtomicU64,
}

impl RotatorMetrics {
    pub const fn new() -> Self {
        Self {
            bytes_written: AtomicU64::new(0),
            files_rotated: AtomicU64::new(0),
            files_removed: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> RotatorMetricsSnapshot {
        RotatorMetricsSnapshot {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            files_rotated: self.files_rotated.load(Ordering::Relaxed),
            files_removed: self.files_removed.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of rotator metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotatorMetricsSnapshot {
    pub bytes_written: u64,
    pub files_rotated: u64,
    pub files_removed: u64,
    pub write_errors: u64,
}

// =============================================================================
// Limits handle
// =============================================================================

/// Shared handle for changing limits of a running rotator
#[derive(Clone)]
pub struct RotationLimitsHandle {
    limits: Arc<ArcSwap<RotationLimits>>,
}

impl RotationLimitsHandle {
    /// Current limits
    pub fn get(&self) -> RotationLimits {
        **self.limits.load()
    }

    /// Replace the limits; takes effect before the next write
    pub fn set(&self, limits: RotationLimits) -> Result<(), RotatorError> {
        limits.validate()?;
        let previous = self.limits.swap(Arc::new(limits));
        tracing::info!(
            max_files = limits.max_files,
            max_file_bytes = limits.max_file_bytes,
            previous_max_files = previous.max_files,
            previous_max_file_bytes = previous.max_file_bytes,
            "rotation limits updated"
        );
        Ok(())
    }
}

// =============================================================================
// Rotator
// =============================================================================

/// Writes one byte stream into size-rotated files
pub struct FileRotator {
    config: FileRotatorConfig,
    limits: Arc<ArcSwap<RotationLimits>>,
    segment_writer: Box<dyn SegmentWriter>,
    current: Box<dyn SegmentWrite>,
    current_index: u64,
    current_size: u64,
    metrics: Arc<RotatorMetrics>,
}

impl FileRotator {
    /// Create the directory and open the current file
    ///
    /// Appends to the highest-numbered existing file, or starts at index 0.
    pub fn new(config: FileRotatorConfig, limits: RotationLimits) -> Result<Self, RotatorError> {
        let segment_writer = BufferedSegmentWriter::new(config.buffer_size);
        Self::with_writer(config, limits, segment_writer)
    }

    /// Create a rotator with a custom segment writer
    pub fn with_writer<W: SegmentWriter + 'static>(
        config: FileRotatorConfig,
        limits: RotationLimits,
        segment_writer: W,
    ) -> Result<Self, RotatorError> {
        limits.validate()?;

        let init_err = |source| RotatorError::Init {
            path: config.dir.clone(),
            source,
        };

        fs::create_dir_all(&config.dir).map_err(init_err)?;
        let existing = existing_indexes(&config.dir, &config.base_name).map_err(init_err)?;
        let current_index = existing.last().copied().unwrap_or(0);

        let path = config.file_path(current_index);
        let file = File::options()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(init_err)?;
        let current_size = file.metadata().map_err(init_err)?.len();
        let current = segment_writer.wrap(file).map_err(init_err)?;

        tracing::info!(
            path = %path.display(),
            size = current_size,
            max_files = limits.max_files,
            max_file_bytes = limits.max_file_bytes,
            "opened rotating log file"
        );

        let rotator = Self {
            config,
            limits: Arc::new(ArcSwap::from_pointee(limits)),
            segment_writer: Box::new(segment_writer),
            current,
            current_index,
            current_size,
            metrics: Arc::new(RotatorMetrics::new()),
        };
        rotator.purge_old_files(limits.max_files);
        Ok(rotator)
    }

    /// Handle for changing limits while running
    pub fn limits_handle(&self) -> RotationLimitsHandle {
        RotationLimitsHandle {
            limits: Arc::clone(&self.limits),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<RotatorMetrics> {
        &self.metrics
    }

    /// Path of the file currently written
    pub fn current_path(&self) -> PathBuf {
        self.config.file_path(self.current_index)
    }

    /// Copy `reader` into the rotated files until end of stream
    ///
    /// Flushes every `flush_interval` and closes the current file when the
    /// reader reports EOF.
    pub async fn run<R: AsyncRead + Unpin>(
        mut self,
        mut reader: R,
    ) -> Result<RotatorMetricsSnapshot, RotatorError> {
        let mut buf = vec![0u8; READ_CHUNK_SIZE];
        let flush_interval = self.config.flush_interval.max(Duration::from_millis(1));
        let mut flush_ticker = tokio::time::interval(flush_interval);
        flush_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = match read {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) => {
                            tracing::error!(error = %e, "log stream read failed");
                            self.close();
                            return Err(RotatorError::Io(e));
                        }
                    };
                    if let Err(e) = self.write_chunk(&buf[..n]) {
                        self.metrics.write_errors.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(
                            path = %self.current_path().display(),
                            error = %e,
                            "log write failed"
                        );
                        self.close();
                        return Err(RotatorError::Io(e));
                    }
                }
                _ = flush_ticker.tick() => {
                    if let Err(e) = self.current.flush_all() {
                        tracing::error!(error = %e, "log flush failed");
                    }
                }
            }
        }

        let metrics = Arc::clone(&self.metrics);
        self.close();
        Ok(metrics.snapshot())
    }

    /// Write a chunk, splitting it where a file reaches the size limit
    fn write_chunk(&mut self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            let limits = **self.limits.load();
            if self.current_size >= limits.max_file_bytes {
                self.rotate(limits)?;
            }

            let room = limits.max_file_bytes - self.current_size;
            let take = usize::try_from(room).map_or(data.len(), |room| room.min(data.len()));
            let (head, tail) = data.split_at(take);

            self.current.write_all(head)?;
            self.current_size += head.len() as u64;
            self.metrics
                .bytes_written
                .fetch_add(head.len() as u64, Ordering::Relaxed);
            data = tail;
        }
        Ok(())
    }

    /// Close the current file and start the next index
    fn rotate(&mut self, limits: RotationLimits) -> io::Result<()> {
        let next_index = self.current_index + 1;
        let path = self.config.file_path(next_index);
        let file = File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let next = self.segment_writer.wrap(file)?;

        let previous = std::mem::replace(&mut self.current, next);
        if let Err(e) = previous.finish() {
            tracing::warn!(index = self.current_index, error = %e, "closing rotated file failed");
        }

        tracing::debug!(
            path = %path.display(),
            previous_size = self.current_size,
            "log file rotated"
        );

        self.current_index = next_index;
        self.current_size = 0;
        self.metrics.files_rotated.fetch_add(1, Ordering::Relaxed);
        self.purge_old_files(limits.max_files);
        Ok(())
    }

    /// Remove files older than the newest `max_files`
    fn purge_old_files(&self, max_files: usize) {
        let Some(oldest_kept) = self
            .current_index
            .checked_sub(max_files.saturating_sub(1) as u64)
        else {
            return;
        };

        let indexes = match existing_indexes(&self.config.dir, &self.config.base_name) {
            Ok(indexes) => indexes,
            Err(e) => {
                tracing::warn!(dir = %self.config.dir.display(), error = %e, "listing log files failed");
                return;
            }
        };

        for index in indexes.into_iter().filter(|&i| i < oldest_kept) {
            let path = self.config.file_path(index);
            match fs::remove_file(&path) {
                Ok(()) => {
                    self.metrics.files_removed.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(path = %path.display(), "removed old log file");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "removing old log file failed");
                }
            }
        }
    }

    /// Flush and close the current file
    fn close(self) {
        let path = self.current_path();
        if let Err(e) = self.current.finish() {
            tracing::error!(path = %path.display(), error = %e, "final flush failed");
        }
        tracing::info!(path = %path.display(), "rotating log file closed");
    }
}

/// Sorted indexes of `<base_name>.<index>` files in `dir`
fn existing_indexes(dir: &Path, base_name: &str) -> io::Result<Vec<u64>> {
    let prefix = format!("{base_name}.");
    let mut indexes = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(index) = name
            .strip_prefix(&prefix)
            .and_then(|suffix| suffix.parse::<u64>().ok())
        {
            indexes.push(index);
        }
    }

    indexes.sort_unstable();
    Ok(indexes)
}

#[cfg(test)]
#[path = "rotating_file_test.rs"]
mod rotating_file_test;
