//! Rate-limited warning logger
//!
//! A task that writes garbage to its syslog socket can produce one bad
//! record per line. This logger emits at most one warning per interval and
//! reports how many were suppressed in between.
//!
//! ```ignore
//! let logger = RateLimitedLogger::new(Duration::from_secs(10));
//! for _ in 0..1000 {
//!     logger.warn("dropping malformed record", &reason);
//! }
//! ```

use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Default interval between emitted warnings
pub const DEFAULT_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Rate-limited logger
pub struct RateLimitedLogger {
    min_interval: Duration,
    last_log_time: Mutex<Option<Instant>>,
    /// Occurrences since the last emitted warning
    pending: AtomicU64,
    total: AtomicU64,
}

impl RateLimitedLogger {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_log_time: Mutex::new(None),
            pending: AtomicU64::new(0),
            total: AtomicU64::new(0),
        }
    }

    /// Count an occurrence and emit a warning if the interval has passed
    ///
    /// Returns true if a warning was emitted.
    pub fn warn(&self, message: &str, detail: &dyn Display) -> bool {
        self.pending.fetch_add(1, Ordering::Relaxed);
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;

        if !self.should_log() {
            return false;
        }

        let count = self.pending.swap(0, Ordering::Relaxed);
        if count > 1 {
            tracing::warn!(
                detail = %detail,
                suppressed_count = count - 1,
                total,
                "{message} (rate-limited)"
            );
        } else {
            tracing::warn!(detail = %detail, total, "{message}");
        }
        true
    }

    fn should_log(&self) -> bool {
        let mut last_time = self.last_log_time.lock();
        let now = Instant::now();
        match *last_time {
            Some(last) if now.duration_since(last) < self.min_interval => false,
            _ => {
                *last_time = Some(now);
                true
            }
        }
    }

    /// Occurrences not yet reported
    pub fn pending_count(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// All occurrences ever counted
    pub fn total_count(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

impl Default for RateLimitedLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_INTERVAL)
    }
}
