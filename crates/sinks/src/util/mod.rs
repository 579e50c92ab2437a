//! Sink utilities for file output
//!
//! - **segment_writer**: buffered writers wrapped around each rotated file
//! - **rate_limited_logger**: warnings that stay readable under floods

pub mod rate_limited_logger;
pub mod segment_writer;

pub use rate_limited_logger::{DEFAULT_LOG_INTERVAL, RateLimitedLogger};
pub use segment_writer::{BufferedSegmentWriter, DEFAULT_BUFFER_SIZE, SegmentWrite, SegmentWriter};
