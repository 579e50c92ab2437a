//! Segment writers
//!
//! A segment is one file in a rotated set. The rotator asks a
//! [`SegmentWriter`] to wrap every newly opened file, so the buffering
//! strategy is chosen once and reused across rotations.
//!
//! ```ignore
//! let writer = BufferedSegmentWriter::new(64 * 1024);
//! let mut segment = writer.wrap(File::create("task.stdout.0")?)?;
//! segment.write_all(b"hello\n")?;
//! segment.finish()?;
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Default write buffer size (64KB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Factory that wraps freshly opened segment files
pub trait SegmentWriter: Send + Sync {
    fn wrap(&self, file: File) -> io::Result<Box<dyn SegmentWrite>>;
}

/// Write side of one open segment
///
/// Object-safe so the rotator can hold a `Box<dyn SegmentWrite>`.
pub trait SegmentWrite: Write + Send {
    /// Push all buffered bytes to the file
    fn flush_all(&mut self) -> io::Result<()>;

    /// Flush and close the segment
    fn finish(self: Box<Self>) -> io::Result<()>;

    /// Bytes accepted by this writer since it was opened
    fn bytes_written(&self) -> u64;
}

/// Buffered plain-bytes writer
#[derive(Debug, Clone)]
pub struct BufferedSegmentWriter {
    buffer_size: usize,
}

impl BufferedSegmentWriter {
    pub fn new(buffer_size: usize) -> Self {
        Self { buffer_size }
    }
}

impl Default for BufferedSegmentWriter {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl SegmentWriter for BufferedSegmentWriter {
    fn wrap(&self, file: File) -> io::Result<Box<dyn SegmentWrite>> {
        Ok(Box::new(BufferedSegment {
            writer: BufWriter::with_capacity(self.buffer_size, file),
            bytes_written: 0,
        }))
    }
}

struct BufferedSegment {
    writer: BufWriter<File>,
    bytes_written: u64,
}

impl Write for BufferedSegment {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl SegmentWrite for BufferedSegment {
    fn flush_all(&mut self) -> io::Result<()> {
        self.writer.flush()
    }

    fn finish(mut self: Box<Self>) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }

    fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
