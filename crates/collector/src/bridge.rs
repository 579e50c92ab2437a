//! Stream bridge between the syslog listener and the log file
//!
//! ```text
//! [listener] --SyslogRecord--> [record channel] --> [pump] --bytes--> [pipe] --> [FileRotator]
//! ```
//!
//! The pipe is a bounded in-memory duplex with exactly one writer, held by
//! the pump, and one reader, handed to the sink. A full pipe suspends the
//! pump, a suspended pump fills the record channel, and a full channel
//! suspends the connection readers, so memory stays bounded end to end.
//!
//! The pump ends when the record channel closes. It then shuts down the
//! write half so the sink reads EOF, flushes and closes its file.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use tasklog_sources::SyslogRecord;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::mpsc;

use crate::decoder::MessageDecoder;

/// Create a pipe holding at most `capacity` bytes in flight
pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (writer, reader) = tokio::io::duplex(capacity);
    (PipeWriter { inner: writer }, PipeReader { inner: reader })
}

/// Write end of the bridge pipe
pub struct PipeWriter {
    inner: DuplexStream,
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

/// Read end of the bridge pipe; yields EOF once the writer shuts down
pub struct PipeReader {
    inner: DuplexStream,
}

impl AsyncRead for PipeReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Bridge counters
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    records_forwarded: AtomicU64,
    records_dropped: AtomicU64,
    bytes_forwarded: AtomicU64,
    sink_failed: AtomicBool,
}

impl BridgeMetrics {
    pub const fn new() -> Self {
        Self {
            records_forwarded: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            bytes_forwarded: AtomicU64::new(0),
            sink_failed: AtomicBool::new(false),
        }
    }

    fn record_forwarded(&self, bytes: usize) {
        self.records_forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_forwarded
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn sink_failed(&self) {
        self.sink_failed.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            records_forwarded: self.records_forwarded.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            bytes_forwarded: self.bytes_forwarded.load(Ordering::Relaxed),
            sink_failed: self.sink_failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of bridge counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    pub records_forwarded: u64,
    pub records_dropped: u64,
    pub bytes_forwarded: u64,
    /// The pipe reader went away; nothing more reaches the log file
    pub sink_failed: bool,
}

// =============================================================================
// Pump
// =============================================================================

/// Moves decoded record content from the record channel into the pipe
pub struct StreamBridge {
    records: mpsc::Receiver<SyslogRecord>,
    decoder: MessageDecoder,
    writer: PipeWriter,
    metrics: Arc<BridgeMetrics>,
}

impl StreamBridge {
    pub fn new(
        records: mpsc::Receiver<SyslogRecord>,
        decoder: MessageDecoder,
        writer: PipeWriter,
    ) -> Self {
        Self {
            records,
            decoder,
            writer,
            metrics: Arc::new(BridgeMetrics::new()),
        }
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<BridgeMetrics> {
        &self.metrics
    }

    /// Pump records until the channel closes
    ///
    /// Fails if the reader is gone. The failure is kept in the metrics and
    /// the channel is closed, which makes the listener stop accepting.
    pub async fn pump(mut self) -> io::Result<BridgeStats> {
        while let Some(record) = self.records.recv().await {
            let Some(content) = self.decoder.decode_or_drop(&record) else {
                self.metrics.record_dropped();
                continue;
            };
            if content.is_empty() {
                continue;
            }

            if let Err(e) = self.writer.write_all(content).await {
                tracing::error!(error = %e, "log pipe closed, stopping bridge");
                self.metrics.sink_failed();
                self.records.close();
                return Err(e);
            }
            self.metrics.record_forwarded(content.len());
        }

        self.writer.shutdown().await?;

        let stats = self.metrics.snapshot();
        tracing::debug!(
            records_forwarded = stats.records_forwarded,
            records_dropped = stats.records_dropped,
            bytes_forwarded = stats.bytes_forwarded,
            "record channel closed, bridge finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "bridge_test.rs"]
mod bridge_test;
