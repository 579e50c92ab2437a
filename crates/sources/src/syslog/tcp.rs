//! Syslog TCP Source
//!
//! Loopback syslog receiver with line-based framing. Each frame is parsed
//! into a [`SyslogRecord`] and handed to a bounded channel; a full channel
//! suspends the connection reader, so a slow consumer slows the sender down
//! instead of growing a queue.
//!
//! # Framing
//!
//! TCP syslog uses newline-delimited messages (non-transparent framing).
//! The terminator stays in the frame so record content is byte-exact.
//!
//! # Lifecycle
//!
//! Binding and serving are separate steps: [`SyslogTcpSource::bind`] claims
//! the port and reports bind failures to the caller, [`SyslogTcpSource::run`]
//! serves connections until its stop token fires. Stopping closes the
//! listening socket right away, then waits for open connections to reach end
//! of stream; the abort token cuts that wait short. When `run` returns every
//! connection reader has finished, so all record senders are gone and the
//! channel closes.
//!
//! # Example
//!
//! ```ignore
//! let (record_tx, mut record_rx) = mpsc::channel(1024);
//! let source = SyslogTcpSource::bind(SyslogTcpSourceConfig::default(), record_tx).await?;
//! let addr = source.local_addr();
//! tokio::spawn(source.run(stop.clone(), abort.clone()));
//! ```

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use socket2::SockRef;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::parser::parse_record;
use super::record::SyslogRecord;

// =============================================================================
// Constants
// =============================================================================

/// Default maximum syslog message size (64KB)
const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Default read buffer size (64KB)
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default socket receive buffer size (256KB)
const DEFAULT_SOCKET_BUFFER_SIZE: usize = 256 * 1024;

/// Initial line buffer capacity; grows up to `max_message_size`
const INITIAL_LINE_CAPACITY: usize = 4096;

// =============================================================================
// Configuration
// =============================================================================

/// Syslog TCP source configuration
#[derive(Debug, Clone)]
pub struct SyslogTcpSourceConfig {
    /// Source identifier used in log events
    pub id: String,

    /// Address to bind
    pub address: SocketAddr,

    /// Read buffer size per connection
    pub buffer_size: usize,

    /// Maximum syslog message size
    pub max_message_size: usize,

    /// TCP nodelay (disable Nagle's algorithm)
    pub nodelay: bool,

    /// Socket buffer size for SO_RCVBUF
    pub socket_buffer_size: usize,
}

impl Default for SyslogTcpSourceConfig {
    fn default() -> Self {
        Self {
            id: "syslog_tcp".into(),
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            nodelay: true,
            socket_buffer_size: DEFAULT_SOCKET_BUFFER_SIZE,
        }
    }
}

impl SyslogTcpSourceConfig {
    /// Config bound to a specific address
    pub fn with_address(address: SocketAddr) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Syslog TCP source metrics
#[derive(Debug, Default)]
pub struct SyslogTcpSourceMetrics {
    /// Connections currently being read
    pub connections_active: AtomicU64,

    /// Connections accepted since bind
    pub connections_total: AtomicU64,

    /// Complete frames read from connections
    pub lines_read: AtomicU64,

    /// Bytes of complete frames, terminators included
    pub bytes_received: AtomicU64,

    /// Records handed to the record channel
    pub records_sent: AtomicU64,

    /// Oversized frames that were consumed and dropped
    pub messages_malformed: AtomicU64,

    /// Accept and read failures plus dropped frames
    pub errors: AtomicU64,
}

impl SyslogTcpSourceMetrics {
    pub const fn new() -> Self {
        Self {
            connections_active: AtomicU64::new(0),
            connections_total: AtomicU64::new(0),
            lines_read: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            records_sent: AtomicU64::new(0),
            messages_malformed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn connection_opened(&self) {
        self.connections_active.fetch_add(1, Ordering::Relaxed);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn line_read(&self, bytes: u64) {
        self.lines_read.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_sent(&self) {
        self.records_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn message_malformed(&self) {
        self.messages_malformed.fetch_add(1, Ordering::Relaxed);
        self.error();
    }

    #[inline]
    pub fn error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SyslogTcpMetricsSnapshot {
        SyslogTcpMetricsSnapshot {
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            lines_read: self.lines_read.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            records_sent: self.records_sent.load(Ordering::Relaxed),
            messages_malformed: self.messages_malformed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of the syslog TCP source counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyslogTcpMetricsSnapshot {
    pub connections_active: u64,
    pub connections_total: u64,
    pub lines_read: u64,
    pub bytes_received: u64,
    pub records_sent: u64,
    pub messages_malformed: u64,
    pub errors: u64,
}

// =============================================================================
// Errors
// =============================================================================

/// Syslog TCP source errors
#[derive(Debug, thiserror::Error)]
pub enum SyslogTcpSourceError {
    /// Failed to bind to address
    #[error("failed to bind to {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Record channel closed
    #[error("record channel closed")]
    ChannelClosed,
}

// =============================================================================
// Source Implementation
// =============================================================================

/// Syslog TCP source bound to a local address
pub struct SyslogTcpSource {
    config: SyslogTcpSourceConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    record_sender: mpsc::Sender<SyslogRecord>,
    metrics: Arc<SyslogTcpSourceMetrics>,
}

impl SyslogTcpSource {
    /// Bind the listening socket
    ///
    /// Connections are not accepted until [`run`](Self::run) is called.
    pub async fn bind(
        config: SyslogTcpSourceConfig,
        record_sender: mpsc::Sender<SyslogRecord>,
    ) -> Result<Self, SyslogTcpSourceError> {
        let bind_err = |source| SyslogTcpSourceError::Bind {
            address: config.address.to_string(),
            source,
        };

        let listener = TcpListener::bind(config.address).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        tracing::debug!(
            source_id = %config.id,
            address = %local_addr,
            "syslog TCP source bound"
        );

        Ok(Self {
            config,
            listener,
            local_addr,
            record_sender,
            metrics: Arc::new(SyslogTcpSourceMetrics::new()),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get metrics reference
    pub fn metrics(&self) -> &Arc<SyslogTcpSourceMetrics> {
        &self.metrics
    }

    /// Configure accepted sockets
    fn configure_socket(&self, stream: &TcpStream) {
        let socket = SockRef::from(stream);

        if self.config.nodelay
            && let Err(e) = socket.set_tcp_nodelay(true)
        {
            tracing::warn!(error = %e, "failed to set TCP_NODELAY");
        }
        if let Err(e) = socket.set_recv_buffer_size(self.config.socket_buffer_size) {
            tracing::warn!(error = %e, "failed to set SO_RCVBUF");
        }
    }

    /// Serve connections until `stop` fires or the record channel closes
    ///
    /// Consumes the source. On `stop` the listening socket is closed at once,
    /// releasing the port, and open connections are read to end of stream so
    /// output a task already sent still reaches the channel. `abort` ends
    /// those readers early; records already queued are kept.
    ///
    /// Returns `ChannelClosed` if the receiver went away while serving.
    pub async fn run(
        self,
        stop: CancellationToken,
        abort: CancellationToken,
    ) -> Result<(), SyslogTcpSourceError> {
        tracing::info!(
            source_id = %self.config.id,
            address = %self.local_addr,
            max_message_size = self.config.max_message_size,
            "syslog TCP source listening"
        );

        let mut connections = JoinSet::new();
        let mut result = Ok(());

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,

                _ = self.record_sender.closed() => {
                    tracing::error!(
                        source_id = %self.config.id,
                        "record channel closed, syslog TCP source no longer accepting"
                    );
                    result = Err(SyslogTcpSourceError::ChannelClosed);
                    break;
                }

                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            self.metrics.connection_opened();
                            self.configure_socket(&stream);

                            tracing::debug!(peer = %peer_addr, "syslog connection accepted");

                            let handler = ConnectionHandler {
                                buffer_size: self.config.buffer_size,
                                max_message_size: self.config.max_message_size,
                                record_sender: self.record_sender.clone(),
                                metrics: Arc::clone(&self.metrics),
                                abort: abort.clone(),
                                peer_addr,
                            };
                            connections.spawn(handler.handle(stream));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "syslog TCP accept error");
                            self.metrics.error();
                        }
                    }
                }

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_exit(joined);
                }
            }
        }

        let Self {
            config,
            listener,
            record_sender,
            metrics,
            ..
        } = self;
        drop(listener);
        drop(record_sender);

        tracing::debug!(
            source_id = %config.id,
            open_connections = metrics.connections_active.load(Ordering::Relaxed),
            "syslog TCP source closed, draining connections"
        );

        // Readers end at EOF, on `abort`, or when the channel closes
        while let Some(joined) = connections.join_next().await {
            log_connection_exit(joined);
        }

        tracing::info!(source_id = %config.id, "syslog TCP source stopped");

        result
    }
}

fn log_connection_exit(joined: Result<Result<(), SyslogTcpSourceError>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "syslog connection ended with error"),
        Err(e) => tracing::warn!(error = %e, "syslog connection task failed"),
    }
}

// =============================================================================
// Connection Handler
// =============================================================================

/// Reads frames from one TCP connection
struct ConnectionHandler {
    buffer_size: usize,
    max_message_size: usize,
    record_sender: mpsc::Sender<SyslogRecord>,
    metrics: Arc<SyslogTcpSourceMetrics>,
    abort: CancellationToken,
    peer_addr: SocketAddr,
}

impl ConnectionHandler {
    async fn handle(self, stream: TcpStream) -> Result<(), SyslogTcpSourceError> {
        let result = self.read_frames(stream).await;
        self.metrics.connection_closed();
        tracing::debug!(peer = %self.peer_addr, "syslog connection closed");
        result
    }

    async fn read_frames(&self, stream: TcpStream) -> Result<(), SyslogTcpSourceError> {
        let mut reader = BufReader::with_capacity(self.buffer_size, stream);
        let mut line_buf = Vec::with_capacity(INITIAL_LINE_CAPACITY.min(self.max_message_size));

        loop {
            let read = tokio::select! {
                biased;
                _ = self.abort.cancelled() => return Ok(()),
                _ = self.record_sender.closed() => return Err(SyslogTcpSourceError::ChannelClosed),
                read = read_bounded_line(&mut reader, &mut line_buf, self.max_message_size) => read,
            };

            match read {
                Ok(ReadLineResult::Line(bytes_read)) => {
                    self.metrics.line_read(bytes_read as u64);

                    let record = parse_record(&line_buf);
                    let sent = tokio::select! {
                        biased;
                        _ = self.abort.cancelled() => return Ok(()),
                        sent = self.record_sender.send(record) => sent,
                    };
                    if sent.is_err() {
                        return Err(SyslogTcpSourceError::ChannelClosed);
                    }
                    self.metrics.record_sent();
                }
                Ok(ReadLineResult::TooLong) => {
                    self.metrics.message_malformed();
                    tracing::warn!(
                        peer = %self.peer_addr,
                        max = self.max_message_size,
                        "syslog message too large, dropped"
                    );
                }
                Ok(ReadLineResult::Eof) => return Ok(()),
                Err(e) => {
                    if is_connection_reset(&e) {
                        return Ok(());
                    }
                    self.metrics.error();
                    return Err(SyslogTcpSourceError::Io(e));
                }
            }
        }
    }
}

// =============================================================================
// Bounded Line Reading
// =============================================================================

/// Result of reading a bounded line
enum ReadLineResult {
    /// Successfully read a line (with byte count including newline)
    Line(usize),
    /// Line exceeded max size and was consumed/discarded
    TooLong,
    /// End of stream
    Eof,
}

/// Read one newline-terminated frame into `buf`, keeping the newline
///
/// A frame longer than `max_size` is consumed up to its newline and
/// reported as `TooLong` without buffering the excess. A final frame without
/// a newline is returned as-is at end of stream.
async fn read_bounded_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max_size: usize,
) -> io::Result<ReadLineResult> {
    buf.clear();

    let mut total_bytes = 0;
    let mut exceeded_limit = false;

    loop {
        let available = reader.fill_buf().await?;

        if available.is_empty() {
            if total_bytes == 0 {
                return Ok(ReadLineResult::Eof);
            }
            break;
        }

        let newline_pos = available.iter().position(|&b| b == b'\n');
        let (bytes_to_consume, done) = match newline_pos {
            Some(pos) => (pos + 1, true),
            None => (available.len(), false),
        };

        if !exceeded_limit {
            if buf.len() + bytes_to_consume <= max_size {
                buf.extend_from_slice(&available[..bytes_to_consume]);
            } else {
                exceeded_limit = true;
                buf.clear();
            }
        }

        total_bytes += bytes_to_consume;
        reader.consume(bytes_to_consume);

        if done {
            break;
        }
    }

    if exceeded_limit {
        return Ok(ReadLineResult::TooLong);
    }

    Ok(ReadLineResult::Line(total_bytes))
}

/// Check if error is a connection reset (expected when a task exits)
fn is_connection_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}

#[cfg(test)]
#[path = "tcp_test.rs"]
mod tcp_test;
