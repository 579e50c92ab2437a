//! tasklog - Sources
//!
//! Network listeners that receive a task's log stream and produce
//! [`SyslogRecord`]s for the collector.
//!
//! # Design Principles
//!
//! - **Async I/O**: built on `tokio`, one reader task per connection
//! - **Bounded hand-off**: records go through a bounded `mpsc` channel; a
//!   slow consumer suspends readers instead of growing memory
//! - **Byte-exact content**: frame terminators are kept in the record content
//! - **Explicit lifecycle**: bind and run are separate; stopping closes the
//!   socket and lets open connections finish, aborting closes them
//!
//! # Example
//!
//! ```ignore
//! use tasklog_sources::syslog::{SyslogTcpSource, SyslogTcpSourceConfig};
//! use tokio::sync::mpsc;
//! use tokio_util::sync::CancellationToken;
//!
//! let (record_tx, record_rx) = mpsc::channel(1024);
//! let source = SyslogTcpSource::bind(SyslogTcpSourceConfig::default(), record_tx).await?;
//! let (stop, abort) = (CancellationToken::new(), CancellationToken::new());
//! tokio::spawn(source.run(stop.clone(), abort.clone()));
//! ```

pub mod syslog;

pub use syslog::{
    FieldValue, SyslogRecord, SyslogTcpMetricsSnapshot, SyslogTcpSource, SyslogTcpSourceConfig,
    SyslogTcpSourceError, SyslogTcpSourceMetrics, fields, parse_record,
};
