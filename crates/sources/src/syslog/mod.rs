//! Syslog Sources
//!
//! Receives a task's output as syslog traffic and turns each framed message
//! into a [`SyslogRecord`].
//!
//! # Protocol Support
//!
//! - RFC 3164 (BSD syslog), with or without hostname
//! - RFC 5424 (IETF syslog), structured data skipped
//! - Headerless lines, treated as pure content
//!
//! Only TCP with newline framing is supported; the collector listens on
//! loopback for a single task.

pub mod parser;
pub mod record;
pub mod tcp;

pub use parser::parse_record;
pub use record::{FieldValue, SyslogRecord, fields};
pub use tcp::{
    SyslogTcpMetricsSnapshot, SyslogTcpSource, SyslogTcpSourceConfig, SyslogTcpSourceError,
    SyslogTcpSourceMetrics,
};
