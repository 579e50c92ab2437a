//! Parsed syslog records
//!
//! A record is a flat map from field name to value. Only `content` is
//! required downstream; header fields are kept for diagnostics.

use std::collections::HashMap;

use bytes::Bytes;

/// Well-known field names produced by the parser
pub mod fields {
    pub const PRIORITY: &str = "priority";
    pub const FACILITY: &str = "facility";
    pub const SEVERITY: &str = "severity";
    pub const VERSION: &str = "version";
    pub const TIMESTAMP: &str = "timestamp";
    pub const HOSTNAME: &str = "hostname";
    pub const TAG: &str = "tag";
    pub const APP_NAME: &str = "app_name";
    pub const PROC_ID: &str = "proc_id";
    pub const MSG_ID: &str = "msg_id";
    pub const STRUCTURED_DATA: &str = "structured_data";
    /// Message body, including the frame terminator
    pub const CONTENT: &str = "content";
}

/// Value of a single record field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// UTF-8 text
    Text(String),
    /// Bytes that are not valid UTF-8
    Bytes(Bytes),
    /// Numeric header value (priority, facility, severity, version)
    Integer(i64),
}

impl FieldValue {
    /// Raw bytes of a text or byte value; `None` for integers
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Text(s) => Some(s.as_bytes()),
            Self::Bytes(b) => Some(b),
            Self::Integer(_) => None,
        }
    }

    /// Build a value from raw bytes, keeping text when it is valid UTF-8
    pub fn from_raw(raw: &[u8]) -> Self {
        match std::str::from_utf8(raw) {
            Ok(s) => Self::Text(s.to_owned()),
            Err(_) => Self::Bytes(Bytes::copy_from_slice(raw)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<Bytes> for FieldValue {
    fn from(b: Bytes) -> Self {
        Self::Bytes(b)
    }
}

/// One decoded syslog message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyslogRecord {
    fields: HashMap<String, FieldValue>,
}

impl SyslogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record carrying only a content field
    pub fn with_content(content: impl Into<FieldValue>) -> Self {
        let mut record = Self::new();
        record.insert(fields::CONTENT, content);
        record
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Text value of a field, if present and textual
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Integer value of a field, if present and numeric
    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }
}
