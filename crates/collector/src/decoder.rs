//! Record to byte stream decoding
//!
//! The task's output travels as syslog messages; only the `content` field
//! carries it. Decoding hands back those bytes untouched, including the
//! line terminator, so the log file reproduces what the task wrote.

use std::time::Duration;

use tasklog_sinks::util::RateLimitedLogger;
use tasklog_sources::{FieldValue, SyslogRecord, fields};

use crate::error::DecodeError;

/// Interval between warnings about malformed records
const MALFORMED_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Extracts the content bytes of each record
pub struct MessageDecoder {
    malformed_logger: RateLimitedLogger,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self {
            malformed_logger: RateLimitedLogger::new(MALFORMED_LOG_INTERVAL),
        }
    }

    /// Content bytes of `record`
    ///
    /// Fails when the content field is missing or numeric.
    pub fn decode<'a>(&self, record: &'a SyslogRecord) -> Result<&'a [u8], DecodeError> {
        match record.get(fields::CONTENT) {
            Some(FieldValue::Text(text)) => Ok(text.as_bytes()),
            Some(FieldValue::Bytes(bytes)) => Ok(bytes.as_ref()),
            Some(FieldValue::Integer(_)) => Err(DecodeError::MalformedRecord {
                reason: "content is not text",
            }),
            None => Err(DecodeError::MalformedRecord {
                reason: "missing content field",
            }),
        }
    }

    /// Decode `record`, logging a malformed one instead of failing
    pub fn decode_or_drop<'a>(&self, record: &'a SyslogRecord) -> Option<&'a [u8]> {
        match self.decode(record) {
            Ok(content) => Some(content),
            Err(e) => {
                self.malformed_logger.warn("dropping syslog record", &e);
                None
            }
        }
    }

    /// Malformed records seen so far
    pub fn malformed_count(&self) -> u64 {
        self.malformed_logger.total_count()
    }
}

impl Default for MessageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_text_content_passes_through() {
        let decoder = MessageDecoder::new();
        let record = SyslogRecord::with_content("hello\n");

        assert_eq!(decoder.decode(&record).unwrap(), b"hello\n");
    }

    #[test]
    fn test_binary_content_passes_through() {
        let decoder = MessageDecoder::new();
        let record = SyslogRecord::with_content(Bytes::from_static(b"\xff\xfe\n"));

        assert_eq!(decoder.decode(&record).unwrap(), b"\xff\xfe\n");
    }

    #[test]
    fn test_headers_ignored() {
        let decoder = MessageDecoder::new();
        let mut record = SyslogRecord::with_content("body\n");
        record.insert(fields::HOSTNAME, "host");
        record.insert(fields::PRIORITY, 14i64);

        assert_eq!(decoder.decode(&record).unwrap(), b"body\n");
    }

    #[test]
    fn test_missing_content_is_malformed() {
        let decoder = MessageDecoder::new();
        let mut record = SyslogRecord::new();
        record.insert(fields::HOSTNAME, "host");

        assert_eq!(
            decoder.decode(&record),
            Err(DecodeError::MalformedRecord {
                reason: "missing content field"
            })
        );
    }

    #[test]
    fn test_numeric_content_is_malformed() {
        let decoder = MessageDecoder::new();
        let record = SyslogRecord::with_content(42i64);

        assert!(matches!(
            decoder.decode(&record),
            Err(DecodeError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn test_decode_or_drop_counts_malformed() {
        let decoder = MessageDecoder::new();

        assert_eq!(
            decoder.decode_or_drop(&SyslogRecord::with_content("abc\n")),
            Some(&b"abc\n"[..])
        );
        assert_eq!(decoder.decode_or_drop(&SyslogRecord::new()), None);
        assert_eq!(decoder.decode_or_drop(&SyslogRecord::new()), None);

        assert_eq!(decoder.malformed_count(), 2);
    }
}
