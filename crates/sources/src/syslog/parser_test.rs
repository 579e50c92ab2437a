//! Tests for syslog header parsing

use crate::syslog::parser::{parse_record, structured_data_len};
use crate::syslog::record::{FieldValue, fields};

fn content(frame: &[u8]) -> Vec<u8> {
    parse_record(frame)
        .get(fields::CONTENT)
        .and_then(FieldValue::as_bytes)
        .map(<[u8]>::to_vec)
        .unwrap_or_default()
}

// ============================================================================
// Priority
// ============================================================================

#[test]
fn test_priority_split_into_facility_and_severity() {
    let record = parse_record(b"<165>Oct 11 22:14:15 host app: hi\n");
    assert_eq!(record.integer(fields::PRIORITY), Some(165));
    assert_eq!(record.integer(fields::FACILITY), Some(20));
    assert_eq!(record.integer(fields::SEVERITY), Some(5));
}

#[test]
fn test_priority_out_of_range_is_content() {
    let record = parse_record(b"<192>hello\n");
    assert_eq!(record.integer(fields::PRIORITY), None);
    assert_eq!(record.text(fields::CONTENT), Some("<192>hello\n"));
}

#[test]
fn test_headerless_line_is_all_content() {
    assert_eq!(content(b"plain output\n"), b"plain output\n");
}

// ============================================================================
// RFC 3164
// ============================================================================

#[test]
fn test_rfc3164_with_host_and_pid() {
    let record = parse_record(b"<34>Oct 11 22:14:15 mymachine su[230]: 'su root' failed\n");

    assert_eq!(record.text(fields::TIMESTAMP), Some("Oct 11 22:14:15"));
    assert_eq!(record.text(fields::HOSTNAME), Some("mymachine"));
    assert_eq!(record.text(fields::TAG), Some("su"));
    assert_eq!(record.text(fields::PROC_ID), Some("230"));
    assert_eq!(record.text(fields::CONTENT), Some("'su root' failed\n"));
}

#[test]
fn test_rfc3164_space_padded_day_without_host() {
    let record = parse_record(b"<30>Jan  2 15:04:05 redis[42]: ready to accept\n");

    assert_eq!(record.text(fields::TIMESTAMP), Some("Jan  2 15:04:05"));
    assert_eq!(record.text(fields::HOSTNAME), None);
    assert_eq!(record.text(fields::TAG), Some("redis"));
    assert_eq!(record.text(fields::CONTENT), Some("ready to accept\n"));
}

#[test]
fn test_rfc3339_timestamp_header() {
    let record = parse_record(b"<14>2024-05-01T10:00:00Z web-1 api[7]: GET /health 200\n");

    assert_eq!(record.text(fields::TIMESTAMP), Some("2024-05-01T10:00:00Z"));
    assert_eq!(record.text(fields::HOSTNAME), Some("web-1"));
    assert_eq!(record.text(fields::TAG), Some("api"));
    assert_eq!(record.text(fields::CONTENT), Some("GET /health 200\n"));
}

#[test]
fn test_content_colons_are_preserved() {
    assert_eq!(
        content(b"<14>Oct 11 22:14:15 host app: key: value: other\n"),
        b"key: value: other\n"
    );
}

#[test]
fn test_empty_body_keeps_terminator() {
    assert_eq!(content(b"<14>Oct 11 22:14:15 host app:\n"), b"\n");
}

#[test]
fn test_unrecognised_header_kept_in_content() {
    assert_eq!(content(b"<14>not a header\n"), b"not a header\n");
}

// ============================================================================
// RFC 5424
// ============================================================================

#[test]
fn test_rfc5424_full_header() {
    let frame = b"<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog - ID47 [exampleSDID@32473 iut=\"3\"] An application event\n";
    let record = parse_record(frame);

    assert_eq!(record.integer(fields::VERSION), Some(1));
    assert_eq!(record.text(fields::HOSTNAME), Some("mymachine.example.com"));
    assert_eq!(record.text(fields::APP_NAME), Some("evntslog"));
    assert_eq!(record.text(fields::PROC_ID), None);
    assert_eq!(record.text(fields::MSG_ID), Some("ID47"));
    assert_eq!(
        record.text(fields::STRUCTURED_DATA),
        Some("[exampleSDID@32473 iut=\"3\"]")
    );
    assert_eq!(record.text(fields::CONTENT), Some("An application event\n"));
}

#[test]
fn test_rfc5424_nil_structured_data() {
    let record = parse_record(b"<14>1 - - app 99 - - started\n");
    assert_eq!(record.text(fields::TIMESTAMP), None);
    assert_eq!(record.text(fields::STRUCTURED_DATA), None);
    assert_eq!(record.text(fields::PROC_ID), Some("99"));
    assert_eq!(record.text(fields::CONTENT), Some("started\n"));
}

#[test]
fn test_rfc5424_bom_stripped() {
    assert_eq!(
        content(b"<14>1 - host app - - - \xEF\xBB\xBFhello\n"),
        b"hello\n"
    );
}

#[test]
fn test_structured_data_quoting() {
    assert_eq!(structured_data_len(b"-"), Some(1));
    assert_eq!(structured_data_len(b"[a x=\"]\"] msg"), Some(9));
    assert_eq!(structured_data_len(b"[a x=\"\\\"\"][b] msg"), Some(13));
    assert_eq!(structured_data_len(b"[unterminated"), None);
    assert_eq!(structured_data_len(b"msg"), None);
}

#[test]
fn test_invalid_utf8_content_kept_as_bytes() {
    let record = parse_record(b"<14>Oct 11 22:14:15 host app: \xff\xfe\n");
    assert_eq!(
        record.get(fields::CONTENT),
        Some(&FieldValue::Bytes(bytes::Bytes::from_static(b"\xff\xfe\n")))
    );
}
