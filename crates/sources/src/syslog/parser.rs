//! Syslog header parsing
//!
//! Splits one framed line into header fields and the message body. The
//! parser is lenient: anything it cannot recognise stays in `content`, so a
//! task writing unusual output never loses bytes to the parser.
//!
//! # Accepted Shapes
//!
//! ```text
//! <34>1 2003-10-11T22:14:15.003Z host app 1234 ID47 [sd@1 a="b"] message   RFC 5424
//! <34>Oct 11 22:14:15 host app[1234]: message                              RFC 3164
//! <34>Oct 11 22:14:15 app[1234]: message                                   RFC 3164, no host
//! <34>2003-10-11T22:14:15Z host app[1234]: message                         RFC 3339 stamp
//! message                                                                  headerless
//! ```
//!
//! The body keeps the frame terminator so the decoder can reproduce the
//! task's byte stream exactly.

use super::record::{FieldValue, SyslogRecord, fields};

/// Highest valid PRI value (facility 23, severity 7)
const MAX_PRIORITY: i64 = 191;

/// Length of an RFC 3164 timestamp (`Mmm dd hh:mm:ss`)
const BSD_TIMESTAMP_LEN: usize = 15;

const MONTHS: [&[u8; 3]; 12] = [
    b"Jan", b"Feb", b"Mar", b"Apr", b"May", b"Jun", b"Jul", b"Aug", b"Sep", b"Oct", b"Nov", b"Dec",
];

const NIL: &[u8] = b"-";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Parse one frame (terminator included) into a record
pub fn parse_record(frame: &[u8]) -> SyslogRecord {
    let mut record = SyslogRecord::new();

    let Some((priority, rest)) = parse_priority(frame) else {
        record.insert(fields::CONTENT, FieldValue::from_raw(frame));
        return record;
    };
    record.insert(fields::PRIORITY, priority);
    record.insert(fields::FACILITY, priority / 8);
    record.insert(fields::SEVERITY, priority % 8);

    let body = match parse_version(rest) {
        Some((version, rest)) => {
            record.insert(fields::VERSION, version);
            parse_rfc5424(&mut record, rest)
        }
        None => parse_rfc3164(&mut record, rest),
    };

    record.insert(fields::CONTENT, FieldValue::from_raw(body));
    record
}

/// `<PRI>` with one to three digits, value at most 191
fn parse_priority(input: &[u8]) -> Option<(i64, &[u8])> {
    if input.first() != Some(&b'<') {
        return None;
    }
    let close = input.iter().take(5).position(|&b| b == b'>')?;
    let digits = &input[1..close];
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = parse_decimal(digits)?;
    if value > MAX_PRIORITY {
        return None;
    }
    Some((value, &input[close + 1..]))
}

/// RFC 5424 `VERSION SP`, a non-zero number of at most two digits
fn parse_version(input: &[u8]) -> Option<(i64, &[u8])> {
    let space = input.iter().take(3).position(|&b| b == b' ')?;
    let digits = &input[..space];
    if digits.is_empty() || digits[0] == b'0' || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some((parse_decimal(digits)?, &input[space + 1..]))
}

fn parse_decimal(digits: &[u8]) -> Option<i64> {
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Split off the next space-delimited token
fn next_token(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let space = input.iter().position(|&b| b == b' ')?;
    Some((&input[..space], &input[space + 1..]))
}

fn insert_unless_nil(record: &mut SyslogRecord, name: &str, value: &[u8]) {
    if value != NIL && !value.is_empty() {
        record.insert(name, FieldValue::from_raw(value));
    }
}

fn parse_rfc5424<'a>(record: &mut SyslogRecord, input: &'a [u8]) -> &'a [u8] {
    let header = [
        fields::TIMESTAMP,
        fields::HOSTNAME,
        fields::APP_NAME,
        fields::PROC_ID,
        fields::MSG_ID,
    ];

    let mut rest = input;
    for name in header {
        let Some((token, tail)) = next_token(rest) else {
            return rest;
        };
        insert_unless_nil(record, name, token);
        rest = tail;
    }

    let Some(sd_len) = structured_data_len(rest) else {
        return rest;
    };
    insert_unless_nil(record, fields::STRUCTURED_DATA, &rest[..sd_len]);
    rest = &rest[sd_len..];

    if rest.first() == Some(&b' ') {
        rest = &rest[1..];
    }
    rest.strip_prefix(UTF8_BOM).unwrap_or(rest)
}

/// Length of the STRUCTURED-DATA part: `-` or one or more `[...]` elements
///
/// Inside an element, `"` toggles a quoted param value and `\` escapes the
/// next byte, so `]` only closes an element outside quotes.
fn structured_data_len(input: &[u8]) -> Option<usize> {
    if input.first() == Some(&b'-') {
        return Some(1);
    }

    let mut pos = 0;
    while input.get(pos) == Some(&b'[') {
        let mut in_quotes = false;
        let mut escaped = false;
        let mut closed = false;
        pos += 1;
        while let Some(&b) = input.get(pos) {
            pos += 1;
            if escaped {
                escaped = false;
                continue;
            }
            match b {
                b'\\' => escaped = true,
                b'"' => in_quotes = !in_quotes,
                b']' if !in_quotes => {
                    closed = true;
                    break;
                }
                _ => {}
            }
        }
        if !closed {
            return None;
        }
    }

    (pos > 0).then_some(pos)
}

fn parse_rfc3164<'a>(record: &mut SyslogRecord, input: &'a [u8]) -> &'a [u8] {
    let rest = if is_bsd_timestamp(input) {
        record.insert(
            fields::TIMESTAMP,
            FieldValue::from_raw(&input[..BSD_TIMESTAMP_LEN]),
        );
        &input[BSD_TIMESTAMP_LEN + 1..]
    } else {
        match next_token(input) {
            Some((token, tail)) if is_iso_timestamp(token) => {
                record.insert(fields::TIMESTAMP, FieldValue::from_raw(token));
                tail
            }
            _ => return input,
        }
    };

    if let Some((tag, body)) = tag_token(rest) {
        insert_tag(record, tag);
        return body;
    }

    let Some((hostname, rest)) = next_token(rest) else {
        return rest;
    };
    insert_unless_nil(record, fields::HOSTNAME, hostname);

    match tag_token(rest) {
        Some((tag, body)) => {
            insert_tag(record, tag);
            body
        }
        None => rest,
    }
}

/// `Mmm dd hh:mm:ss ` with a space-padded day
fn is_bsd_timestamp(input: &[u8]) -> bool {
    if input.len() <= BSD_TIMESTAMP_LEN || input[BSD_TIMESTAMP_LEN] != b' ' {
        return false;
    }
    let month = &input[..3];
    MONTHS.iter().any(|m| &m[..] == month)
        && input[3] == b' '
        && (input[4] == b' ' || input[4].is_ascii_digit())
        && input[5].is_ascii_digit()
        && input[6] == b' '
        && input[9] == b':'
        && input[12] == b':'
        && [7, 8, 10, 11, 13, 14]
            .iter()
            .all(|&i| input[i].is_ascii_digit())
}

/// `YYYY-MM-DDT...`, as sent by RFC 3339 emitting clients
fn is_iso_timestamp(token: &[u8]) -> bool {
    token.len() > 10
        && token[..4].iter().all(u8::is_ascii_digit)
        && token[4] == b'-'
        && token[10] == b'T'
}

/// A tag token ends with `:`; the body starts after one following space
fn tag_token(input: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = input
        .iter()
        .position(|&b| matches!(b, b' ' | b'\r' | b'\n'))
        .unwrap_or(input.len());
    let token = &input[..end];
    if token.len() < 2 || !token.ends_with(b":") {
        return None;
    }
    let body = if input.get(end) == Some(&b' ') {
        &input[end + 1..]
    } else {
        &input[end..]
    };
    Some((&token[..token.len() - 1], body))
}

/// `app[1234]` becomes tag `app` and proc_id `1234`
fn insert_tag(record: &mut SyslogRecord, tag: &[u8]) {
    match tag.iter().position(|&b| b == b'[') {
        Some(open) if tag.ends_with(b"]") => {
            insert_unless_nil(record, fields::TAG, &tag[..open]);
            insert_unless_nil(record, fields::PROC_ID, &tag[open + 1..tag.len() - 1]);
        }
        _ => insert_unless_nil(record, fields::TAG, tag),
    }
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod parser_test;
