//! The partition file encoding.
//!
//! Partitions are comma-separated text with a fixed header row. The
//! format is kept bit-compatible with human-editable exports:
//! - A field containing a comma, double quote, or newline is wrapped in
//!   double quotes, with internal quotes doubled.
//! - Timestamps are RFC 3339 strings; `endTime` is the empty string while
//!   a record is open, `duration` is a plain integer (milliseconds), and
//!   `category`/`notes` are empty strings when absent.

use chrono::{DateTime, Utc};
use thiserror::Error;
use wl_core::{SessionId, TimeSession, ValidationError};

/// Header row, also the authoritative field order.
pub const HEADER: &str = "id,fileName,filePath,project,startTime,endTime,duration,category,notes";

/// Number of fields per record.
pub const FIELD_COUNT: usize = 9;

/// Per-record decode errors.
///
/// These are recoverable by contract: a malformed record is skipped at
/// load time so one corrupt line cannot take the rest of the day's data
/// with it.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("expected {FIELD_COUNT} fields, got {got}")]
    FieldCount { got: usize },
    #[error("invalid {field} timestamp: {value}")]
    Timestamp {
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid duration: {value}")]
    Duration { value: String },
    #[error(transparent)]
    Id(#[from] ValidationError),
}

/// Escapes a single field per the quoting contract.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        let mut out = String::with_capacity(field.len() + 2);
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
        out
    } else {
        field.to_string()
    }
}

/// Encodes one session as a record line, including the trailing newline.
#[must_use]
pub fn encode_record(session: &TimeSession) -> String {
    let fields = [
        session.id.as_str().to_string(),
        session.file_name.clone(),
        session.file_path.clone(),
        session.project.clone(),
        session.start_time.to_rfc3339(),
        session.end_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
        session.duration_ms.to_string(),
        session.category.clone().unwrap_or_default(),
        session.notes.clone().unwrap_or_default(),
    ];
    let mut line = fields.map(|f| escape(&f)).join(",");
    line.push('\n');
    line
}

fn parse_timestamp(field: &'static str, value: &str) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| CodecError::Timestamp {
            field,
            value: value.to_string(),
            source,
        })
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Decodes one record's fields back into a session.
pub fn decode_record(fields: &[String]) -> Result<TimeSession, CodecError> {
    if fields.len() != FIELD_COUNT {
        return Err(CodecError::FieldCount { got: fields.len() });
    }

    let end_time = if fields[5].is_empty() {
        None
    } else {
        Some(parse_timestamp("endTime", &fields[5])?)
    };
    let duration_ms: i64 = fields[6].parse().map_err(|_| CodecError::Duration {
        value: fields[6].clone(),
    })?;

    Ok(TimeSession {
        id: SessionId::new(fields[0].clone())?,
        file_name: fields[1].clone(),
        file_path: fields[2].clone(),
        project: fields[3].clone(),
        start_time: parse_timestamp("startTime", &fields[4])?,
        end_time,
        duration_ms,
        category: optional(&fields[7]),
        notes: optional(&fields[8]),
    })
}

/// Splits a partition document into rows of fields.
///
/// Unquoted commas separate fields and unquoted newlines separate rows;
/// quoted segments may span both. Doubled quotes inside a quoted field
/// unescape to a single quote. Blank lines are dropped.
#[must_use]
pub fn parse_rows(input: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => row.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                if row.len() > 1 || !row[0].is_empty() {
                    rows.push(std::mem::take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(c),
        }
    }
    // Final record without a trailing newline.
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

/// Whether a row is the header row. The full row must match; a record
/// whose id happens to be the literal `id` is still a record.
#[must_use]
pub fn is_header(row: &[String]) -> bool {
    row.len() == FIELD_COUNT && row.iter().map(String::as_str).eq(HEADER.split(','))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use wl_core::SessionContext;

    use super::*;

    fn sample() -> TimeSession {
        let start = Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap();
        let mut session = TimeSession::begin(
            SessionContext::new("main.rs", "/home/sami/demo/main.rs", "demo"),
            start,
        );
        session.close(start + chrono::Duration::minutes(30));
        session
    }

    fn roundtrip(session: &TimeSession) -> TimeSession {
        let encoded = encode_record(session);
        let rows = parse_rows(&encoded);
        assert_eq!(rows.len(), 1);
        decode_record(&rows[0]).unwrap()
    }

    #[test]
    fn roundtrip_plain_session() {
        let session = sample();
        assert_eq!(roundtrip(&session), session);
    }

    #[test]
    fn roundtrip_open_session() {
        let session = TimeSession::begin(
            SessionContext::new("a.rs", "/p/a.rs", "p"),
            Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap(),
        );
        let decoded = roundtrip(&session);
        assert!(decoded.end_time.is_none());
        assert_eq!(decoded, session);
    }

    #[test]
    fn roundtrip_awkward_field_contents() {
        let mut session = sample();
        session.file_name = "notes, \"draft\".md".to_string();
        session.file_path = "/tmp/notes, \"draft\".md".to_string();
        session.category = Some("Research, reading".to_string());
        session.notes = Some("line one\nline two, with a comma\n\"quoted\"".to_string());
        assert_eq!(roundtrip(&session), session);
    }

    #[test]
    fn quoted_newlines_do_not_split_records() {
        let mut first = sample();
        first.notes = Some("spans\ntwo lines".to_string());
        let second = sample();

        let doc = format!("{HEADER}\n{}{}", encode_record(&first), encode_record(&second));
        let rows = parse_rows(&doc);
        assert_eq!(rows.len(), 3);
        assert!(is_header(&rows[0]));
        assert_eq!(decode_record(&rows[1]).unwrap(), first);
        assert_eq!(decode_record(&rows[2]).unwrap(), second);
    }

    #[test]
    fn doubled_quotes_unescape() {
        let rows = parse_rows("\"he said \"\"hi\"\"\",b\n");
        assert_eq!(rows, vec![vec!["he said \"hi\"".to_string(), "b".to_string()]]);
    }

    #[test]
    fn last_record_without_trailing_newline() {
        let rows = parse_rows("a,b\nc,d");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let rows = parse_rows("a,b\n\n\nc,d\n");
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn crlf_line_endings_parse() {
        let rows = parse_rows("a,b\r\nc,d\r\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn decode_rejects_wrong_field_count() {
        let rows = parse_rows("only,three,fields\n");
        assert!(matches!(
            decode_record(&rows[0]),
            Err(CodecError::FieldCount { got: 3 })
        ));
    }

    #[test]
    fn decode_rejects_bad_timestamp_and_duration() {
        let good = encode_record(&sample());
        let bad_ts = good.replacen("2025-05-06T10:00:00", "not-a-time", 1);
        assert!(matches!(
            decode_record(&parse_rows(&bad_ts)[0]),
            Err(CodecError::Timestamp { .. })
        ));

        let bad_dur = good.replace(",1800000,", ",soon,");
        assert!(matches!(
            decode_record(&parse_rows(&bad_dur)[0]),
            Err(CodecError::Duration { .. })
        ));
    }

    #[test]
    fn header_constant_matches_field_count() {
        assert_eq!(HEADER.split(',').count(), FIELD_COUNT);
        assert!(is_header(&parse_rows(HEADER)[0]));
    }

    #[test]
    fn record_with_literal_id_field_is_not_a_header() {
        let mut session = sample();
        session.id = wl_core::SessionId::new("id").unwrap();
        let rows = parse_rows(&encode_record(&session));
        assert!(!is_header(&rows[0]));
        assert_eq!(decode_record(&rows[0]).unwrap(), session);
    }
}
