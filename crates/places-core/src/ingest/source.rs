//! Reading raw records from JSON and JSON Lines text.

use std::io::{self, BufRead};
use std::path::Path;

use serde_json::Value;

use super::record::RawRecord;
use crate::error::{Error, Result};

/// Shape of an ingestion input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// A single top-level JSON array of records.
    JsonArray,
    /// One JSON record per line.
    JsonLines,
}

impl InputFormat {
    /// Pick the format from the file extension unless JSON Lines is forced.
    pub fn for_path(path: &Path, force_jsonl: bool) -> Self {
        let is_jsonl = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));
        if force_jsonl || is_jsonl {
            InputFormat::JsonLines
        } else {
            InputFormat::JsonArray
        }
    }

    /// Parse input text into records.
    pub fn parse(self, text: &str) -> Result<Vec<RawRecord>> {
        match self {
            InputFormat::JsonArray => parse_json_array(text),
            InputFormat::JsonLines => Ok(parse_json_lines(text)),
        }
    }
}

/// Parse a JSON document whose top level must be an array.
///
/// A document that is not JSON, or not an array, is a fatal input error:
/// there are no record boundaries to recover from.
pub fn parse_json_array(text: &str) -> Result<Vec<RawRecord>> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => Ok(items.into_iter().map(RawRecord::Json).collect()),
        _ => Err(Error::Serialization(
            "top-level JSON value is not an array; use JSON Lines for one record per line"
                .to_string(),
        )),
    }
}

/// Parse JSON Lines. Blank lines are skipped; a line that does not parse
/// becomes a [`RawRecord::Malformed`] so the rest of the file still loads.
pub fn parse_json_lines(text: &str) -> Vec<RawRecord> {
    JsonLines::new(text.as_bytes()).collect()
}

/// Streaming JSON Lines reader: one record per non-blank line, read on
/// demand so memory stays bounded by the consumer's chunk size.
///
/// A line that is not valid JSON (or not UTF-8) is yielded as
/// [`RawRecord::Malformed`]. A read error ends the iteration and is kept for
/// [`JsonLines::take_error`].
pub struct JsonLines<R> {
    reader: R,
    line: usize,
    buf: Vec<u8>,
    error: Option<io::Error>,
}

impl<R: BufRead> JsonLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: Vec::new(),
            error: None,
        }
    }

    /// The read error that ended iteration early, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

impl<R: BufRead> Iterator for JsonLines<R> {
    type Item = RawRecord;

    fn next(&mut self) -> Option<RawRecord> {
        if self.error.is_some() {
            return None;
        }
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.error = Some(e);
                    return None;
                }
            }
            self.line += 1;

            let text = match std::str::from_utf8(&self.buf) {
                Ok(text) => text.trim_end_matches(['\n', '\r']),
                Err(err) => {
                    return Some(RawRecord::Malformed {
                        line: self.line,
                        text: String::from_utf8_lossy(&self.buf).trim_end().to_string(),
                        error: err.to_string(),
                    })
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            return Some(match serde_json::from_str::<Value>(text) {
                Ok(value) => RawRecord::Json(value),
                Err(err) => RawRecord::Malformed {
                    line: self.line,
                    text: text.to_string(),
                    error: err.to_string(),
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_for_path() {
        assert_eq!(
            InputFormat::for_path(Path::new("data/places.jsonl"), false),
            InputFormat::JsonLines
        );
        assert_eq!(
            InputFormat::for_path(Path::new("data/places.JSONL"), false),
            InputFormat::JsonLines
        );
        assert_eq!(
            InputFormat::for_path(Path::new("data/places.json"), false),
            InputFormat::JsonArray
        );
        assert_eq!(
            InputFormat::for_path(Path::new("data/places.json"), true),
            InputFormat::JsonLines
        );
    }

    #[test]
    fn test_parse_json_array() {
        let records = parse_json_array(r#"[{"name": "a"}, 3]"#).unwrap();
        assert_eq!(
            records,
            vec![RawRecord::Json(json!({"name": "a"})), RawRecord::Json(json!(3))]
        );
    }

    #[test]
    fn test_parse_json_array_rejects_object() {
        let err = parse_json_array(r#"{"name": "a"}"#).unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_parse_json_lines_keeps_going() {
        let text = "{\"name\": \"a\"}\n\n{oops\n{\"name\": \"b\"}\n";
        let records = parse_json_lines(text);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], RawRecord::Json(json!({"name": "a"})));
        assert!(matches!(&records[1], RawRecord::Malformed { line: 3, text, .. } if text == "{oops"));
        assert_eq!(records[2], RawRecord::Json(json!({"name": "b"})));
    }

    #[test]
    fn test_json_lines_streams_and_numbers_lines() {
        let input = "{\"name\": \"a\"}\r\n\n[1\n{\"name\": \"b\"}";
        let mut lines = JsonLines::new(input.as_bytes());
        assert_eq!(lines.next(), Some(RawRecord::Json(json!({"name": "a"}))));
        assert!(matches!(lines.next(), Some(RawRecord::Malformed { line: 3, .. })));
        assert_eq!(lines.next(), Some(RawRecord::Json(json!({"name": "b"}))));
        assert_eq!(lines.next(), None);
        assert!(lines.take_error().is_none());
    }

    #[test]
    fn test_json_lines_invalid_utf8_is_malformed() {
        let input: &[u8] = b"{\"name\": \"a\"}\n\xff\xfe\n{\"name\": \"b\"}\n";
        let records: Vec<_> = JsonLines::new(input).collect();
        assert_eq!(records.len(), 3);
        assert!(matches!(&records[1], RawRecord::Malformed { line: 2, .. }));
    }

    #[test]
    fn test_json_lines_keeps_read_error() {
        struct Broken;
        impl io::Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "disk gone"))
            }
        }
        let mut lines = JsonLines::new(io::BufReader::new(Broken));
        assert_eq!(lines.next(), None);
        assert_eq!(lines.take_error().unwrap().to_string(), "disk gone");
    }
}
