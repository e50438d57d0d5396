//! Document metadata blocks.
//!
//! A markdown document may open with a metadata block: a delimiter line, a
//! few `key <sep> value` lines, and the same delimiter again.
//!
//! ```text
//! +++
//! title = "Hello, world"
//! time = "2006-01-02 15:04:05 -07:00"
//! draft = true
//! +++
//! # Body starts here
//! ```
//!
//! The delimiter and separator depend on [`MetadataStyle`]: `+++` with `=`
//! (default) or `---` with `:`.
//!
//! ## Recognized keys
//!
//! - **title**: free text, defaults to empty.
//! - **draft**: `true` or `false`, defaults to `false`. Anything else is an error.
//! - **time**: tried against [`TIME_FORMATS`] in order, first match wins.
//!   Values without an offset are taken as UTC. When absent, the caller-supplied
//!   build time is used, so every undated document in one build shares the
//!   same timestamp.
//!
//! Unknown keys are ignored. Values may be wrapped in double quotes.
//!
//! ## No block
//!
//! A document whose first line is not the delimiter has no metadata. That is
//! not an error: [`parse`] reports `metadata: None` and the whole input is
//! the body.

use crate::config::MetadataStyle;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    #[error("metadata line {line:?} should be in format \"key {separator} value\"")]
    Malformed { line: String, separator: char },
    #[error(
        "key {key:?} has invalid value {value:?}\nexpected values/formats: {{{}}}",
        .expected.join(", ")
    )]
    InvalidValue {
        key: String,
        value: String,
        expected: Vec<String>,
    },
    #[error("metadata block opened with {delimiter:?} is never closed")]
    Unterminated { delimiter: &'static str },
}

/// Accepted `time` formats, in the order they are tried.
pub const TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S %:z", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d"];

/// Fields extracted from a metadata block.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub title: String,
    pub draft: bool,
    pub time: DateTime<FixedOffset>,
}

impl Metadata {
    /// Serialize back into a block in the given style.
    ///
    /// `title` is written when non-empty, `draft` only when true, `time`
    /// always, in the first of [`TIME_FORMATS`]. Parsing the result yields
    /// the same fields.
    pub fn to_block(&self, style: MetadataStyle) -> String {
        let delimiter = style.delimiter();
        let sep = style.separator();
        let mut out = String::new();
        let _ = writeln!(out, "{delimiter}");
        if !self.title.is_empty() {
            let _ = writeln!(out, "title {sep} \"{}\"", self.title);
        }
        if self.draft {
            let _ = writeln!(out, "draft {sep} true");
        }
        let _ = writeln!(out, "time {sep} \"{}\"", self.time.format(TIME_FORMATS[0]));
        let _ = writeln!(out, "{delimiter}");
        out
    }
}

/// Result of [`parse`]: the metadata, if a block was present, and the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<'a> {
    pub metadata: Option<Metadata>,
    pub body: &'a str,
}

/// Parse the metadata block at the top of `raw`.
///
/// `default_time` is used for a block without a `time` key.
pub fn parse(
    raw: &str,
    style: MetadataStyle,
    default_time: DateTime<FixedOffset>,
) -> Result<Parsed<'_>, MetadataError> {
    let (header, rest) = match locate(raw, style.delimiter()) {
        Block::Absent => {
            return Ok(Parsed {
                metadata: None,
                body: raw,
            });
        }
        Block::Unterminated => {
            return Err(MetadataError::Unterminated {
                delimiter: style.delimiter(),
            });
        }
        Block::Closed { header, rest } => (header, rest),
    };

    let mut title = "";
    let mut draft = "";
    let mut time = "";

    for line in header.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(style.separator()) else {
            return Err(MetadataError::Malformed {
                line: line.to_string(),
                separator: style.separator(),
            });
        };
        match clean(key) {
            "title" => title = clean(value),
            "draft" => draft = clean(value),
            "time" => time = clean(value),
            _ => {}
        }
    }

    let metadata = Metadata {
        title: title.to_string(),
        draft: parse_draft(draft)?,
        time: if time.is_empty() {
            default_time
        } else {
            parse_time(time)?
        },
    };

    Ok(Parsed {
        metadata: Some(metadata),
        body: trim_leading_blank_lines(rest),
    })
}

/// Return the body of `raw` with any metadata block removed.
///
/// Never fails: an unterminated block leaves the input untouched, and
/// [`parse`] is what reports it.
pub fn strip(raw: &str, style: MetadataStyle) -> &str {
    match locate(raw, style.delimiter()) {
        Block::Closed { rest, .. } => trim_leading_blank_lines(rest),
        Block::Absent | Block::Unterminated => raw,
    }
}

enum Block<'a> {
    Absent,
    Unterminated,
    Closed { header: &'a str, rest: &'a str },
}

fn locate<'a>(raw: &'a str, delimiter: &str) -> Block<'a> {
    let mut lines = raw.split_inclusive('\n');
    let Some(first) = lines.next() else {
        return Block::Absent;
    };
    if trim_eol(first) != delimiter {
        return Block::Absent;
    }

    let header_start = first.len();
    let mut offset = header_start;
    for line in lines {
        if trim_eol(line) == delimiter {
            return Block::Closed {
                header: &raw[header_start..offset],
                rest: &raw[offset + line.len()..],
            };
        }
        offset += line.len();
    }
    Block::Unterminated
}

fn trim_eol(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Trim surrounding whitespace and one pair of double quotes.
fn clean(s: &str) -> &str {
    let s = s.trim();
    let s = s.strip_prefix('"').unwrap_or(s);
    s.strip_suffix('"').unwrap_or(s)
}

fn trim_leading_blank_lines(s: &str) -> &str {
    let mut rest = s;
    while let Some(idx) = rest.find('\n') {
        if rest[..idx].trim().is_empty() {
            rest = &rest[idx + 1..];
        } else {
            return rest;
        }
    }
    if rest.trim().is_empty() { "" } else { rest }
}

fn parse_draft(value: &str) -> Result<bool, MetadataError> {
    match value {
        "" | "false" => Ok(false),
        "true" => Ok(true),
        other => Err(MetadataError::InvalidValue {
            key: "draft".to_string(),
            value: other.to_string(),
            expected: vec!["true".to_string(), "false".to_string()],
        }),
    }
}

/// Try each of [`TIME_FORMATS`] in order.
pub fn parse_time(value: &str) -> Result<DateTime<FixedOffset>, MetadataError> {
    let [zoned, naive, date] = TIME_FORMATS;
    let parsed = DateTime::parse_from_str(value, zoned)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, naive)
                .ok()
                .map(|t| t.and_utc().fixed_offset())
        })
        .or_else(|| {
            NaiveDate::parse_from_str(value, date)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|t| t.and_utc().fixed_offset())
        });

    parsed.ok_or_else(|| MetadataError::InvalidValue {
        key: "time".to_string(),
        value: value.to_string(),
        expected: TIME_FORMATS.iter().map(|f| f.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn build_time() -> DateTime<FixedOffset> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .unwrap()
            .fixed_offset()
    }

    fn toml(raw: &str) -> Result<Parsed<'_>, MetadataError> {
        parse(raw, MetadataStyle::Toml, build_time())
    }

    #[test]
    fn strip_removes_block() {
        assert_eq!(strip("+++\ntitle = foo\n+++\n# bar", MetadataStyle::Toml), "# bar");
    }

    #[test]
    fn strip_without_block_is_identity() {
        assert_eq!(strip("# bar", MetadataStyle::Toml), "# bar");
    }

    #[test]
    fn strip_trims_leading_blank_lines_only() {
        let raw = "+++\ntitle = foo\n+++\n\n  \n    indented code\n";
        assert_eq!(strip(raw, MetadataStyle::Toml), "    indented code\n");
    }

    #[test]
    fn strip_leaves_unterminated_block() {
        let raw = "+++\ntitle = foo\n# bar";
        assert_eq!(strip(raw, MetadataStyle::Toml), raw);
    }

    #[test]
    fn no_block_is_not_an_error() {
        let parsed = toml("# Just a heading\n").unwrap();
        assert_eq!(parsed.metadata, None);
        assert_eq!(parsed.body, "# Just a heading\n");
    }

    #[test]
    fn empty_input_has_no_metadata() {
        let parsed = toml("").unwrap();
        assert_eq!(parsed.metadata, None);
        assert_eq!(parsed.body, "");
    }

    #[test]
    fn parses_all_keys() {
        let raw = "+++\ntitle = \"Hello, world\"\ndraft = true\ntime = \"2006-01-02 15:04:05 -07:00\"\n+++\n\nBody\n";
        let parsed = toml(raw).unwrap();
        let meta = parsed.metadata.unwrap();
        assert_eq!(meta.title, "Hello, world");
        assert!(meta.draft);
        assert_eq!(
            meta.time,
            DateTime::parse_from_rfc3339("2006-01-02T15:04:05-07:00").unwrap()
        );
        assert_eq!(parsed.body, "Body\n");
    }

    #[test]
    fn unquoted_values_and_unknown_keys() {
        let raw = "+++\ntitle = Plain title\nauthor = someone\n+++\nBody";
        let meta = toml(raw).unwrap().metadata.unwrap();
        assert_eq!(meta.title, "Plain title");
        assert!(!meta.draft);
    }

    #[test]
    fn value_keeps_later_separators() {
        let raw = "+++\ntitle = a = b\n+++\n";
        let meta = toml(raw).unwrap().metadata.unwrap();
        assert_eq!(meta.title, "a = b");
    }

    #[test]
    fn missing_time_uses_build_time() {
        let meta = toml("+++\ntitle = x\n+++\n").unwrap().metadata.unwrap();
        assert_eq!(meta.time, build_time());
    }

    #[test]
    fn date_only_is_midnight_utc() {
        let meta = toml("+++\ntime = 2020-01-02\n+++\n").unwrap().metadata.unwrap();
        assert_eq!(
            meta.time,
            Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap().fixed_offset()
        );
    }

    #[test]
    fn datetime_without_offset_is_utc() {
        let meta = toml("+++\ntime = \"2020-01-02 03:04:05\"\n+++\n")
            .unwrap()
            .metadata
            .unwrap();
        assert_eq!(
            meta.time,
            Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap().fixed_offset()
        );
    }

    #[test]
    fn crlf_line_endings() {
        let raw = "+++\r\ntitle = Windows\r\n+++\r\nBody\r\n";
        let parsed = toml(raw).unwrap();
        assert_eq!(parsed.metadata.unwrap().title, "Windows");
        assert_eq!(parsed.body, "Body\r\n");
    }

    #[test]
    fn yaml_style() {
        let raw = "---\ntitle: Hello\ntime: 2020-01-02 03:04:05 +02:00\n---\nBody";
        let parsed = parse(raw, MetadataStyle::Yaml, build_time()).unwrap();
        let meta = parsed.metadata.unwrap();
        assert_eq!(meta.title, "Hello");
        assert_eq!(
            meta.time,
            DateTime::parse_from_rfc3339("2020-01-02T03:04:05+02:00").unwrap()
        );
        assert_eq!(parsed.body, "Body");
    }

    #[test]
    fn yaml_delimiter_ignored_in_toml_style() {
        let raw = "---\ntitle: Hello\n---\nBody";
        assert_eq!(toml(raw).unwrap().metadata, None);
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn malformed_line() {
        let err = toml("+++\njust words\n+++\n").unwrap_err();
        assert_eq!(
            err,
            MetadataError::Malformed {
                line: "just words".into(),
                separator: '='
            }
        );
    }

    #[test]
    fn invalid_draft_names_key_and_value() {
        let err = toml("+++\ndraft = maybe\n+++\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"draft\""));
        assert!(msg.contains("\"maybe\""));
        assert!(msg.contains("{true, false}"));
    }

    #[test]
    fn invalid_time_lists_formats() {
        let err = toml("+++\ntime = notadate\n+++\n").unwrap_err();
        match &err {
            MetadataError::InvalidValue {
                key,
                value,
                expected,
            } => {
                assert_eq!(key, "time");
                assert_eq!(value, "notadate");
                assert_eq!(expected.len(), TIME_FORMATS.len());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("%Y-%m-%d"));
    }

    #[test]
    fn unterminated_block() {
        let err = toml("+++\ntitle = x\nBody").unwrap_err();
        assert_eq!(err, MetadataError::Unterminated { delimiter: "+++" });
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    #[test]
    fn block_round_trips() {
        let original = "+++\ntitle=   Quoted \"inner\" words\ndraft = true\ntime = 2021-03-04\n+++\nBody text\n";
        let first = toml(original).unwrap();
        let meta = first.metadata.clone().unwrap();

        let rewritten = format!("{}{}", meta.to_block(MetadataStyle::Toml), first.body);
        let second = toml(&rewritten).unwrap();

        assert_eq!(second.metadata.unwrap(), meta);
        assert_eq!(second.body, first.body);
    }

    #[test]
    fn block_round_trips_in_yaml_style() {
        let meta = Metadata {
            title: "Yaml".into(),
            draft: false,
            time: build_time(),
        };
        let block = meta.to_block(MetadataStyle::Yaml);
        assert!(block.starts_with("---\n"));
        assert!(!block.contains("draft"));
        let parsed = parse(&block, MetadataStyle::Yaml, build_time()).unwrap();
        assert_eq!(parsed.metadata.unwrap(), meta);
    }
}
