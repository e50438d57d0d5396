//! Shared types passed between pipeline stages.
//!
//! A [`Document`] is built once by the renderer and then only read: by the
//! collection aggregator, by layouts (serialized into the template context),
//! and by the tree materializer. It is handed around as `Arc<Document>`.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::path::PathBuf;

/// One rendered markdown file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Absolute path of the source file. Unique within a build.
    #[serde(skip)]
    pub source_path: PathBuf,
    /// Source path relative to the source root.
    #[serde(skip)]
    pub rel_path: PathBuf,
    /// URL path the page is served under, e.g. `/blog/post/`.
    pub path: String,
    /// Metadata title, or the file stem.
    pub title: String,
    #[serde(serialize_with = "serialize_time")]
    pub time: DateTime<FixedOffset>,
    pub draft: bool,
    /// Rendered markup of the body.
    pub content: String,
}

/// Times reach templates as RFC 3339 strings, which sort lexically and
/// work with Tera's `date` filter.
fn serialize_time<S: serde::Serializer>(
    time: &DateTime<FixedOffset>,
    s: S,
) -> Result<S::Ok, S::Error> {
    s.serialize_str(&time.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_template_fields_only() {
        let doc = Document {
            source_path: "/site/src/a.md".into(),
            rel_path: "a.md".into(),
            path: "/a/".into(),
            title: "A".into(),
            time: DateTime::parse_from_rfc3339("2020-01-02T03:04:05+00:00").unwrap(),
            draft: false,
            content: "<p>a</p>".into(),
        };
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["path"], "/a/");
        assert_eq!(value["title"], "A");
        assert_eq!(value["time"], "2020-01-02T03:04:05+00:00");
        assert_eq!(value["content"], "<p>a</p>");
        assert!(value.get("source_path").is_none());
    }
}
