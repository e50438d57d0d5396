//! Shared test utilities for the styx unit tests.
//!
//! Provides on-disk site fixtures, document builders for the aggregation and
//! layout tests, and a tree snapshot helper for comparing whole output
//! directories.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let site = site(&[
//!     ("src/layout.tmpl", "{{ current.content | safe }}"),
//!     ("src/hello.md", "+++\ntitle = Hello\n+++\nHi"),
//! ]);
//! let report = Build::new(site.path(), SiteConfig::default())
//!     .with_build_time(fixed_time())
//!     .run()
//!     .unwrap();
//! assert_eq!(read(site.path(), "build/hello/index.html"), "<p>Hi</p>");
//! ```

use crate::config::PathStyle;
use crate::metadata::parse_time;
use crate::naming;
use crate::types::Document;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Create a temp site root containing `files` (paths relative to the root).
pub fn site(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (rel, contents) in files {
        write(tmp.path(), rel, contents);
    }
    tmp
}

/// Write a file under `root`, creating parent directories.
pub fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// Read a file under `root` as a string. Panics with the path on failure.
pub fn read(root: &Path, rel: &str) -> String {
    let path = root.join(rel);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()))
}

/// Build time used by tests that need deterministic timestamps.
pub fn fixed_time() -> DateTime<FixedOffset> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .unwrap()
        .fixed_offset()
}

// =========================================================================
// Documents
// =========================================================================

/// A rendered document at `rel` (relative to the source root), titled with
/// its file stem, using pretty paths.
pub fn document(rel: &str, time: &str, draft: bool) -> Arc<Document> {
    let rel_path = Path::new(rel);
    Arc::new(Document {
        source_path: Path::new("/site/src").join(rel_path),
        rel_path: rel_path.to_path_buf(),
        path: naming::document_url(rel_path, PathStyle::Pretty),
        title: naming::file_stem(rel_path),
        time: parse_time(time).unwrap(),
        draft,
        content: format!("<p>{rel}</p>"),
    })
}

// =========================================================================
// Tree snapshots
// =========================================================================

/// Every file under `root`, keyed by `/`-separated relative path.
pub fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            (naming::slash_path(rel), std::fs::read(e.path()).unwrap())
        })
        .collect()
}
