//! Per-directory collections of published documents.
//!
//! After every document has rendered, the published ones (not drafts) are
//! grouped by the directory they live in and sorted newest first:
//!
//! ```text
//! src/section/a.md  time 2020-01-01  ┐
//! src/section/b.md  time 2021-01-01  ├─→ "section": [b, a]
//! src/section/c.md  draft            ┘
//! src/about.md                       ──→ ".":       [about]
//! ```
//!
//! Equal timestamps are ordered by URL path so the result never depends on
//! which worker finished first.

use crate::naming;
use crate::types::Document;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A directory's published documents, newest first.
pub type Collection = Vec<Arc<Document>>;

/// Collections keyed by directory (relative to the source root, `/`
/// separated, root is `"."`).
#[derive(Debug, Clone, Default)]
pub struct Collections {
    by_dir: BTreeMap<String, Collection>,
}

impl Collections {
    /// Group and sort `documents`. Input order does not matter.
    pub fn aggregate<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<Document>>,
    {
        let mut by_dir: BTreeMap<String, Collection> = BTreeMap::new();
        for doc in documents.into_iter().filter(|d| !d.draft) {
            by_dir
                .entry(naming::dir_key(&doc.rel_path))
                .or_default()
                .push(Arc::clone(doc));
        }
        for docs in by_dir.values_mut() {
            docs.sort_by(|a, b| b.time.cmp(&a.time).then_with(|| a.path.cmp(&b.path)));
        }
        Self { by_dir }
    }

    /// The collection for a directory key, empty if it has no published documents.
    pub fn get(&self, dir: &str) -> &[Arc<Document>] {
        self.by_dir.get(dir).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Arc<Document>])> {
        self.by_dir.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_dir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_dir.is_empty()
    }

    /// Number of published documents across all directories.
    pub fn document_count(&self) -> usize {
        self.by_dir.values().map(Vec::len).sum()
    }

    /// Template value of a single collection.
    pub fn collection_value(&self, dir: &str) -> Value {
        serde_json::to_value(self.get(dir)).unwrap_or(Value::Array(Vec::new()))
    }

    /// Template value of the whole map, as exposed to layouts under `all`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.by_dir).unwrap_or(Value::Object(Default::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::document;

    #[test]
    fn groups_by_directory() {
        let docs = vec![
            document("section/a.md", "2020-01-01", false),
            document("about.md", "2020-01-01", false),
            document("section/deeper/c.md", "2020-01-01", false),
        ];
        let collections = Collections::aggregate(&docs);
        assert_eq!(collections.len(), 3);
        assert_eq!(collections.get(".").len(), 1);
        assert_eq!(collections.get("section").len(), 1);
        assert_eq!(collections.get("section/deeper").len(), 1);
        assert!(collections.get("missing").is_empty());
    }

    #[test]
    fn newest_first() {
        let docs = vec![
            document("s/a.md", "2020-01-01", false),
            document("s/b.md", "2021-01-01", false),
            document("s/c.md", "2019-01-01", false),
        ];
        let collections = Collections::aggregate(&docs);
        let titles: Vec<_> = collections.get("s").iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, ["b", "a", "c"]);
    }

    #[test]
    fn ties_break_on_path() {
        let forward = vec![
            document("s/b.md", "2020-01-01", false),
            document("s/a.md", "2020-01-01", false),
        ];
        let backward: Vec<_> = forward.iter().rev().cloned().collect();
        for docs in [forward, backward] {
            let collections = Collections::aggregate(&docs);
            let titles: Vec<_> = collections.get("s").iter().map(|d| d.title.as_str()).collect();
            assert_eq!(titles, ["a", "b"]);
        }
    }

    #[test]
    fn drafts_excluded() {
        let docs = vec![
            document("s/a.md", "2020-01-01", false),
            document("s/wip.md", "2022-01-01", true),
            document("only/draft.md", "2022-01-01", true),
        ];
        let collections = Collections::aggregate(&docs);
        assert_eq!(collections.get("s").len(), 1);
        assert!(collections.get("only").is_empty());
        assert_eq!(collections.document_count(), 1);
    }

    #[test]
    fn template_values() {
        let docs = vec![document("s/a.md", "2020-01-01", false)];
        let collections = Collections::aggregate(&docs);
        let all = collections.to_value();
        assert_eq!(all["s"][0]["title"], "a");
        assert_eq!(collections.collection_value("s")[0]["path"], "/s/a/");
        assert_eq!(collections.collection_value("nope"), Value::Array(vec![]));
    }
}
