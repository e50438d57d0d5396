//! Second build phase: mirror the source tree into the output root.
//!
//! Every walked entry is classified once into a [`FileRole`] and handled by
//! role:
//!
//! ```text
//! src/                          build/
//! ├── layout.tmpl   Layout      (skipped)
//! ├── about.md      Document  → about/index.html   layout + minify
//! ├── wip.md        Document  → (draft, skipped)
//! ├── feed.html     Template  → feed.html          template + minify
//! ├── site.css      Asset     → site.css           minify
//! └── robots.txt    Static    → robots.txt         byte copy
//! ```
//!
//! Entries are independent: a failure is returned for that entry alone and
//! the caller decides what it means for the build.

use crate::build::{BuildError, EntryError, Operation};
use crate::config::SiteConfig;
use crate::layout::{self, LayoutCache, SiteData};
use crate::minify::{self, MinifyKind};
use crate::naming;
use crate::types::Document;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Extensions treated as markdown documents.
pub const MARKDOWN_EXTS: [&str; 2] = ["md", "markdown"];

/// What an entry of the source tree is, decided once per entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Directory,
    /// The per-directory layout file.
    Layout,
    /// Markdown, rendered through the layout.
    Document,
    /// `.html`/`.htm`, executed as a template.
    Template,
    Asset(MinifyKind),
    Static,
}

impl FileRole {
    pub fn classify(path: &Path, is_dir: bool, layout_name: &str) -> Self {
        if is_dir {
            return FileRole::Directory;
        }
        if path.file_name() == Some(OsStr::new(layout_name)) {
            return FileRole::Layout;
        }
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if MARKDOWN_EXTS.contains(&ext.as_str()) {
            return FileRole::Document;
        }
        if ext == "html" || ext == "htm" {
            return FileRole::Template;
        }
        match MinifyKind::for_asset(path) {
            Some(kind) => FileRole::Asset(kind),
            None => FileRole::Static,
        }
    }
}

/// A walked source entry.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Relative to the source root.
    pub rel: PathBuf,
    pub role: FileRole,
}

/// Walk the source tree in lexical order, skipping hidden entries and the
/// root itself. Walk failures are yielded as errors and the walk goes on.
pub fn walk_source<'a>(
    source_root: &'a Path,
    layout_name: &'a str,
) -> impl Iterator<Item = Result<SourceEntry, BuildError>> + 'a {
    WalkDir::new(source_root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !naming::is_hidden(e.file_name()))
        .map(move |entry| {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(source_root).to_path_buf();
                BuildError::entry(&path, Operation::Walk, e)
            })?;
            let role = FileRole::classify(entry.path(), entry.file_type().is_dir(), layout_name);
            let rel = entry
                .path()
                .strip_prefix(source_root)
                .unwrap_or(entry.path())
                .to_path_buf();
            Ok(SourceEntry {
                path: entry.into_path(),
                rel,
                role,
            })
        })
}

/// What happened to one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Draft,
    Page,
    Template,
    Minified,
    Copied,
}

/// Everything phase 2 reads. Shared by reference across workers.
pub struct Materializer<'a> {
    pub output_root: &'a Path,
    pub config: &'a SiteConfig,
    pub documents: &'a HashMap<PathBuf, Arc<Document>>,
    pub site: &'a SiteData,
    pub layouts: &'a LayoutCache,
}

impl Materializer<'_> {
    pub fn materialize(&self, entry: &SourceEntry) -> Result<Outcome, BuildError> {
        match entry.role {
            FileRole::Directory | FileRole::Layout => Ok(Outcome::Skipped),
            FileRole::Document => self.page(entry),
            FileRole::Template => self.template(entry),
            FileRole::Asset(kind) => self.asset(entry, kind),
            FileRole::Static => self.copy(entry),
        }
    }

    /// Output file of `entry`, relative to the output root. `None` for
    /// entries that write nothing: directories, layouts and drafts.
    pub fn output_rel(&self, entry: &SourceEntry) -> Option<PathBuf> {
        match entry.role {
            FileRole::Directory | FileRole::Layout => None,
            FileRole::Document => self
                .documents
                .get(&entry.path)
                .filter(|doc| !doc.draft)
                .map(|_| naming::document_output(&entry.rel, self.config.paths.style)),
            FileRole::Template | FileRole::Asset(_) | FileRole::Static => Some(entry.rel.clone()),
        }
    }

    /// Fail if two entries would write the same output file.
    pub fn check_outputs<I>(&self, entries: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = Result<SourceEntry, BuildError>>,
    {
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
        for entry in entries {
            let entry = entry?;
            let Some(output) = self.output_rel(&entry) else {
                continue;
            };
            if let Some(first) = claimed.insert(output.clone(), entry.path.clone()) {
                return Err(BuildError::OutputCollision {
                    output,
                    first,
                    second: entry.path,
                });
            }
        }
        Ok(())
    }

    fn page(&self, entry: &SourceEntry) -> Result<Outcome, BuildError> {
        let doc = self
            .documents
            .get(&entry.path)
            .ok_or_else(|| BuildError::entry(&entry.path, Operation::Layout, EntryError::NotRendered))?;
        if doc.draft {
            tracing::debug!(path = %entry.rel.display(), "skipping draft");
            return Ok(Outcome::Draft);
        }

        let html = layout::render_layout(self.layouts, doc, self.site)
            .map_err(|e| BuildError::entry(&entry.path, Operation::Layout, e))?;
        let html = minify::minify_if(self.config.minify.html, MinifyKind::Html, html.as_bytes());
        let out = self
            .output_root
            .join(naming::document_output(&entry.rel, self.config.paths.style));
        write(&out, &html)?;
        Ok(Outcome::Page)
    }

    fn template(&self, entry: &SourceEntry) -> Result<Outcome, BuildError> {
        let source = std::fs::read_to_string(&entry.path)
            .map_err(|e| BuildError::entry(&entry.path, Operation::Read, e))?;
        let html = layout::render_template(&source, &entry.path, &entry.rel, self.site)
            .map_err(|e| BuildError::entry(&entry.path, Operation::Template, e))?;
        let html = minify::minify_if(self.config.minify.html, MinifyKind::Html, html.as_bytes());
        write(&self.output_root.join(&entry.rel), &html)?;
        Ok(Outcome::Template)
    }

    fn asset(&self, entry: &SourceEntry, kind: MinifyKind) -> Result<Outcome, BuildError> {
        if !self.config.minify.assets {
            return self.copy(entry);
        }
        let bytes = std::fs::read(&entry.path)
            .map_err(|e| BuildError::entry(&entry.path, Operation::Read, e))?;
        write(&self.output_root.join(&entry.rel), &minify::minify(kind, &bytes))?;
        Ok(Outcome::Minified)
    }

    fn copy(&self, entry: &SourceEntry) -> Result<Outcome, BuildError> {
        let out = self.output_root.join(&entry.rel);
        create_parent(&out)?;
        std::fs::copy(&entry.path, &out)
            .map_err(|e| BuildError::entry(&entry.path, Operation::Copy, e))?;
        Ok(Outcome::Copied)
    }
}

fn create_parent(path: &Path) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BuildError::entry(parent, Operation::Write, e))?;
    }
    Ok(())
}

fn write(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    create_parent(path)?;
    std::fs::write(path, contents).map_err(|e| BuildError::entry(path, Operation::Write, e))
}
