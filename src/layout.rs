//! Layouts and stand-alone templates.
//!
//! Every directory holding markdown documents has a layout file (by default
//! `layout.tmpl`) next to them. Each document of that directory is rendered
//! through it with three variables:
//!
//! | Variable  | Value |
//! |-----------|-------|
//! | `current` | the document being rendered (absent in stand-alone templates) |
//! | `dir`     | the published documents of the same directory, newest first |
//! | `all`     | every directory's collection, keyed like `"."` or `"blog/2024"` |
//!
//! A document exposes `path`, `title`, `time`, `draft` and `content`. The
//! output is HTML-escaped, so the rendered body goes in with `safe`:
//!
//! ```text
//! <h1>{{ current.title }}</h1>
//! {{ current.content | safe }}
//! <ul>{% for page in dir %}<li><a href="{{ page.path }}">{{ page.title }}</a></li>{% endfor %}</ul>
//! ```
//!
//! `.html` files in the source tree are templates too: they see `dir` and
//! `all` but not `current`.
//!
//! ## Caching
//!
//! A layout is compiled the first time a document of its directory needs it.
//! The lookup, the compile and the insert happen under one lock, so two
//! workers never compile the same layout twice.

use crate::collection::Collections;
use crate::macros::error_chain;
use crate::naming;
use crate::types::Document;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context, Tera};
use thiserror::Error;

/// Internal template names. The `.html` suffix turns on autoescaping
/// whatever the file on disk is called.
const LAYOUT_TEMPLATE: &str = "layout.html";
const PAGE_TEMPLATE: &str = "page.html";

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("no layout {name:?} in {}", dir.display())]
    MissingLayout { dir: PathBuf, name: String },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("template {}: {message}", path.display())]
    Template { path: PathBuf, message: String },
}

impl LayoutError {
    fn template(path: &Path, err: &tera::Error) -> Self {
        LayoutError::Template {
            path: path.to_path_buf(),
            message: error_chain(err),
        }
    }
}

/// Data shared by every template render of one build.
#[derive(Debug)]
pub struct SiteData {
    pub collections: Collections,
    all: Value,
}

impl SiteData {
    pub fn new(collections: Collections) -> Self {
        let all = collections.to_value();
        Self { collections, all }
    }

    fn context(&self, current: Option<&Document>, dir_key: &str) -> Context {
        let mut ctx = Context::new();
        if let Some(doc) = current {
            ctx.insert("current", doc);
        }
        ctx.insert("dir", &self.collections.collection_value(dir_key));
        ctx.insert("all", &self.all);
        ctx
    }
}

/// Compiled layouts, one per directory.
#[derive(Debug)]
pub struct LayoutCache {
    file_name: String,
    compiled: Mutex<HashMap<PathBuf, Arc<Tera>>>,
}

impl LayoutCache {
    /// `file_name` is the layout file looked up in each directory.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            compiled: Mutex::new(HashMap::new()),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The compiled layout of `dir` (an absolute source directory).
    pub fn resolve(&self, dir: &Path) -> Result<Arc<Tera>, LayoutError> {
        let mut compiled = self.compiled.lock();
        if let Some(tera) = compiled.get(dir) {
            return Ok(Arc::clone(tera));
        }

        let path = dir.join(&self.file_name);
        let source = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LayoutError::MissingLayout {
                    dir: dir.to_path_buf(),
                    name: self.file_name.clone(),
                }
            } else {
                LayoutError::Io {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        let tera = Arc::new(compile(LAYOUT_TEMPLATE, &source, &path)?);
        tracing::debug!(layout = %path.display(), "compiled layout");
        compiled.insert(dir.to_path_buf(), Arc::clone(&tera));
        Ok(tera)
    }

    /// Number of layouts compiled so far.
    pub fn len(&self) -> usize {
        self.compiled.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn compile(name: &str, source: &str, path: &Path) -> Result<Tera, LayoutError> {
    let mut tera = Tera::default();
    tera.add_raw_template(name, source)
        .map_err(|e| LayoutError::template(path, &e))?;
    Ok(tera)
}

/// Render `doc` through its directory's layout.
pub fn render_layout(
    cache: &LayoutCache,
    doc: &Document,
    site: &SiteData,
) -> Result<String, LayoutError> {
    let dir = doc.source_path.parent().unwrap_or(Path::new(""));
    let tera = cache.resolve(dir)?;
    let ctx = site.context(Some(doc), &naming::dir_key(&doc.rel_path));
    tera.render(LAYOUT_TEMPLATE, &ctx).map_err(|e| {
        LayoutError::template(&dir.join(cache.file_name()), &e)
    })
}

/// Execute a stand-alone template. `rel_path` is relative to the source
/// root; `source_path` is only used in errors.
pub fn render_template(
    source: &str,
    source_path: &Path,
    rel_path: &Path,
    site: &SiteData,
) -> Result<String, LayoutError> {
    let tera = compile(PAGE_TEMPLATE, source, source_path)?;
    let ctx = site.context(None, &naming::dir_key(rel_path));
    tera.render(PAGE_TEMPLATE, &ctx)
        .map_err(|e| LayoutError::template(source_path, &e))
}
