//! Output paths and URLs for source entries.
//!
//! Every place that needs to know where a document ends up goes through this
//! module: the `path` a template sees and the file phase 2 writes are computed
//! by the same function, so links never point at files that were not written.
//!
//! ## Path styles
//!
//! | Source          | Pretty                | Flat              |
//! |-----------------|-----------------------|-------------------|
//! | `a.md`          | `a/index.html` → `/a/`| `a.html` → `/a.html` |
//! | `blog/post.md`  | `blog/post/index.html` → `/blog/post/` | `blog/post.html` → `/blog/post.html` |
//! | `blog/index.md` | `blog/index.html` → `/blog/` | same |
//! | `index.md`      | `index.html` → `/`    | same              |
//!
//! All inputs are paths relative to the source root.

use crate::config::PathStyle;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Key of the source root in the collection map.
pub const ROOT_KEY: &str = ".";

const INDEX_STEM: &str = "index";
const MARKUP_EXT: &str = "html";

/// Output file, relative to the output root, for a markdown document.
pub fn document_output(rel: &Path, style: PathStyle) -> PathBuf {
    let parent = rel.parent().unwrap_or(Path::new(""));
    let stem = file_stem(rel);
    if stem == INDEX_STEM {
        return parent.join(format!("{INDEX_STEM}.{MARKUP_EXT}"));
    }
    match style {
        PathStyle::Pretty => parent
            .join(stem)
            .join(format!("{INDEX_STEM}.{MARKUP_EXT}")),
        PathStyle::Flat => parent.join(format!("{stem}.{MARKUP_EXT}")),
    }
}

/// URL path (leading `/`, forward slashes) a document is served under.
pub fn document_url(rel: &Path, style: PathStyle) -> String {
    let parent = slash_path(rel.parent().unwrap_or(Path::new("")));
    let dir = if parent.is_empty() {
        "/".to_string()
    } else {
        format!("/{parent}/")
    };
    let stem = file_stem(rel);
    if stem == INDEX_STEM {
        return dir;
    }
    match style {
        PathStyle::Pretty => format!("{dir}{stem}/"),
        PathStyle::Flat => format!("{dir}{stem}.{MARKUP_EXT}"),
    }
}

/// Collection key of the directory containing `rel`.
///
/// ```text
/// post.md           → "."
/// blog/2024/post.md → "blog/2024"
/// ```
pub fn dir_key(rel: &Path) -> String {
    dir_key_of(rel.parent().unwrap_or(Path::new("")))
}

/// Collection key of a directory given relative to the source root.
pub fn dir_key_of(dir: &Path) -> String {
    let key = slash_path(dir);
    if key.is_empty() {
        ROOT_KEY.to_string()
    } else {
        key
    }
}

/// Join the normal components of a relative path with `/`.
pub fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Dot-files and dot-directories are never part of a site.
pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// File stem used as a title when a document has no metadata title.
pub fn file_stem(rel: &Path) -> String {
    rel.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
