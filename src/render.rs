//! Document rendering: raw markdown text in, [`Document`] out.
//!
//! Two independent pieces of work run on the same borrowed input:
//!
//! ```text
//!            raw text
//!           /        \
//!   metadata::parse   metadata::strip → macros → markdown
//!           \        /
//!            Document
//! ```
//!
//! They are forked with `rayon::join`, and the `Document` is only assembled
//! once both sides have returned. An error on either side fails the document.

use crate::config::{MetadataStyle, PathStyle};
use crate::macros::{MacroError, MacroTable};
use crate::metadata::{self, MetadataError};
use crate::naming;
use crate::types::Document;
use chrono::{DateTime, FixedOffset};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Macro(#[from] MacroError),
    #[error("{} is not under the source root {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },
}

/// Build-wide inputs shared by every document render.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub source_root: &'a Path,
    pub metadata_style: MetadataStyle,
    pub path_style: PathStyle,
    /// Fixed for the whole build; used when a metadata block has no `time`.
    pub build_time: DateTime<FixedOffset>,
    pub macros: &'a MacroTable,
}

/// Markdown extensions enabled for every document.
fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_SMART_PUNCTUATION
}

/// Convert markdown to HTML. Raw HTML in the input passes through.
pub fn render_markdown(body: &str) -> String {
    let parser = Parser::new_ext(body, markdown_options());
    let mut html = String::with_capacity(body.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}

/// Render one document.
///
/// `mtime` is the source file's modification time, used as `time` when the
/// document has no metadata block at all.
pub fn render_document(
    raw: &str,
    source_path: &Path,
    mtime: DateTime<FixedOffset>,
    ctx: &RenderContext<'_>,
) -> Result<Document, RenderError> {
    let rel_path = source_path
        .strip_prefix(ctx.source_root)
        .map_err(|_| RenderError::OutsideRoot {
            path: source_path.to_path_buf(),
            root: ctx.source_root.to_path_buf(),
        })?
        .to_path_buf();

    let (parsed, content) = rayon::join(
        || metadata::parse(raw, ctx.metadata_style, ctx.build_time),
        || -> Result<String, MacroError> {
            let body = metadata::strip(raw, ctx.metadata_style);
            let expanded = ctx.macros.expand(body)?;
            Ok(render_markdown(&expanded))
        },
    );
    let parsed = parsed?;
    let content = content?;

    // A block's title is taken as written, even when empty.
    let (title, time, draft) = match parsed.metadata {
        Some(meta) => (meta.title, meta.time, meta.draft),
        None => (naming::file_stem(&rel_path), mtime, false),
    };

    Ok(Document {
        source_path: source_path.to_path_buf(),
        path: naming::document_url(&rel_path, ctx.path_style),
        rel_path,
        title,
        time,
        draft,
        content,
    })
}
