//! # Styx
//!
//! A small static site generator. The source tree is the site: markdown
//! documents become pages wrapped in their directory's layout, `.html` files
//! are templates that can list documents, text assets are minified, and
//! everything else is copied verbatim.
//!
//! # Architecture: One Build, Three Passes
//!
//! ```text
//! 1. Render      src/**/*.md   →  Documents       (metadata + macros + markdown)
//! 2. Aggregate   Documents     →  Collections     (per directory, drafts out, newest first)
//! 3. Materialize src/**        →  build/          (layouts, templates, minify, copy)
//! ```
//!
//! Every document is rendered before any template runs, so a template in one
//! directory can list the documents of any other. Each pass fans out over a
//! per-build rayon pool; the first error fails the build and names the file.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`build`] | The pipeline: pre-flight checks, the three passes, the build report |
//! | [`metadata`] | Parse and strip the metadata block at the top of a document |
//! | [`macros`] | Named functions callable from document bodies (`gist`) |
//! | [`render`] | One markdown file → one [`types::Document`] |
//! | [`collection`] | Group documents by directory, drop drafts, sort newest first |
//! | [`layout`] | Per-directory `layout.tmpl` cache and template rendering |
//! | [`materialize`] | Classify source entries and write their output |
//! | [`minify`] | HTML/CSS/JS/SVG minification |
//! | [`naming`] | Output paths and URLs for documents |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`types`] | [`types::Document`], as seen by templates |
//! | [`init`] | Scaffold a new site |
//! | [`serve`] | Local preview server |
//! | [`watch`] | Rebuild on change |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Tera For User Templates
//!
//! Layouts and templates are written by site authors and loaded at build
//! time, so they use [Tera](https://keats.github.io/tera/). Template output is
//! autoescaped; rendered markdown is inserted with `| safe`.
//!
//! ## Whole-Site Rebuilds
//!
//! There is no incremental mode. Any template can depend on any document, so
//! every build renders everything. The output is deterministic: two builds of
//! the same tree produce byte-identical files.

pub mod build;
pub mod collection;
pub mod config;
pub mod init;
pub mod layout;
pub mod macros;
pub mod materialize;
pub mod metadata;
pub mod minify;
pub mod naming;
pub mod output;
pub mod render;
pub mod serve;
pub mod types;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;
