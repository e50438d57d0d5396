//! The build coordinator.
//!
//! A build turns the source root into the output root in two walks over the
//! source tree, separated by a synchronous aggregation step:
//!
//! ```text
//! Idle
//!  │  pre-flight: source exists, output not inside source
//!  ▼
//! RenderingDocuments   walk, spawn one task per markdown file
//!  │  ── barrier: every render finished ──
//!  ▼
//! Aggregating          drafts dropped, collections sorted
//!  │  clean output root
//!  ▼
//! MaterializingTree    walk again, spawn one task per entry
//!  │  ── barrier: every entry finished ──
//!  ▼
//! Done | Failed
//! ```
//!
//! ## Workers
//!
//! Each build owns a rayon pool sized by `processing.max_processes`. Tasks
//! are spawned inside `ThreadPool::scope` while the walk is still running and
//! report back over an `mpsc` channel. The coordinator's own sender is dropped
//! only after the scope has returned, so the receiving loop ends exactly when
//! every task has reported and nothing can send after that.
//!
//! ## Errors
//!
//! The first error received decides the build's outcome. Tasks already
//! spawned still run to completion; their errors are logged and dropped.

use crate::collection::Collections;
use crate::config::{self, FailurePolicy, SiteConfig};
use crate::layout::{LayoutCache, LayoutError, SiteData};
use crate::macros::MacroTable;
use crate::materialize::{self, FileRole, Materializer, Outcome, SourceEntry};
use crate::render::{self, RenderContext, RenderError};
use crate::types::Document;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Where a build currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RenderingDocuments,
    Aggregating,
    MaterializingTree,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::RenderingDocuments => "rendering documents",
            Phase::Aggregating => "aggregating",
            Phase::MaterializingTree => "materializing tree",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What was being done to an entry when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Walk,
    Read,
    Render,
    Layout,
    Template,
    Write,
    Copy,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Walk => "walk",
            Operation::Read => "read",
            Operation::Render => "render",
            Operation::Layout => "layout",
            Operation::Template => "template",
            Operation::Write => "write",
            Operation::Copy => "copy",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error("document was not rendered")]
    NotRendered,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("build: {op} {}: {source}", path.display())]
    Entry {
        path: PathBuf,
        op: Operation,
        source: EntryError,
    },
    #[error("build: source root {} does not exist", .0.display())]
    MissingSource(PathBuf),
    #[error(
        "build: output root {} must not be inside source root {}",
        output_root.display(),
        source_root.display()
    )]
    OutputInsideSource {
        output_root: PathBuf,
        source_root: PathBuf,
    },
    #[error(
        "build: output root {} must not contain source root {}",
        output_root.display(),
        source_root.display()
    )]
    SourceInsideOutput {
        output_root: PathBuf,
        source_root: PathBuf,
    },
    #[error(
        "build: {} and {} both write {}",
        first.display(),
        second.display(),
        output.display()
    )]
    OutputCollision {
        output: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("build: clean {}: {source}", path.display())]
    Clean {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("build: worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl BuildError {
    pub fn entry(path: &Path, op: Operation, source: impl Into<EntryError>) -> Self {
        BuildError::Entry {
            path: path.to_path_buf(),
            op,
            source: source.into(),
        }
    }
}

/// Published document count of one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub dir: String,
    pub documents: usize,
}

/// Summary of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    /// Markdown files rendered, drafts included.
    pub documents: usize,
    pub drafts: usize,
    pub pages: usize,
    pub templates: usize,
    pub minified: usize,
    pub copied: usize,
    pub layouts: usize,
    pub collections: Vec<CollectionSummary>,
    pub elapsed: Duration,
}

/// One full build of a site.
///
/// ```no_run
/// use styx::{build::Build, config};
///
/// let site = std::path::Path::new("my-site");
/// let report = Build::new(site, config::load_config(site)?).run()?;
/// println!("{} pages", report.pages);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct Build {
    site_root: PathBuf,
    config: SiteConfig,
    build_time: DateTime<FixedOffset>,
    macros: MacroTable,
}

impl Build {
    pub fn new(site_root: impl Into<PathBuf>, config: SiteConfig) -> Self {
        Self {
            site_root: site_root.into(),
            config,
            build_time: Utc::now().fixed_offset(),
            macros: MacroTable::builtin(),
        }
    }

    /// Fix the time given to documents whose metadata has no `time`.
    pub fn with_build_time(mut self, time: DateTime<FixedOffset>) -> Self {
        self.build_time = time;
        self
    }

    /// Replace the builtin macro table.
    pub fn with_macros(mut self, macros: MacroTable) -> Self {
        self.macros = macros;
        self
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn source_root(&self) -> PathBuf {
        self.site_root.join(&self.config.source)
    }

    pub fn output_root(&self) -> PathBuf {
        self.site_root.join(&self.config.output)
    }

    pub fn run(&self) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        let source_root = self.source_root();
        let output_root = self.output_root();
        enter(Phase::Idle, &source_root);

        if let Err(err) = preflight(&source_root, &output_root) {
            enter(Phase::Failed, &source_root);
            return Err(err);
        }

        match self.run_phases(&source_root, &output_root) {
            Ok(mut report) => {
                report.elapsed = started.elapsed();
                enter(Phase::Done, &output_root);
                Ok(report)
            }
            Err(err) => {
                enter(Phase::Failed, &output_root);
                if self.config.build.on_failure == FailurePolicy::Remove && output_root.exists() {
                    if let Err(e) = std::fs::remove_dir_all(&output_root) {
                        tracing::warn!(path = %output_root.display(), error = %e, "failed to remove partial output");
                    }
                }
                Err(err)
            }
        }
    }

    fn run_phases(&self, source_root: &Path, output_root: &Path) -> Result<BuildReport, BuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config::effective_threads(&self.config.processing))
            .build()?;

        enter(Phase::RenderingDocuments, source_root);
        let documents = self.render_documents(&pool, source_root)?;

        enter(Phase::Aggregating, source_root);
        let collections = Collections::aggregate(documents.values());
        let site = SiteData::new(collections);

        let layouts = LayoutCache::new(self.config.layout.name.clone());
        let materializer = Materializer {
            output_root,
            config: &self.config,
            documents: &documents,
            site: &site,
            layouts: &layouts,
        };
        materializer.check_outputs(materialize::walk_source(source_root, &self.config.layout.name))?;

        if self.config.build.clean && output_root.exists() {
            std::fs::remove_dir_all(output_root).map_err(|source| BuildError::Clean {
                path: output_root.to_path_buf(),
                source,
            })?;
        }

        enter(Phase::MaterializingTree, output_root);
        let mut report = BuildReport {
            source_root: source_root.to_path_buf(),
            output_root: output_root.to_path_buf(),
            documents: documents.len(),
            drafts: documents.values().filter(|d| d.draft).count(),
            ..BuildReport::default()
        };
        self.materialize_tree(&pool, source_root, &materializer, &mut report)?;

        report.layouts = layouts.len();
        report.collections = site
            .collections
            .iter()
            .map(|(dir, docs)| CollectionSummary {
                dir: dir.to_string(),
                documents: docs.len(),
            })
            .collect();
        Ok(report)
    }

    /// Phase 1: every markdown document, rendered once.
    fn render_documents(
        &self,
        pool: &rayon::ThreadPool,
        source_root: &Path,
    ) -> Result<HashMap<PathBuf, Arc<Document>>, BuildError> {
        let ctx = RenderContext {
            source_root,
            metadata_style: self.config.metadata.style,
            path_style: self.config.paths.style,
            build_time: self.build_time,
            macros: &self.macros,
        };
        let layout_name = self.config.layout.name.as_str();

        let (tx, rx) = mpsc::channel();
        pool.scope(|s| {
            for entry in materialize::walk_source(source_root, layout_name) {
                match entry {
                    Ok(entry) if entry.role == FileRole::Document => {
                        let tx = tx.clone();
                        let ctx = &ctx;
                        s.spawn(move |_| {
                            let _ = tx.send(render_entry(&entry, ctx).map(Arc::new));
                        });
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = tx.send(Err(e));
                    }
                }
            }
        });
        drop(tx);

        let mut documents = HashMap::new();
        collect(rx, |doc: Arc<Document>| {
            documents.insert(doc.source_path.clone(), doc);
        })?;
        Ok(documents)
    }

    /// Phase 2: every entry of the source tree, mirrored into the output.
    fn materialize_tree(
        &self,
        pool: &rayon::ThreadPool,
        source_root: &Path,
        materializer: &Materializer<'_>,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        let (tx, rx) = mpsc::channel();
        pool.scope(|s| {
            for entry in materialize::walk_source(source_root, &self.config.layout.name) {
                let tx = tx.clone();
                match entry {
                    Ok(entry) => s.spawn(move |_| {
                        let _ = tx.send(materializer.materialize(&entry));
                    }),
                    Err(e) => {
                        let _ = tx.send(Err(e));
                    }
                }
            }
        });
        drop(tx);

        collect(rx, |outcome| match outcome {
            Outcome::Page => report.pages += 1,
            Outcome::Template => report.templates += 1,
            Outcome::Minified => report.minified += 1,
            Outcome::Copied => report.copied += 1,
            Outcome::Skipped | Outcome::Draft => {}
        })
    }
}

fn enter(phase: Phase, path: &Path) {
    match phase {
        Phase::Failed => tracing::error!(%phase, path = %path.display(), "build phase"),
        _ => tracing::info!(%phase, path = %path.display(), "build phase"),
    }
}

fn render_entry(entry: &SourceEntry, ctx: &RenderContext<'_>) -> Result<Document, BuildError> {
    let raw = std::fs::read_to_string(&entry.path)
        .map_err(|e| BuildError::entry(&entry.path, Operation::Read, e))?;
    let modified = std::fs::metadata(&entry.path)
        .and_then(|m| m.modified())
        .map_err(|e| BuildError::entry(&entry.path, Operation::Read, e))?;
    let mtime = DateTime::<Utc>::from(modified).fixed_offset();

    let doc = render::render_document(&raw, &entry.path, mtime, ctx)
        .map_err(|e| BuildError::entry(&entry.path, Operation::Render, e))?;
    tracing::debug!(path = %entry.rel.display(), url = %doc.path, "rendered");
    Ok(doc)
}

/// Drain a phase's results: the first error wins, later ones are logged.
fn collect<T>(
    rx: Receiver<Result<T, BuildError>>,
    mut on_ok: impl FnMut(T),
) -> Result<(), BuildError> {
    let mut first = None;
    for result in rx {
        match result {
            Ok(value) => on_ok(value),
            Err(err) if first.is_none() => first = Some(err),
            Err(err) => tracing::warn!(error = %err, "additional build error"),
        }
    }
    first.map_or(Ok(()), Err)
}

fn preflight(source_root: &Path, output_root: &Path) -> Result<(), BuildError> {
    if !source_root.is_dir() {
        return Err(BuildError::MissingSource(source_root.to_path_buf()));
    }
    let source = resolve(source_root);
    let output = resolve(output_root);
    if output.starts_with(&source) {
        return Err(BuildError::OutputInsideSource {
            output_root: output_root.to_path_buf(),
            source_root: source_root.to_path_buf(),
        });
    }
    // Cleaning an ancestor of the source root would delete the site itself.
    if source.starts_with(&output) {
        return Err(BuildError::SourceInsideOutput {
            output_root: output_root.to_path_buf(),
            source_root: source_root.to_path_buf(),
        });
    }
    Ok(())
}

/// Canonicalize the longest existing prefix of `path` and append the rest,
/// so paths that do not exist yet can still be compared.
fn resolve(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    resolved.extend(tail.iter().rev());
    resolved
}
