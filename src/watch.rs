//! Watch the site and rebuild on change.
//!
//! ```text
//! notify events ──▶ Debouncer (300ms) ──▶ reload config.toml ──▶ full build
//! ```
//!
//! Every change triggers a complete build with a freshly loaded config, so
//! edits to `config.toml` apply without a restart. A failed build is logged
//! and the loop keeps watching.

use crate::build::Build;
use crate::config::{self, CONFIG_FILENAME, SiteConfig};
use crate::macros::MacroTable;
use crate::output;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use thiserror::Error;

const DEBOUNCE_MS: u64 = 300;
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("watch: {0}")]
    Notify(#[from] notify::Error),
}

/// Editor swap files and backups never trigger a rebuild.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Collects changed paths until events stop arriving for a while.
struct Debouncer {
    pending: HashSet<PathBuf>,
    last_event: Option<Instant>,
    window: Duration,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            last_event: None,
            window,
        }
    }

    fn add(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        let before = self.pending.len();
        self.pending
            .extend(paths.into_iter().filter(|p| !is_temp_file(p)));
        if self.pending.len() > before {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.window)
    }

    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            IDLE_TIMEOUT
        } else {
            self.window
        }
    }
}

/// Rebuild `site_root` from scratch. Errors are logged, never returned.
pub fn rebuild(site_root: &Path, macros: &MacroTable) -> bool {
    let config = match config::load_config(site_root) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "config error, skipping rebuild");
            return false;
        }
    };
    match Build::new(site_root, config).with_macros(macros.clone()).run() {
        Ok(report) => {
            output::print_build_report(&report);
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "rebuild failed");
            false
        }
    }
}

/// Block forever, rebuilding whenever the source root or the config file
/// changes.
pub fn watch_blocking(
    site_root: &Path,
    config: &SiteConfig,
    macros: &MacroTable,
) -> Result<(), WatchError> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx)?;

    let source_root = site_root.join(&config.source);
    watcher.watch(&source_root, RecursiveMode::Recursive)?;
    let config_path = site_root.join(CONFIG_FILENAME);
    if config_path.exists() {
        watcher.watch(&config_path, RecursiveMode::NonRecursive)?;
    }
    tracing::info!(source = %source_root.display(), "watching for changes");

    let mut debouncer = Debouncer::new(Duration::from_millis(DEBOUNCE_MS));
    loop {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event.paths),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "watch error"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                let changed = debouncer.take();
                tracing::info!(
                    changed = changed.len(),
                    first = %changed[0].display(),
                    "change detected, rebuilding"
                );
                rebuild(site_root, macros);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    Ok(())
}
