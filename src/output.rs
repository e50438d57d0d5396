//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Collections
//!     .       3 documents
//!     blog    12 documents
//!
//! Output → build/
//!     14 pages, 2 templates, 5 minified assets, 8 copied files
//!     15 documents rendered (1 draft), 3 layouts
//!
//! Built in 0.42s
//! ```
//!
//! ## Init
//!
//! ```text
//! Created my-site/
//!     config.toml
//!     src/layout.tmpl
//!     src/hello.md
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::build::BuildReport;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// `1 page`, `2 pages`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    if !report.collections.is_empty() {
        lines.push("Collections".to_string());
        let width = report
            .collections
            .iter()
            .map(|c| c.dir.len())
            .max()
            .unwrap_or(0);
        for c in &report.collections {
            lines.push(format!(
                "{}{:<width$}    {}",
                indent(1),
                c.dir,
                count(c.documents, "document", "documents"),
            ));
        }
        lines.push(String::new());
    }

    lines.push(format!("Output → {}/", report.output_root.display()));
    lines.push(format!(
        "{}{}, {}, {}, {}",
        indent(1),
        count(report.pages, "page", "pages"),
        count(report.templates, "template", "templates"),
        count(report.minified, "minified asset", "minified assets"),
        count(report.copied, "copied file", "copied files"),
    ));
    let drafts = match report.drafts {
        0 => String::new(),
        n => format!(" ({})", count(n, "draft", "drafts")),
    };
    lines.push(format!(
        "{}{} rendered{drafts}, {}",
        indent(1),
        count(report.documents, "document", "documents"),
        count(report.layouts, "layout", "layouts"),
    ));
    lines.push(String::new());
    lines.push(format!("Built in {:.2}s", report.elapsed.as_secs_f64()));
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{line}");
    }
}

// ============================================================================
// Init
// ============================================================================

/// Files created by `init`, relative to the new site root.
pub fn format_init_output(root: &Path, files: &[&str]) -> Vec<String> {
    let mut lines = vec![format!("Created {}/", root.display())];
    lines.extend(files.iter().map(|f| format!("{}{f}", indent(1))));
    lines
}

pub fn print_init_output(root: &Path, files: &[&str]) {
    for line in format_init_output(root, files) {
        println!("{line}");
    }
}
