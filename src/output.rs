//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! / → index.html (written)
//! /assets/logo.png → assets/logo.png (unchanged)
//! /post/1 → post/1 (written)
//! Deleted old/page.html
//! Removed old/
//!
//! 3 paths: 2 written, 1 unchanged, 1 deleted, 1 directory removed
//! ```
//!
//! ## Paths
//!
//! ```text
//! / → index.html
//! /post/1 → post/1
//! ```
//!
//! ## Check
//!
//! ```text
//! Routes: 3
//! Static mappings: 1
//! Paths: 4
//! Output: site/output
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use std::collections::BTreeSet;
use std::path::Path;

use crate::path::SitePath;
use crate::site::{BuildContext, BuildReport};

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// `/post/1 → post/1`
fn path_line(path: &SitePath) -> String {
    format!(
        "{} → {}",
        path,
        path.output_relpath().to_string_lossy().replace('\\', "/")
    )
}

fn display_rel(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let written: BTreeSet<&SitePath> = report.written.iter().collect();
    let mut lines: Vec<String> = report
        .paths
        .iter()
        .map(|path| {
            let status = if written.contains(path) {
                "written"
            } else {
                "unchanged"
            };
            format!("{} ({status})", path_line(path))
        })
        .collect();

    lines.extend(
        report
            .deleted
            .iter()
            .map(|p| format!("Deleted {}", display_rel(p))),
    );
    lines.extend(
        report
            .removed_dirs
            .iter()
            .map(|p| format!("Removed {}/", display_rel(p))),
    );

    lines.push(String::new());
    lines.push(format!(
        "{}: {} written, {} unchanged, {} deleted, {} removed",
        plural(report.paths.len(), "path", "paths"),
        report.written.len(),
        report.unchanged.len(),
        report.deleted.len(),
        plural(report.removed_dirs.len(), "directory", "directories"),
    ));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Paths
// ============================================================================

pub fn format_paths_output(paths: &[SitePath]) -> Vec<String> {
    paths.iter().map(path_line).collect()
}

/// The path list as a JSON array of strings.
pub fn format_paths_json(paths: &[SitePath]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(paths)
}

pub fn print_paths_output(paths: &[SitePath]) {
    for line in format_paths_output(paths) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_output(ctx: &BuildContext, paths: &[SitePath]) -> Vec<String> {
    let mut lines = vec![
        format!("Routes: {}", ctx.routes().len()),
        format!("Static mappings: {}", ctx.static_mappings().len()),
        format!("Viewlets: {}", ctx.viewlets().len()),
    ];
    if let Some(dir) = ctx.root().and_then(|r| r.abspath()) {
        lines.push(format!("Resource root: {}", dir.display()));
        for pattern in ctx.excludes().patterns() {
            lines.push(format!("    exclude {pattern}"));
        }
    }
    lines.push(format!("Paths: {}", paths.len()));
    lines.push(format!("Output: {}", ctx.output_dir().display()));
    lines
}

pub fn print_check_output(ctx: &BuildContext, paths: &[SitePath]) {
    for line in format_check_output(ctx, paths) {
        println!("{}", line);
    }
}
