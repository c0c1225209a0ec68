//! Output reconciliation.
//!
//! After every path has been rendered, the output directory is brought in line
//! with the [`WrittenSet`]: files the build did not produce are deleted, then
//! directories are removed deepest first so that a stale subtree collapses in
//! a single pass. A directory that still holds something is left alone.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::writer::WrittenSet;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Failed to remove '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// What reconciliation removed, relative to the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deleted: Vec<PathBuf>,
    pub removed_dirs: Vec<PathBuf>,
}

/// Delete stale files and empty directories under `output_root`.
pub fn reconcile(
    output_root: &Path,
    written: &WrittenSet,
) -> Result<ReconcileReport, ReconcileError> {
    let mut report = ReconcileReport::default();
    if !output_root.exists() {
        return Ok(report);
    }

    let keep = written.files();
    for rel in list_entries(output_root, false)? {
        if keep.contains(&rel.as_path()) {
            continue;
        }
        let path = output_root.join(&rel);
        info!(path = %rel.display(), "deleting");
        std::fs::remove_file(&path).map_err(|source| ReconcileError::Io { path, source })?;
        report.deleted.push(rel);
    }

    report.removed_dirs = remove_empty_dirs(output_root, list_entries(output_root, true)?)?;
    Ok(report)
}

/// Remove each of `dirs` that is empty, deepest first. A non-empty directory
/// is skipped; any other failure is fatal.
fn remove_empty_dirs(
    output_root: &Path,
    mut dirs: Vec<PathBuf>,
) -> Result<Vec<PathBuf>, ReconcileError> {
    dirs.sort_by(|a, b| b.cmp(a));
    let mut removed = Vec::new();
    for rel in dirs {
        let path = output_root.join(&rel);
        match std::fs::remove_dir(&path) {
            Ok(()) => {
                info!(path = %rel.display(), "removed directory");
                removed.push(rel);
            }
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {}
            Err(source) => return Err(ReconcileError::Io { path, source }),
        }
    }
    Ok(removed)
}

/// Directories (`dirs = true`) or everything else under `root`, relative to it.
fn list_entries(root: &Path, dirs: bool) -> Result<Vec<PathBuf>, ReconcileError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() != dirs {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(out)
}
