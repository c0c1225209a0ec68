//! Output writer.
//!
//! Writes rendered bodies under the output directory and records every path
//! it is handed, whether or not the file actually changed. That record, the
//! [`WrittenSet`], is what reconciliation keeps; everything else under the
//! output directory is stale.
//!
//! A file whose bytes already equal the new body is left untouched, so its
//! modification time survives a rebuild with no content change. Writes are
//! not atomic: a crash mid-write can leave a partial file, which the next
//! build overwrites.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::info;

use crate::path::SitePath;

#[derive(Error, Debug)]
#[error("Failed to write '{}': {source}", path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Whether a write touched the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// One call to [`OutputWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub path: SitePath,
    pub relpath: PathBuf,
    pub outcome: WriteOutcome,
}

/// Site paths handed to the writer during one pass, with their output files.
#[derive(Debug, Clone, Default)]
pub struct WrittenSet {
    entries: BTreeMap<SitePath, PathBuf>,
}

impl WrittenSet {
    pub fn insert(&mut self, path: SitePath, relpath: PathBuf) {
        self.entries.insert(path, relpath);
    }

    /// Output files (relative to the output directory) that belong in the tree.
    pub fn files(&self) -> BTreeSet<&Path> {
        self.entries.values().map(PathBuf::as_path).collect()
    }

    pub fn contains_file(&self, relpath: &Path) -> bool {
        self.entries.values().any(|p| p == relpath)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Writes bodies under one output directory. Safe to share between workers.
#[derive(Debug)]
pub struct OutputWriter {
    root: PathBuf,
    written: Mutex<WrittenSet>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            written: Mutex::new(WrittenSet::default()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `body` to the output file of `path`, skipping identical content.
    pub fn write(&self, path: &SitePath, body: &[u8]) -> Result<WriteRecord, WriteError> {
        let relpath = path.output_relpath();
        let dest = self.root.join(&relpath);
        let io_err = |source| WriteError {
            path: dest.clone(),
            source,
        };

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let unchanged = match fs::read(&dest) {
            Ok(existing) => existing == body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(io_err(e)),
        };

        let outcome = if unchanged {
            info!(path = %relpath.display(), "skipping up to date");
            WriteOutcome::Unchanged
        } else {
            info!(path = %relpath.display(), "writing");
            fs::write(&dest, body).map_err(io_err)?;
            WriteOutcome::Written
        };

        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.clone(), relpath.clone());

        Ok(WriteRecord {
            path: path.clone(),
            relpath,
            outcome,
        })
    }

    /// Everything written so far.
    pub fn into_written(self) -> WrittenSet {
        self.written
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
