//! Exclusion patterns for the resource root walk.
//!
//! Patterns use gitignore syntax and are evaluated against paths relative to
//! the resource root: `.*` hides dotfiles at any depth, a leading `/` anchors
//! a pattern to the root, a trailing `/` matches directories only.
//!
//! [`ExclusionSet::for_site`] always adds the patterns that keep the build
//! from ingesting its own control surfaces:
//!
//! ```text
//! .*                 hidden entries
//! /config.toml*      entry configuration (and editor backups of it)
//! /site.toml         site configuration
//! /<outpath>         the output directory, when it lives under the root
//! ```

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::{ConfigError, ENTRY_FILE, SITE_CONFIG_FILE, SiteSettings};

/// Compiled, ordered exclusion patterns.
#[derive(Debug, Clone)]
pub struct ExclusionSet {
    patterns: Vec<String>,
    matcher: Gitignore,
}

impl ExclusionSet {
    /// Compile `patterns` for paths relative to `root`.
    pub fn new<I, S>(root: &Path, patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = GitignoreBuilder::new(root);
        let mut kept = Vec::new();
        for pattern in patterns {
            let pattern = pattern.into();
            builder.add_line(None, &pattern)?;
            kept.push(pattern);
        }
        Ok(Self {
            patterns: kept,
            matcher: builder.build()?,
        })
    }

    /// An empty set that excludes nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            matcher: Gitignore::empty(),
        }
    }

    /// User excludes from `[site]` plus the always-on control patterns.
    pub fn for_site(
        resource_root: &Path,
        settings: &SiteSettings,
        output_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let mut patterns: Vec<String> = settings
            .exclude_patterns()
            .into_iter()
            .map(String::from)
            .collect();
        patterns.push(".*".to_string());
        patterns.push(format!("/{ENTRY_FILE}*"));
        patterns.push(format!("/{SITE_CONFIG_FILE}"));

        let root = resolve(resource_root);
        match resolve(output_dir).strip_prefix(&root) {
            Ok(rel) if !rel.as_os_str().is_empty() => {
                let rel: Vec<String> = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                patterns.push(format!("/{}", rel.join("/")));
            }
            Ok(_) => {
                tracing::warn!(
                    root = %resource_root.display(),
                    "output directory is the resource root; not excluding it"
                );
            }
            Err(_) => {}
        }

        Self::new(resource_root, patterns)
    }

    /// Whether `relpath` (relative to the root) or any of its parents is excluded.
    pub fn is_excluded(&self, relpath: &Path, is_dir: bool) -> bool {
        if relpath.as_os_str().is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relpath, is_dir)
            .is_ignore()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

/// Absolute form of `path` with symlinks and `..` resolved. Components that
/// do not exist yet are normalized lexically.
fn resolve(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir if !resolved.exists() => {
                resolved.pop();
                continue;
            }
            other => resolved.push(other),
        }
        if let Ok(canonical) = fs::canonicalize(&resolved) {
            resolved = canonical;
        }
    }
    resolved
}
