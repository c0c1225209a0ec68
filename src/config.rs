//! Site configuration module.
//!
//! A site root carries two configuration files:
//!
//! ```text
//! mysite/
//! ├── config.toml      # Entry configuration: routes, static assets, viewlets (required)
//! ├── site.toml        # Site configuration: output path, excludes (optional)
//! ├── content/         # Resource root, frozen by traversal
//! ├── static/          # Static asset directory
//! └── templates/
//! ```
//!
//! ## Entry Configuration (`config.toml`)
//!
//! Declares what the site can serve. Its absence is a fatal configuration
//! error raised before any enumeration or output I/O happens.
//!
//! ```toml
//! root = "content"                 # Resource root (optional)
//!
//! [[static]]
//! name = "assets"                  # URL prefix and route name
//! path = "static"                  # Directory relative to the site root
//!
//! [[route]]
//! name = "post"
//! pattern = "/post/{id}"
//! template = "templates/post.html" # Or: body = "inline template"
//! matches = { dir = "posts", param = "id" }
//!
//! [viewlets]
//! sidebar = "templates/sidebar.html"
//! ```
//!
//! ## Site Configuration (`site.toml`)
//!
//! ```toml
//! [site]
//! outpath = "output"   # Output directory, relative to the site root
//! excludes = """
//! drafts/
//! *.bak
//! """
//! jobs = 4             # Parallel render workers (omit for sequential)
//! ```
//!
//! Sections other than `[site]` are kept as free-form tables so hooks and
//! custom dispatchers can read their own settings. Unknown keys inside
//! `[site]` are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::route::RoutePattern;

/// Entry configuration filename, resolved at the site root.
pub const ENTRY_FILE: &str = "config.toml";

/// Site configuration filename, resolved at the site root.
pub const SITE_CONFIG_FILE: &str = "site.toml";

/// Output directory used when `site.outpath` is not set.
pub const DEFAULT_OUTPATH: &str = "output";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("No config.toml found at '{}'", .0.display())]
    MissingEntry(PathBuf),
    #[error("Invalid exclusion pattern: {0}")]
    Exclude(#[from] ignore::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Route(#[from] crate::route::RouteError),
}

// =============================================================================
// Site configuration (site.toml)
// =============================================================================

/// Site configuration loaded from `site.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Settings consumed by the build itself.
    pub site: SiteSettings,
    /// Every other section, untouched.
    #[serde(flatten)]
    pub sections: BTreeMap<String, toml::Table>,
}

/// The `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    /// Output directory. Relative paths resolve against the site root.
    pub outpath: String,
    /// Newline-separated gitignore-style exclusion patterns.
    pub excludes: String,
    /// Parallel render workers. When absent the build is sequential.
    pub jobs: Option<usize>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            outpath: DEFAULT_OUTPATH.to_string(),
            excludes: String::new(),
            jobs: None,
        }
    }
}

impl SiteSettings {
    /// Exclusion patterns, one per non-empty, non-comment line.
    pub fn exclude_patterns(&self) -> Vec<&str> {
        self.excludes
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect()
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.site.outpath.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site.outpath must not be empty".into(),
            ));
        }
        if self.site.jobs == Some(0) {
            return Err(ConfigError::Validation(
                "site.jobs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the output directory against the site root.
    pub fn output_dir(&self, site_root: &Path) -> PathBuf {
        site_root.join(&self.site.outpath)
    }
}

/// Produces the site configuration for a build.
///
/// The default reads `site.toml`; embedding applications can supply their own
/// through [`SiteBuilder::config_factory`](crate::site::SiteBuilder::config_factory).
pub trait ConfigFactory: Send + Sync {
    fn load(&self, site_root: &Path) -> Result<SiteConfig, ConfigError>;
}

/// Loads `site.toml` from the site root.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlConfigFactory;

impl ConfigFactory for TomlConfigFactory {
    fn load(&self, site_root: &Path) -> Result<SiteConfig, ConfigError> {
        load_site_config(site_root)
    }
}

/// Load `site.toml` from the site root.
///
/// A missing file yields the defaults. A file that exists but fails to parse
/// or validate is an error.
pub fn load_site_config(site_root: &Path) -> Result<SiteConfig, ConfigError> {
    let path = site_root.join(SITE_CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no site config, using defaults");
        return Ok(SiteConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: SiteConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Resolve the effective worker count.
///
/// - `None` → sequential (1)
/// - `Some(n)` → `min(n, cores)` (user can constrain down, not up)
pub fn effective_jobs(requested: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    requested.map(|n| n.clamp(1, cores)).unwrap_or(1)
}

// =============================================================================
// Entry configuration (config.toml)
// =============================================================================

/// Entry configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntryConfig {
    /// Resource root directory, relative to the site root.
    pub root: Option<String>,
    /// Static asset mappings.
    #[serde(rename = "static")]
    pub statics: Vec<StaticEntry>,
    /// Routes, in match priority order.
    #[serde(rename = "route")]
    pub routes: Vec<RouteEntry>,
    /// Viewlet name → template path.
    pub viewlets: BTreeMap<String, String>,
}

/// A `[[static]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticEntry {
    pub name: String,
    pub path: String,
}

/// A `[[route]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteEntry {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub matches: Option<MatchesEntry>,
}

/// Where a dynamic route's parameter sets come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchesEntry {
    /// Inline list of parameter tables.
    List(Vec<BTreeMap<String, String>>),
    /// One match per file in a directory, keyed by file stem.
    Dir { dir: String, param: String },
    /// A JSON file holding an array of parameter objects.
    Data { data: String },
}

impl EntryConfig {
    /// Check route and static names, template sources and patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for entry in &self.statics {
            if entry.name.is_empty() || entry.name.contains('/') {
                return Err(ConfigError::Validation(format!(
                    "static name '{}' must be a single non-empty path segment",
                    entry.name
                )));
            }
            if !names.insert(entry.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate route name '{}'",
                    entry.name
                )));
            }
        }
        for route in &self.routes {
            if !names.insert(route.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate route name '{}'",
                    route.name
                )));
            }
            if route.template.is_some() == route.body.is_some() {
                return Err(ConfigError::Validation(format!(
                    "route '{}' needs exactly one of `template` or `body`",
                    route.name
                )));
            }
            let pattern = RoutePattern::parse(&route.pattern).map_err(|e| {
                ConfigError::Validation(format!("route '{}': {e}", route.name))
            })?;
            if let Some(MatchesEntry::Dir { param, .. }) = &route.matches
                && !pattern.param_names().any(|name| name == param.as_str())
            {
                return Err(ConfigError::Validation(format!(
                    "route '{}': pattern '{}' has no parameter '{param}'",
                    route.name, route.pattern
                )));
            }
        }
        Ok(())
    }
}

/// Load and validate `config.toml` from the site root.
pub fn load_entry_config(site_root: &Path) -> Result<EntryConfig, ConfigError> {
    let path = site_root.join(ENTRY_FILE);
    if !path.exists() {
        return Err(ConfigError::MissingEntry(site_root.to_path_buf()));
    }
    let content = fs::read_to_string(&path)?;
    let config: EntryConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_entry_toml() -> &'static str {
    r##"# Stasis entry configuration
# ==========================
# Declares everything the site can serve. This file must exist at the
# site root; the build refuses to start without it.

# Resource root. Every file under this directory (minus excludes) is
# frozen at the same relative path. Omit to disable traversal.
root = "content"

# ---------------------------------------------------------------------------
# Static assets: every file under `path` is served at /<name>/<subpath>
# ---------------------------------------------------------------------------
[[static]]
name = "assets"
path = "static"

# ---------------------------------------------------------------------------
# Routes, matched in order. Exactly one of `template` or `body`.
# ---------------------------------------------------------------------------
[[route]]
name = "home"
pattern = "/"
template = "templates/home.html"

# A dynamic route. `matches` enumerates its parameter sets:
#   matches = { dir = "posts", param = "id" }   one per file stem in posts/
#   matches = [{ id = "1" }, { id = "2" }]      explicit list
#   matches = { data = "posts.json" }           JSON array of objects
[[route]]
name = "post"
pattern = "/post/{id}"
template = "templates/post.html"
matches = { dir = "posts", param = "id" }

# ---------------------------------------------------------------------------
# Viewlets: named fragments usable as {{ viewlet NAME }} in templates
# ---------------------------------------------------------------------------
[viewlets]
# sidebar = "templates/sidebar.html"
"##
}

/// Returns a fully-commented stock `site.toml`.
pub fn stock_site_toml() -> &'static str {
    r##"# Stasis site configuration
# =========================
# Optional. Values shown below are the defaults.

[site]
# Output directory, relative to the site root. It is reconciled on every
# build: files not produced by the build are deleted.
outpath = "output"

# Gitignore-style patterns, one per line, hidden from the resource root.
# Dotfiles, config.toml, site.toml and the output directory are always
# excluded.
excludes = ""

# Parallel render workers. Omit for a sequential build.
# jobs = 4
"##
}
