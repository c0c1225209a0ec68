//! Shared test utilities.
//!
//! Builds sample sites in temp directories and inspects output trees.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (tmp, site) = scenario_site();
//! site.build(&BuildOptions::default()).unwrap();
//! assert!(output_tree(&tmp.path().join("output")).contains(&"index.html".to_string()));
//! ```

use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::site::Site;

/// Content of `static/logo.png` in the scenario site.
pub const LOGO_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nlogo";

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, content: impl AsRef<[u8]>) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Populate `root` with a site serving exactly `/`, `/assets/logo.png`,
/// `/post/1` and `/post/2`.
pub fn write_scenario_site(root: &Path) {
    write_file(
        root,
        "config.toml",
        r#"
[[static]]
name = "assets"
path = "static"

[[route]]
name = "home"
pattern = "/"
template = "templates/home.html"

[[route]]
name = "post"
pattern = "/post/{id}"
body = "<h1>Post {{ id }}</h1>{{ viewlet nav }}"
matches = [{ id = "1" }, { id = "2" }]

[viewlets]
nav = "templates/nav.html"
"#,
    );
    write_file(root, "static/logo.png", LOGO_BYTES);
    write_file(
        root,
        "templates/home.html",
        r#"<a href="{{ route post id=1 }}">first</a><img src="{{ static assets logo.png }}">"#,
    );
    write_file(
        root,
        "templates/nav.html",
        r#"<nav><a href="{{ route home }}">home</a></nav>"#,
    );
}

/// The scenario site, opened from its `config.toml`.
pub fn scenario_site() -> (TempDir, Site) {
    let tmp = TempDir::new().unwrap();
    write_scenario_site(tmp.path());
    let site = Site::open(tmp.path()).unwrap();
    (tmp, site)
}

// =========================================================================
// Output inspection
// =========================================================================

/// Every entry under `root`, relative and sorted. Directories end with `/`.
pub fn output_tree(root: &Path) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .map(|e| e.unwrap())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            if e.file_type().is_dir() {
                format!("{rel}/")
            } else {
                rel
            }
        })
        .collect();
    entries.sort();
    entries
}
