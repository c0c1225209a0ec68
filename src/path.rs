//! Site paths: the key identifying one output artifact.
//!
//! A [`SitePath`] is an absolute, URL-style path such as `/post/1` or
//! `/assets/logo.png`. Every source the enumerator draws from produces these,
//! the dispatcher renders them, and the writer maps them 1:1 onto files under
//! the output directory:
//!
//! ```text
//! /                  →  index.html
//! /post/1            →  post/1
//! /assets/logo.png   →  assets/logo.png
//! /blog/             →  blog/index.html
//! ```
//!
//! Paths ending in `/` (including the root) are directory-style and render to
//! an `index.html` inside that directory, so the root page is a regular file.
//!
//! Construction normalizes duplicate slashes and rejects `.` and `..`
//! segments. A site path can therefore never name a file outside the output
//! directory.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// File written for directory-style paths.
pub const INDEX_FILE: &str = "index.html";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid site path '{path}': {reason}")]
pub struct PathError {
    pub path: String,
    pub reason: &'static str,
}

/// A normalized absolute site path. Ordering is plain string ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SitePath(String);

impl SitePath {
    /// Parse and normalize a path. A missing leading `/` is added.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        let invalid = |reason| PathError {
            path: raw.to_string(),
            reason,
        };
        if raw.contains('\0') {
            return Err(invalid("contains a NUL byte"));
        }
        if raw.contains('\\') {
            return Err(invalid("contains a backslash"));
        }

        let segments: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        if segments.iter().any(|s| *s == "." || *s == "..") {
            return Err(invalid("contains a relative segment"));
        }

        let mut normalized = String::with_capacity(raw.len() + 1);
        normalized.push('/');
        normalized.push_str(&segments.join("/"));
        if !segments.is_empty() && raw.ends_with('/') {
            normalized.push('/');
        }
        Ok(Self(normalized))
    }

    /// The site root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty path segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// True for `/` and for paths ending in `/`.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Path of the output file relative to the output directory.
    pub fn output_relpath(&self) -> PathBuf {
        let mut rel: PathBuf = self.segments().collect();
        if self.is_directory() {
            rel.push(INDEX_FILE);
        }
        rel
    }

    /// Express `self` relative to the directory containing `from`.
    ///
    /// Mirrors `relpath(target, dirname(from))`: the request `/post/1` lives
    /// in `/post`, so `/assets/logo.png` becomes `../assets/logo.png`.
    /// Directory-style targets keep their trailing slash.
    pub fn relative_from(&self, from: &SitePath) -> String {
        let mut base: Vec<&str> = from.segments().collect();
        if !from.is_directory() {
            base.pop();
        }
        let target: Vec<&str> = self.segments().collect();

        let common = base
            .iter()
            .zip(target.iter())
            .take_while(|(a, b)| a == b)
            .count();

        let mut parts: Vec<&str> = Vec::new();
        parts.extend(std::iter::repeat_n("..", base.len() - common));
        parts.extend(&target[common..]);

        let mut rel = if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        };
        if self.is_directory() {
            rel.push('/');
        }
        rel
    }
}

impl fmt::Display for SitePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SitePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn p(s: &str) -> SitePath {
        SitePath::parse(s).unwrap()
    }

    #[test]
    fn parse_adds_leading_slash_and_collapses_runs() {
        assert_eq!(p("post/1").as_str(), "/post/1");
        assert_eq!(p("//a///b").as_str(), "/a/b");
        assert_eq!(p("").as_str(), "/");
        assert_eq!(p("/blog/").as_str(), "/blog/");
    }

    #[test]
    fn parse_rejects_escaping_segments() {
        assert!(SitePath::parse("/a/../b").is_err());
        assert!(SitePath::parse("/./a").is_err());
        assert!(SitePath::parse("/a\\b").is_err());
    }

    #[test]
    fn output_relpath_strips_leading_slash() {
        assert_eq!(p("/post/1").output_relpath(), Path::new("post/1"));
        assert_eq!(
            p("/assets/img/logo.png").output_relpath(),
            Path::new("assets/img/logo.png")
        );
    }

    #[test]
    fn directory_paths_write_index_file() {
        assert_eq!(SitePath::root().output_relpath(), Path::new("index.html"));
        assert_eq!(p("/blog/").output_relpath(), Path::new("blog/index.html"));
    }

    #[test]
    fn relative_from_walks_up_from_request_directory() {
        let logo = p("/assets/logo.png");
        assert_eq!(logo.relative_from(&p("/post/1")), "../assets/logo.png");
        assert_eq!(logo.relative_from(&SitePath::root()), "assets/logo.png");
        assert_eq!(p("/post/2").relative_from(&p("/post/1")), "2");
        assert_eq!(p("/post/").relative_from(&p("/post/1")), "./");
        assert_eq!(
            p("/a/b").relative_from(&p("/x/y/")),
            "../../a/b"
        );
    }

    #[test]
    fn ordering_is_string_ordering() {
        let mut paths = vec![p("/post/2"), p("/"), p("/assets/logo.png"), p("/post/1")];
        paths.sort();
        let strs: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
        assert_eq!(strs, ["/", "/assets/logo.png", "/post/1", "/post/2"]);
    }
}
