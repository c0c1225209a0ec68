//! Resource tree and traversal.
//!
//! The root resource is the third path source next to routes and static
//! mappings. Its backing directory is walked to enumerate paths, and at render
//! time a request path is resolved against it segment by segment.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A node in the resource tree.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Whether the node counts as present. Absent roots contribute no paths.
    fn is_present(&self) -> bool {
        true
    }

    /// Backing filesystem directory, if the node has one.
    fn abspath(&self) -> Option<&Path> {
        None
    }

    /// Look up a direct child by name.
    fn child(&self, name: &str) -> Option<Arc<dyn Resource>>;

    /// Content of a leaf node; `None` for containers.
    fn body(&self) -> io::Result<Option<Vec<u8>>>;
}

/// Result of resolving a path against a resource tree.
#[derive(Debug, Clone)]
pub struct Traversal {
    /// Deepest node reached.
    pub context: Arc<dyn Resource>,
    /// Segments left over once no further child could be found.
    pub remainder: Vec<String>,
}

impl Traversal {
    /// True when every segment resolved to a node.
    pub fn is_exact(&self) -> bool {
        self.remainder.is_empty()
    }
}

/// Resolve `relpath` (segments separated by `/`) starting at `root`.
pub fn traverse(root: &Arc<dyn Resource>, relpath: &str) -> Traversal {
    let mut context = Arc::clone(root);
    let segments: Vec<&str> = relpath.split('/').filter(|s| !s.is_empty()).collect();
    for (i, segment) in segments.iter().enumerate() {
        match context.child(segment) {
            Some(next) => context = next,
            None => {
                let remainder = segments[i..].iter().map(|s| s.to_string()).collect();
                return Traversal { context, remainder };
            }
        }
    }
    Traversal {
        context,
        remainder: Vec::new(),
    }
}

/// A resource backed by a file or directory.
#[derive(Debug, Clone)]
pub struct FsResource {
    path: PathBuf,
}

impl FsResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Resource for FsResource {
    fn is_present(&self) -> bool {
        self.path.exists()
    }

    fn abspath(&self) -> Option<&Path> {
        self.path.is_dir().then_some(self.path.as_path())
    }

    fn child(&self, name: &str) -> Option<Arc<dyn Resource>> {
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return None;
        }
        let path = self.path.join(name);
        path.exists()
            .then(|| Arc::new(FsResource::new(path)) as Arc<dyn Resource>)
    }

    fn body(&self) -> io::Result<Option<Vec<u8>>> {
        if self.path.is_file() {
            fs::read(&self.path).map(Some)
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tree() -> (TempDir, Arc<dyn Resource>) {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("blog/2024")).unwrap();
        fs::write(tmp.path().join("blog/2024/hello.html"), "hello").unwrap();
        fs::write(tmp.path().join("index.html"), "home").unwrap();
        let root: Arc<dyn Resource> = Arc::new(FsResource::new(tmp.path()));
        (tmp, root)
    }

    #[test]
    fn traverse_resolves_every_segment() {
        let (_tmp, root) = tree();
        let t = traverse(&root, "blog/2024/hello.html");
        assert!(t.is_exact());
        assert_eq!(t.context.body().unwrap().as_deref(), Some(b"hello".as_slice()));
    }

    #[test]
    fn traverse_stops_at_missing_child() {
        let (_tmp, root) = tree();
        let t = traverse(&root, "blog/missing/page");
        assert_eq!(t.remainder, ["missing", "page"]);
        assert!(t.context.body().unwrap().is_none());
    }

    #[test]
    fn traverse_empty_path_is_root() {
        let (tmp, root) = tree();
        let t = traverse(&root, "");
        assert!(t.is_exact());
        assert_eq!(t.context.abspath(), Some(tmp.path()));
    }

    #[test]
    fn child_rejects_relative_names() {
        let (_tmp, root) = tree();
        let blog = root.child("blog").unwrap();
        assert!(blog.child("..").is_none());
        assert!(blog.child(".").is_none());
    }

    #[test]
    fn missing_directory_is_not_present() {
        let tmp = TempDir::new().unwrap();
        let res = FsResource::new(tmp.path().join("nope"));
        assert!(!res.is_present());
        assert!(res.abspath().is_none());
    }
}
