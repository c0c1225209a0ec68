//! Built-in dispatcher.
//!
//! [`Router`] resolves a request the way a live site would:
//!
//! 1. The first route whose pattern matches the path, in registration order,
//!    renders it through the [`View`] registered under the route's name.
//! 2. Otherwise the path is traversed against the root resource. A file is
//!    served as-is, a directory serves its `index.html`.
//! 3. Anything else is [`DispatchError::NotFound`].
//!
//! A matched route without a view falls through to step 2, so a custom route
//! table can coexist with traversal.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::dispatch::{DispatchError, Dispatcher, Request, Response};
use crate::path::INDEX_FILE;
use crate::resource::traverse;
use crate::route::{DirMatches, Params, SUBPATH_PARAM};
use crate::template;

/// Renders the paths of one route.
pub trait View: Send + Sync {
    fn render(&self, request: &Request<'_>, params: &Params) -> Result<Vec<u8>, DispatchError>;
}

#[derive(Clone, Default)]
pub struct Router {
    views: HashMap<String, Arc<dyn View>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `view` to the route named `route`.
    pub fn add_view(&mut self, route: impl Into<String>, view: impl View + 'static) {
        self.views.insert(route.into(), Arc::new(view));
    }
}

impl Dispatcher for Router {
    fn render(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        if let Some((route, params)) = request.context().routes().match_path(request.path())
            && let Some(view) = self.views.get(route.name())
        {
            debug!(path = %request.path(), route = route.name(), "dispatching to route");
            return view.render(request, &params).map(Response::new);
        }
        serve_resource(request)
    }
}

fn serve_resource(request: &Request<'_>) -> Result<Response, DispatchError> {
    let not_found = || DispatchError::NotFound(request.path().clone());
    let root = request.context().root().ok_or_else(not_found)?;

    let traversal = traverse(root, request.path().as_str());
    if !traversal.is_exact() {
        return Err(not_found());
    }
    let io_err = |source| DispatchError::Io {
        path: PathBuf::from(request.path().as_str()),
        source,
    };

    if let Some(body) = traversal.context.body().map_err(io_err)? {
        return Ok(Response::new(body));
    }
    let index = traversal.context.child(INDEX_FILE).ok_or_else(not_found)?;
    index
        .body()
        .map_err(io_err)?
        .map(Response::new)
        .ok_or_else(not_found)
}

// =============================================================================
// Views
// =============================================================================

/// Serves files of a static mapping, keyed by the `subpath` parameter.
#[derive(Debug, Clone)]
pub struct StaticFileView {
    directory: PathBuf,
}

impl StaticFileView {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl View for StaticFileView {
    fn render(&self, request: &Request<'_>, params: &Params) -> Result<Vec<u8>, DispatchError> {
        let subpath = params
            .get(SUBPATH_PARAM)
            .ok_or_else(|| DispatchError::NotFound(request.path().clone()))?;
        let path = self.directory.join(subpath);
        fs::read(&path).map_err(|source| DispatchError::Io { path, source })
    }
}

/// Where a template's text comes from.
#[derive(Debug, Clone)]
pub enum TemplateSource {
    File(PathBuf),
    Inline(String),
}

/// Renders a template with the route's parameters.
#[derive(Debug, Clone)]
pub struct TemplateView {
    source: TemplateSource,
    content: Option<DirMatches>,
}

impl TemplateView {
    pub fn new(source: TemplateSource) -> Self {
        Self {
            source,
            content: None,
        }
    }

    /// Expose the file in `dir` whose stem equals parameter `param` as
    /// `{{ content }}`. Markdown files are rendered to HTML.
    pub fn with_content_dir(mut self, dir: impl Into<PathBuf>, param: impl Into<String>) -> Self {
        self.content = Some(DirMatches {
            dir: dir.into(),
            param: param.into(),
        });
        self
    }

    fn load(&self) -> Result<(String, String), DispatchError> {
        match &self.source {
            TemplateSource::File(path) => {
                let text = fs::read_to_string(path).map_err(|source| DispatchError::Io {
                    path: path.clone(),
                    source,
                })?;
                Ok((path.to_string_lossy().into_owned(), text))
            }
            TemplateSource::Inline(text) => Ok(("<inline>".to_string(), text.clone())),
        }
    }

    fn content(&self, request: &Request<'_>, params: &Params) -> Result<Option<String>, DispatchError> {
        let Some(content) = &self.content else {
            return Ok(None);
        };
        let Some(stem) = params.get(&content.param) else {
            return Ok(None);
        };
        let io_err = |source| DispatchError::Io {
            path: content.dir.clone(),
            source,
        };
        let file = DirMatches::source_for(&content.dir, stem)
            .map_err(io_err)?
            .ok_or_else(|| DispatchError::NotFound(request.path().clone()))?;
        let text = fs::read_to_string(&file).map_err(|source| DispatchError::Io {
            path: file.clone(),
            source,
        })?;
        if file.extension().is_some_and(|ext| ext == "md") {
            Ok(Some(template::markdown_to_html(&text)))
        } else {
            Ok(Some(text))
        }
    }
}

impl View for TemplateView {
    fn render(&self, request: &Request<'_>, params: &Params) -> Result<Vec<u8>, DispatchError> {
        let (name, source) = self.load()?;
        let mut vars = params.clone();
        if let Some(content) = self.content(request, params)? {
            vars.insert("content".to_string(), content);
        }
        template::render(&name, &source, &vars, request).map(String::into_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::SitePath;
    use crate::resource::FsResource;
    use crate::route::{Route, RoutePattern};
    use crate::site::{BuildOptions, SiteBuilder};
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn render(site: &crate::site::Site, path: &str) -> Result<Vec<u8>, DispatchError> {
        let ctx = site.context(&BuildOptions::default()).unwrap();
        let request = Request::new(SitePath::parse(path).unwrap(), &ctx);
        site.dispatcher().render(&request).map(|r| r.body)
    }

    #[test]
    fn traversal_serves_files_and_directory_index() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "content/about.html", "about");
        write_file(tmp.path(), "content/docs/index.html", "docs");
        let site = SiteBuilder::new(tmp.path())
            .root_resource(FsResource::new(tmp.path().join("content")))
            .finish();

        assert_eq!(render(&site, "/about.html").unwrap(), b"about");
        assert_eq!(render(&site, "/docs/").unwrap(), b"docs");
        assert!(matches!(
            render(&site, "/missing.html"),
            Err(DispatchError::NotFound(_))
        ));
    }

    #[test]
    fn directory_without_index_is_not_found() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "content/empty/readme.txt", "x");
        let site = SiteBuilder::new(tmp.path())
            .root_resource(FsResource::new(tmp.path().join("content")))
            .finish();
        assert!(matches!(
            render(&site, "/empty/"),
            Err(DispatchError::NotFound(_))
        ));
    }

    #[test]
    fn no_root_and_no_route_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let site = SiteBuilder::new(tmp.path()).finish();
        assert!(matches!(render(&site, "/"), Err(DispatchError::NotFound(_))));
    }

    #[test]
    fn route_without_view_falls_through_to_traversal() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "content/feed.xml", "<feed/>");
        let site = SiteBuilder::new(tmp.path())
            .root_resource(FsResource::new(tmp.path().join("content")))
            .register_route(Route::new("feed", RoutePattern::parse("/feed.xml").unwrap()))
            .unwrap()
            .finish();
        assert_eq!(render(&site, "/feed.xml").unwrap(), b"<feed/>");
    }

    #[test]
    fn first_matching_route_wins() {
        let tmp = TempDir::new().unwrap();
        let site = SiteBuilder::new(tmp.path())
            .add_route(
                Route::new("latest", RoutePattern::parse("/post/latest").unwrap()),
                TemplateView::new(TemplateSource::Inline("latest".into())),
            )
            .unwrap()
            .add_route(
                Route::new("post", RoutePattern::parse("/post/{id}").unwrap()),
                TemplateView::new(TemplateSource::Inline("post {{ id }}".into())),
            )
            .unwrap()
            .finish();
        assert_eq!(render(&site, "/post/latest").unwrap(), b"latest");
        assert_eq!(render(&site, "/post/7").unwrap(), b"post 7");
    }

    #[test]
    fn static_view_serves_mapped_files() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "static/css/site.css", "body{}");
        let site = SiteBuilder::new(tmp.path())
            .add_static_view("assets", tmp.path().join("static"))
            .unwrap()
            .finish();
        assert_eq!(render(&site, "/assets/css/site.css").unwrap(), b"body{}");
        assert!(matches!(
            render(&site, "/assets/missing.css"),
            Err(DispatchError::Io { .. })
        ));
    }

    #[test]
    fn template_view_renders_markdown_content() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "posts/hello.md", "# Hello");
        write_file(tmp.path(), "posts/plain.txt", "just text");
        let view = TemplateView::new(TemplateSource::Inline("<main>{{ content }}</main>".into()))
            .with_content_dir(tmp.path().join("posts"), "id");
        let site = SiteBuilder::new(tmp.path())
            .add_route(
                Route::new("post", RoutePattern::parse("/post/{id}").unwrap()),
                view,
            )
            .unwrap()
            .finish();

        let html = String::from_utf8(render(&site, "/post/hello").unwrap()).unwrap();
        assert!(html.starts_with("<main><h1>Hello</h1>"));
        assert_eq!(render(&site, "/post/plain").unwrap(), b"<main>just text</main>");
        assert!(matches!(
            render(&site, "/post/nope"),
            Err(DispatchError::NotFound(_))
        ));
    }

    #[test]
    fn template_file_errors_name_the_file() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "templates/bad.html", "{{ missing }}");
        let site = SiteBuilder::new(tmp.path())
            .add_route(
                Route::new("home", RoutePattern::parse("/").unwrap()),
                TemplateView::new(TemplateSource::File(tmp.path().join("templates/bad.html"))),
            )
            .unwrap()
            .finish();
        let err = render(&site, "/").unwrap_err();
        assert!(matches!(err, DispatchError::Template { template, .. } if template.ends_with("bad.html")));
    }
}
