//! Render dispatch: requests, responses and the dispatcher boundary.
//!
//! The build hands each path to a [`Dispatcher`] wrapped in a fresh
//! [`Request`]. The request carries everything a render may need (the path,
//! the immutable [`BuildContext`], helpers for relative URLs and viewlets)
//! plus per-render mutable state, so it is built per path, never shared
//! between threads, and dropped as soon as the render returns.

use std::cell::Cell;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::path::SitePath;
use crate::route::{Params, RouteError, SUBPATH_PARAM};
use crate::site::BuildContext;

/// Viewlets may include viewlets, up to this depth.
pub const MAX_VIEWLET_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Not found: {0}")]
    NotFound(SitePath),
    #[error("IO error reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Template '{template}': {message}")]
    Template { template: String, message: String },
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("Unknown viewlet '{0}'")]
    UnknownViewlet(String),
    #[error("Viewlet '{0}' nested too deeply")]
    ViewletRecursion(String),
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Rendered output for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self { body: body.into() }
    }
}

impl From<String> for Response {
    fn from(body: String) -> Self {
        Self::new(body)
    }
}

impl From<Vec<u8>> for Response {
    fn from(body: Vec<u8>) -> Self {
        Self::new(body)
    }
}

/// Turns a request into bytes.
pub trait Dispatcher: Send + Sync {
    fn render(&self, request: &Request<'_>) -> Result<Response, DispatchError>;
}

impl<F> Dispatcher for F
where
    F: Fn(&Request<'_>) -> Result<Response, DispatchError> + Send + Sync,
{
    fn render(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
        self(request)
    }
}

/// Context for rendering a single path.
pub struct Request<'a> {
    path: SitePath,
    context: &'a BuildContext,
    viewlet_depth: Cell<usize>,
}

impl<'a> Request<'a> {
    pub fn new(path: SitePath, context: &'a BuildContext) -> Self {
        Self {
            path,
            context,
            viewlet_depth: Cell::new(0),
        }
    }

    pub fn path(&self) -> &SitePath {
        &self.path
    }

    pub fn context(&self) -> &'a BuildContext {
        self.context
    }

    /// Path of a named route, relative to this request's directory.
    pub fn relative_route_path(&self, name: &str, params: &Params) -> Result<String, DispatchError> {
        let target = self.context.routes().route_path(name, params)?;
        Ok(target.relative_from(&self.path))
    }

    /// Path of a file served by the static mapping `name`, relative to this
    /// request's directory.
    pub fn static_path(&self, name: &str, subpath: &str) -> Result<String, DispatchError> {
        let params = Params::from([(SUBPATH_PARAM.to_string(), subpath.to_string())]);
        self.relative_route_path(name, &params)
    }

    /// Render a registered viewlet in the scope of this request.
    pub fn viewlet(&self, name: &str) -> Result<String, DispatchError> {
        let depth = self.viewlet_depth.get();
        if depth >= MAX_VIEWLET_DEPTH {
            return Err(DispatchError::ViewletRecursion(name.to_string()));
        }
        self.viewlet_depth.set(depth + 1);
        let result = self.context.viewlets().render(name, self);
        self.viewlet_depth.set(depth);
        result
    }
}
