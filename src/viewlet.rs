//! Viewlets: named page fragments.
//!
//! Templates pull shared fragments (navigation, sidebars, footers) out of the
//! registry by name with `{{ viewlet NAME }}`. A viewlet renders against the
//! current [`Request`], so relative links inside it resolve from the page that
//! includes it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::dispatch::{DispatchError, Request};
use crate::route::Params;
use crate::template;

pub trait Viewlet: Send + Sync {
    fn render(&self, request: &Request<'_>) -> Result<String, DispatchError>;
}

impl<F> Viewlet for F
where
    F: Fn(&Request<'_>) -> Result<String, DispatchError> + Send + Sync,
{
    fn render(&self, request: &Request<'_>) -> Result<String, DispatchError> {
        self(request)
    }
}

/// Renders a template file with no parameters.
#[derive(Debug, Clone)]
pub struct TemplateViewlet {
    path: PathBuf,
}

impl TemplateViewlet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Viewlet for TemplateViewlet {
    fn render(&self, request: &Request<'_>) -> Result<String, DispatchError> {
        let source = std::fs::read_to_string(&self.path).map_err(|source| DispatchError::Io {
            path: self.path.clone(),
            source,
        })?;
        template::render(
            &self.path.to_string_lossy(),
            &source,
            &Params::new(),
            request,
        )
    }
}

#[derive(Clone, Default)]
pub struct ViewletRegistry {
    viewlets: HashMap<String, Arc<dyn Viewlet>>,
}

impl ViewletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `viewlet` under `name`, replacing any previous one.
    pub fn add(&mut self, name: impl Into<String>, viewlet: impl Viewlet + 'static) {
        self.viewlets.insert(name.into(), Arc::new(viewlet));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.viewlets.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.viewlets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewlets.is_empty()
    }

    pub fn render(&self, name: &str, request: &Request<'_>) -> Result<String, DispatchError> {
        let viewlet = self
            .viewlets
            .get(name)
            .ok_or_else(|| DispatchError::UnknownViewlet(name.to_string()))?;
        viewlet.render(request)
    }
}
