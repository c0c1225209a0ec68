//! Route table: patterns, parameter sets, and static asset mappings.
//!
//! A route pairs a name with a [`RoutePattern`] and a [`Matches`] capability:
//!
//! - [`Matches::Static`] routes have no parameters and contribute exactly one
//!   path, generated from an empty parameter set.
//! - [`Matches::Dynamic`] routes own a [`MatchFactory`] that enumerates every
//!   parameter set the route can bind (one per blog post, one per tag, ...).
//!
//! ## Pattern Syntax
//!
//! ```text
//! /                    the root
//! /about/              literal segments, trailing slash kept
//! /post/{id}           {name} binds exactly one segment
//! /assets/*subpath     *name binds the remainder, slashes included (last only)
//! ```
//!
//! Static asset mappings register a route `/<name>/*subpath`, so asset URLs
//! are generated by the same machinery as every other route.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::path::{PathError, SitePath};

/// Parameter binding for one concrete path of a route.
pub type Params = BTreeMap<String, String>;

/// Parameter bound by static asset routes.
pub const SUBPATH_PARAM: &str = "subpath";

#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Invalid route pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("Route '{pattern}' needs parameter '{param}'")]
    MissingParam { pattern: String, param: String },
    #[error("Parameter '{param}' cannot be '{value}'")]
    InvalidParam { param: String, value: String },
    #[error("Unknown route '{0}'")]
    UnknownRoute(String),
    #[error("Duplicate route '{0}'")]
    DuplicateRoute(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("IO error reading '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid match data: {0}")]
    Invalid(String),
}

// =============================================================================
// Patterns
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    Remainder(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix('*') {
                if i + 1 != parts.len() {
                    return Err(invalid("*remainder must be the last segment"));
                }
                Segment::Remainder(name.to_string())
            } else if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Segment::Param(name.to_string())
            } else if part.contains(['{', '}', '*']) {
                return Err(invalid("placeholders must span a whole segment"));
            } else {
                Segment::Literal(part.to_string())
            };
            if let Segment::Param(name) | Segment::Remainder(name) = &segment
                && (name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_'))
            {
                return Err(invalid("parameter names must be non-empty identifiers"));
            }
            if let Segment::Literal(lit) = &segment
                && (lit == "." || lit == "..")
            {
                return Err(invalid("relative segments are not allowed"));
            }
            segments.push(segment);
        }

        let has_remainder = matches!(segments.last(), Some(Segment::Remainder(_)));
        let trailing_slash = !segments.is_empty() && raw.ends_with('/');
        if has_remainder && trailing_slash {
            return Err(invalid("*remainder cannot have a trailing slash"));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            trailing_slash,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the parameters this pattern binds, in order.
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(n) | Segment::Remainder(n) => Some(n.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Fill in the pattern. Extra parameters are ignored.
    pub fn generate(&self, params: &Params) -> Result<SitePath, RouteError> {
        let mut out = String::from("/");
        let mut parts = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => parts.push(lit.clone()),
                Segment::Param(name) | Segment::Remainder(name) => {
                    let value = params.get(name).ok_or_else(|| RouteError::MissingParam {
                        pattern: self.raw.clone(),
                        param: name.clone(),
                    })?;
                    let one_segment = matches!(segment, Segment::Param(_));
                    if value.is_empty() || (one_segment && value.contains('/')) {
                        return Err(RouteError::InvalidParam {
                            param: name.clone(),
                            value: value.clone(),
                        });
                    }
                    parts.push(value.clone());
                }
            }
        }
        out.push_str(&parts.join("/"));
        if self.trailing_slash {
            out.push('/');
        }
        Ok(SitePath::parse(&out)?)
    }

    /// Bind `path` against the pattern, returning the parameters on success.
    pub fn match_path(&self, path: &SitePath) -> Option<Params> {
        let parts: Vec<&str> = path.segments().collect();
        let mut params = Params::new();

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i) != Some(&lit.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), (*parts.get(i)?).to_string());
                }
                Segment::Remainder(name) => {
                    if parts.len() <= i {
                        return None;
                    }
                    let mut rest = parts[i..].join("/");
                    if path.is_directory() {
                        rest.push('/');
                    }
                    params.insert(name.clone(), rest);
                    return Some(params);
                }
            }
        }

        if parts.len() != self.segments.len() {
            return None;
        }
        if !self.segments.is_empty() && path.is_directory() != self.trailing_slash {
            return None;
        }
        Some(params)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// =============================================================================
// Routes
// =============================================================================

/// Enumerates the parameter sets a dynamic route can bind.
pub trait MatchFactory: Send + Sync {
    fn matches(&self) -> Result<Vec<Params>, MatchError>;
}

impl<F> MatchFactory for F
where
    F: Fn() -> Result<Vec<Params>, MatchError> + Send + Sync,
{
    fn matches(&self) -> Result<Vec<Params>, MatchError> {
        self()
    }
}

/// How many paths a route contributes.
#[derive(Clone)]
pub enum Matches {
    /// Exactly one path, generated from empty parameters.
    Static,
    /// One path per parameter set the factory yields.
    Dynamic(Arc<dyn MatchFactory>),
}

impl fmt::Debug for Matches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matches::Static => f.write_str("Static"),
            Matches::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// A named route.
#[derive(Debug, Clone)]
pub struct Route {
    name: String,
    pattern: RoutePattern,
    matches: Matches,
}

impl Route {
    /// A static route.
    pub fn new(name: impl Into<String>, pattern: RoutePattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            matches: Matches::Static,
        }
    }

    /// Turn this into a dynamic route driven by `factory`.
    pub fn with_matches(mut self, factory: impl MatchFactory + 'static) -> Self {
        self.matches = Matches::Dynamic(Arc::new(factory));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn matches(&self) -> &Matches {
        &self.matches
    }

    pub fn generate(&self, params: &Params) -> Result<SitePath, RouteError> {
        self.pattern.generate(params)
    }
}

/// Routes in registration order, addressable by name.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    by_name: HashMap<String, usize>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, route: Route) -> Result<(), RouteError> {
        if self.by_name.contains_key(route.name()) {
            return Err(RouteError::DuplicateRoute(route.name().to_string()));
        }
        self.by_name.insert(route.name().to_string(), self.routes.len());
        self.routes.push(route);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.by_name.get(name).map(|&i| &self.routes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Generate the path of a named route.
    pub fn route_path(&self, name: &str, params: &Params) -> Result<SitePath, RouteError> {
        self.get(name)
            .ok_or_else(|| RouteError::UnknownRoute(name.to_string()))?
            .generate(params)
    }

    /// First route, in registration order, whose pattern binds `path`.
    pub fn match_path(&self, path: &SitePath) -> Option<(&Route, Params)> {
        self.routes
            .iter()
            .find_map(|r| r.pattern.match_path(path).map(|p| (r, p)))
    }
}

/// A URL prefix served from a directory.
#[derive(Debug, Clone)]
pub struct StaticMapping {
    pub name: String,
    pub directory: PathBuf,
    pub route_name: String,
}

impl StaticMapping {
    /// Map `/<name>/...` onto `directory`. The route shares the mapping's name.
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            route_name: name.clone(),
            name,
            directory: directory.into(),
        }
    }

    /// The `/<name>/*subpath` route serving this mapping.
    pub fn route(&self) -> Result<Route, RouteError> {
        let pattern = RoutePattern::parse(&format!("/{}/*{SUBPATH_PARAM}", self.name))?;
        Ok(Route::new(self.route_name.clone(), pattern))
    }
}

// =============================================================================
// Built-in match factories
// =============================================================================

/// A fixed list of parameter sets.
#[derive(Debug, Clone)]
pub struct ListMatches(pub Vec<Params>);

impl MatchFactory for ListMatches {
    fn matches(&self) -> Result<Vec<Params>, MatchError> {
        Ok(self.0.clone())
    }
}

/// One parameter set per regular file in a directory, binding `param` to the
/// file stem. Hidden files are skipped.
#[derive(Debug, Clone)]
pub struct DirMatches {
    pub dir: PathBuf,
    pub param: String,
}

impl DirMatches {
    /// Find the file in `dir` whose stem is `stem`.
    pub fn source_for(dir: &Path, stem: &str) -> Result<Option<PathBuf>, std::io::Error> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.file_stem().is_some_and(|s| s == stem) {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

impl MatchFactory for DirMatches {
    fn matches(&self) -> Result<Vec<Params>, MatchError> {
        let io_err = |source| MatchError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut stems = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if stem.is_empty() || stem.starts_with('.') {
                continue;
            }
            stems.push(stem);
        }
        stems.sort();
        stems.dedup();
        Ok(stems
            .into_iter()
            .map(|stem| Params::from([(self.param.clone(), stem)]))
            .collect())
    }
}

/// Parameter sets read from a JSON array of flat objects. Numbers and
/// booleans are stringified.
#[derive(Debug, Clone)]
pub struct JsonMatches {
    pub path: PathBuf,
}

impl MatchFactory for JsonMatches {
    fn matches(&self) -> Result<Vec<Params>, MatchError> {
        let content = fs::read_to_string(&self.path).map_err(|source| MatchError::Io {
            path: self.path.clone(),
            source,
        })?;
        let rows: Vec<BTreeMap<String, Value>> =
            serde_json::from_str(&content).map_err(|source| MatchError::Json {
                path: self.path.clone(),
                source,
            })?;
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(key, value)| match value {
                        Value::String(s) => Ok((key, s)),
                        Value::Number(n) => Ok((key, n.to_string())),
                        Value::Bool(b) => Ok((key, b.to_string())),
                        other => Err(MatchError::Invalid(format!(
                            "'{key}' must be a string, number or boolean, got {other}"
                        ))),
                    })
                    .collect()
            })
            .collect()
    }
}
