//! Path enumeration.
//!
//! Collects every path the site can serve from three sources and returns them
//! deduplicated and sorted. The sorted order doubles as the render order.
//!
//! 1. **Resource root**: each file under the root's backing directory that
//!    survives the [`ExclusionSet`] becomes `/<relpath>`.
//! 2. **Static mappings**: each file under a mapping's directory becomes the
//!    mapping route's path with the file as its `subpath`. The route is then
//!    marked visited.
//! 3. **Route table**: every route not visited in step 2 contributes one path
//!    per match (dynamic) or one path from empty parameters (static).
//!
//! Sources that produce the same path collapse into one entry without error.
//! Distinct paths that map to the same output file (`/` and `/index.html`)
//! are an [`EnumerateError::OutputCollision`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::exclude::ExclusionSet;
use crate::path::{PathError, SitePath};
use crate::resource::{Resource, traverse};
use crate::route::{
    MatchError, Matches, Params, RouteError, RouteTable, SUBPATH_PARAM, StaticMapping,
};

#[derive(Error, Debug)]
pub enum EnumerateError {
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Non UTF-8 path: {}", .0.display())]
    NonUtf8(PathBuf),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Route '{route}': {source}")]
    Route {
        route: String,
        #[source]
        source: RouteError,
    },
    #[error("Matches for route '{route}': {source}")]
    Match {
        route: String,
        #[source]
        source: MatchError,
    },
    #[error("Output conflict: '{first}' and '{second}' both write '{}'", file.display())]
    OutputCollision {
        first: SitePath,
        second: SitePath,
        file: PathBuf,
    },
}

/// Enumerate every site path, sorted by string comparison.
pub fn enumerate(
    root: Option<&Arc<dyn Resource>>,
    static_mappings: &[StaticMapping],
    routes: &RouteTable,
    excludes: &ExclusionSet,
) -> Result<Vec<SitePath>, EnumerateError> {
    let mut paths = BTreeSet::new();

    if let Some(root) = root
        && let Some(dir) = root.abspath()
    {
        for relpath in list_files(dir, Some(excludes))? {
            let traversal = traverse(root, &relpath);
            debug!(path = %relpath, exact = traversal.is_exact(), "traversed resource");
            if root.is_present() {
                paths.insert(SitePath::parse(&relpath)?);
            }
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();
    for mapping in static_mappings {
        let route = routes.get(&mapping.route_name).ok_or_else(|| EnumerateError::Route {
            route: mapping.route_name.clone(),
            source: RouteError::UnknownRoute(mapping.route_name.clone()),
        })?;
        visited.insert(route.name());
        for relpath in list_files(&mapping.directory, None)? {
            let params = Params::from([(SUBPATH_PARAM.to_string(), relpath)]);
            paths.insert(route.generate(&params).map_err(|source| EnumerateError::Route {
                route: route.name().to_string(),
                source,
            })?);
        }
    }

    for route in routes.iter() {
        if visited.contains(route.name()) {
            continue;
        }
        let route_err = |source| EnumerateError::Route {
            route: route.name().to_string(),
            source,
        };
        match route.matches() {
            Matches::Dynamic(factory) => {
                let matches = factory.matches().map_err(|source| EnumerateError::Match {
                    route: route.name().to_string(),
                    source,
                })?;
                debug!(route = route.name(), count = matches.len(), "dynamic route");
                for params in &matches {
                    paths.insert(route.generate(params).map_err(route_err)?);
                }
            }
            Matches::Static => {
                paths.insert(route.generate(&Params::new()).map_err(route_err)?);
                visited.insert(route.name());
            }
        }
    }

    check_output_collisions(&paths)?;
    Ok(paths.into_iter().collect())
}

/// Fail if two paths would be written to the same output file.
fn check_output_collisions(paths: &BTreeSet<SitePath>) -> Result<(), EnumerateError> {
    let mut seen: HashMap<PathBuf, &SitePath> = HashMap::with_capacity(paths.len());
    for path in paths {
        let file = path.output_relpath();
        if let Some(first) = seen.get(&file) {
            return Err(EnumerateError::OutputCollision {
                first: (*first).clone(),
                second: path.clone(),
                file,
            });
        }
        seen.insert(file, path);
    }
    Ok(())
}

/// Files under `dir`, relative to it, `/`-separated and sorted.
///
/// Excluded directories are pruned without being descended into.
pub fn list_files(
    dir: &Path,
    excludes: Option<&ExclusionSet>,
) -> Result<Vec<String>, EnumerateError> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| match (excludes, entry.path().strip_prefix(dir)) {
            (Some(set), Ok(rel)) => !set.is_excluded(rel, entry.file_type().is_dir()),
            _ => true,
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|_| EnumerateError::NonUtf8(entry.path().to_path_buf()))?;
        let mut parts = Vec::new();
        for component in rel.components() {
            let part = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| EnumerateError::NonUtf8(entry.path().to_path_buf()))?;
            parts.push(part);
        }
        files.push(parts.join("/"));
    }
    Ok(files)
}
