//! # Stasis
//!
//! Freezes a routable site into a directory of static files. Every path the
//! site can serve is rendered once, written to the output directory, and the
//! output directory is then pruned so it holds exactly those files.
//!
//! # Architecture: One Pass
//!
//! ```text
//! 1. Enumerate   resource root + static mappings + routes  →  sorted SitePaths
//! 2. Render      each path through a Dispatcher            →  bytes
//! 3. Write       bytes to the output file, skipping equals →  WrittenSet
//! 4. Reconcile   delete everything not in the WrittenSet, then empty dirs
//! ```
//!
//! Paths come from three sources that are merged and deduplicated:
//!
//! - **Resource root**: every file under the root directory that survives the
//!   exclusion patterns is frozen at the same relative path.
//! - **Static mappings**: every file under a mapped directory becomes
//!   `/<name>/<subpath>`.
//! - **Routes**: static routes contribute one path; dynamic routes one path
//!   per parameter set their match factory yields.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` (entry) and `site.toml` (site) loading and validation |
//! | [`path`] | `SitePath`: normalized site paths and their output files |
//! | [`exclude`] | Gitignore-style exclusion patterns for the resource root |
//! | [`resource`] | Resource tree trait, filesystem implementation, traversal |
//! | [`route`] | Route patterns, route table, static mappings, match factories |
//! | [`enumerate`] | Merges the three path sources |
//! | [`dispatch`] | `Dispatcher` trait, per-render `Request`, `Response` |
//! | [`router`] | Built-in dispatcher: route views with traversal fallback |
//! | [`template`] | `{{ ... }}` placeholder templates and markdown rendering |
//! | [`viewlet`] | Named fragments included from templates |
//! | [`writer`] | Idempotent output writer |
//! | [`reconcile`] | Stale file and empty directory removal |
//! | [`site`] | `Site`, `SiteBuilder` and the build driver |
//! | [`output`] | CLI output formatting |
//!
//! # Embedding
//!
//! The `stasis` binary reads everything from `config.toml`. Applications that
//! need custom rendering assemble a site in code instead:
//!
//! ```rust,no_run
//! use stasis::dispatch::{DispatchError, Request, Response};
//! use stasis::route::{Route, RoutePattern};
//! use stasis::site::{BuildOptions, SiteBuilder};
//!
//! fn render(request: &Request<'_>) -> Result<Response, DispatchError> {
//!     Ok(Response::from(format!("<h1>{}</h1>", request.path())))
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let site = SiteBuilder::new("site")
//!     .register_route(Route::new("home", RoutePattern::parse("/")?))?
//!     .dispatcher(render)
//!     .finish();
//! let report = site.build(&BuildOptions::default())?;
//! println!("{} paths", report.paths.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Determinism
//!
//! Paths are rendered in sorted order, writes skip files whose bytes already
//! match, and reconciliation removes directories deepest first. Building an
//! unchanged site twice leaves every output file, modification time included,
//! as it was.

pub mod config;
pub mod dispatch;
pub mod enumerate;
pub mod exclude;
pub mod output;
pub mod path;
pub mod reconcile;
pub mod resource;
pub mod route;
pub mod router;
pub mod site;
pub mod template;
pub mod viewlet;
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;
