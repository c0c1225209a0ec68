//! Site build driver.
//!
//! A [`Site`] bundles everything that stays fixed across builds: the route
//! table, static mappings, viewlets, the resource root and the dispatcher.
//! [`Site::build`] runs one pass:
//!
//! ```text
//! site.toml ──► BuildContext ──► hooks ──► enumerate ──► render + write ──► reconcile
//! ```
//!
//! Every pass builds a fresh, immutable [`BuildContext`]. Renders only ever
//! borrow it, so the render loop can run on a rayon pool without locks around
//! configuration or registries. Each path gets its own [`Request`], created
//! inside the worker that renders it.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{
    self, ConfigError, ConfigFactory, EntryConfig, MatchesEntry, SiteConfig, TomlConfigFactory,
};
use crate::dispatch::{DispatchError, Dispatcher, Request};
use crate::enumerate::{EnumerateError, enumerate};
use crate::exclude::ExclusionSet;
use crate::path::SitePath;
use crate::reconcile::{ReconcileError, reconcile};
use crate::resource::{FsResource, Resource};
use crate::route::{
    DirMatches, JsonMatches, ListMatches, Route, RouteError, RoutePattern, RouteTable,
    StaticMapping,
};
use crate::router::{Router, StaticFileView, TemplateSource, TemplateView, View};
use crate::viewlet::{TemplateViewlet, Viewlet, ViewletRegistry};
use crate::writer::{OutputWriter, WriteError, WriteOutcome, WriteRecord};

/// Error type returned by build hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Pre-build hook failed: {0}")]
    Hook(#[source] HookError),
    #[error("Enumeration error: {0}")]
    Enumerate(#[from] EnumerateError),
    #[error("Failed to render '{path}': {source}")]
    Dispatch {
        path: SitePath,
        #[source]
        source: DispatchError,
    },
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] ReconcileError),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

// =============================================================================
// Build context
// =============================================================================

/// Immutable state of one build pass.
pub struct BuildContext {
    site_root: PathBuf,
    config: SiteConfig,
    output_dir: PathBuf,
    root: Option<Arc<dyn Resource>>,
    routes: Arc<RouteTable>,
    static_mappings: Arc<Vec<StaticMapping>>,
    viewlets: Arc<ViewletRegistry>,
    excludes: ExclusionSet,
    jobs: usize,
}

impl BuildContext {
    pub fn site_root(&self) -> &Path {
        &self.site_root
    }

    /// The loaded site configuration, including free-form sections.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn root(&self) -> Option<&Arc<dyn Resource>> {
        self.root.as_ref()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn static_mappings(&self) -> &[StaticMapping] {
        &self.static_mappings
    }

    pub fn viewlets(&self) -> &ViewletRegistry {
        &self.viewlets
    }

    pub fn excludes(&self) -> &ExclusionSet {
        &self.excludes
    }

    /// Render workers for this pass (1 = sequential).
    pub fn jobs(&self) -> usize {
        self.jobs
    }
}

/// Runs once per build, after configuration is loaded and before any path is
/// enumerated. An error aborts the build.
pub trait BuildHook: Send + Sync {
    fn pre_build(&self, context: &BuildContext) -> Result<(), HookError>;
}

impl<F> BuildHook for F
where
    F: Fn(&BuildContext) -> Result<(), HookError> + Send + Sync,
{
    fn pre_build(&self, context: &BuildContext) -> Result<(), HookError> {
        self(context)
    }
}

/// Per-invocation overrides of the site configuration.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Overrides `site.jobs`.
    pub jobs: Option<usize>,
    /// Overrides `site.outpath`.
    pub output: Option<PathBuf>,
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    /// Every enumerated path, sorted.
    pub paths: Vec<SitePath>,
    /// Paths whose output file changed.
    pub written: Vec<SitePath>,
    /// Paths whose output file already had the rendered content.
    pub unchanged: Vec<SitePath>,
    /// Stale files removed, relative to the output directory.
    pub deleted: Vec<PathBuf>,
    /// Empty directories removed, deepest first.
    pub removed_dirs: Vec<PathBuf>,
}

// =============================================================================
// Site
// =============================================================================

pub struct Site {
    root: PathBuf,
    resource: Option<Arc<dyn Resource>>,
    routes: Arc<RouteTable>,
    static_mappings: Arc<Vec<StaticMapping>>,
    viewlets: Arc<ViewletRegistry>,
    dispatcher: Arc<dyn Dispatcher>,
    config_factory: Arc<dyn ConfigFactory>,
    hooks: Vec<Box<dyn BuildHook>>,
}

impl Site {
    /// Open the site rooted at `root` from its `config.toml`.
    ///
    /// Fails with [`ConfigError::MissingEntry`] when the file is absent, before
    /// anything else under `root` is read.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        let entry = config::load_entry_config(&root)?;
        Ok(SiteBuilder::from_entry(root, &entry)?.finish())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn dispatcher(&self) -> &dyn Dispatcher {
        self.dispatcher.as_ref()
    }

    /// Load site configuration and assemble the context for one pass.
    pub fn context(&self, options: &BuildOptions) -> Result<BuildContext, ConfigError> {
        let mut config = self.config_factory.load(&self.root)?;
        if let Some(jobs) = options.jobs {
            config.site.jobs = Some(jobs);
        }
        config.validate()?;

        let output_dir = options
            .output
            .clone()
            .unwrap_or_else(|| config.output_dir(&self.root));
        let excludes = match self.resource.as_ref().and_then(|r| r.abspath()) {
            Some(dir) => ExclusionSet::for_site(dir, &config.site, &output_dir)?,
            None => ExclusionSet::empty(),
        };
        let jobs = config::effective_jobs(config.site.jobs);

        Ok(BuildContext {
            site_root: self.root.clone(),
            config,
            output_dir,
            root: self.resource.clone(),
            routes: Arc::clone(&self.routes),
            static_mappings: Arc::clone(&self.static_mappings),
            viewlets: Arc::clone(&self.viewlets),
            excludes,
            jobs,
        })
    }

    /// Every path a build would render, sorted. Hooks do not run.
    pub fn paths(&self, options: &BuildOptions) -> Result<Vec<SitePath>, BuildError> {
        let ctx = self.context(options)?;
        Ok(enumerate_context(&ctx)?)
    }

    /// Run one full build pass.
    pub fn build(&self, options: &BuildOptions) -> Result<BuildReport, BuildError> {
        let ctx = self.context(options)?;
        info!(
            root = %self.root.display(),
            output = %ctx.output_dir().display(),
            jobs = ctx.jobs(),
            "building site"
        );

        for hook in &self.hooks {
            hook.pre_build(&ctx).map_err(BuildError::Hook)?;
        }

        let paths = enumerate_context(&ctx)?;
        info!(count = paths.len(), "enumerated paths");

        let writer = OutputWriter::new(ctx.output_dir());
        let records: Vec<WriteRecord> = if ctx.jobs() > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(ctx.jobs())
                .build()?;
            pool.install(|| {
                paths
                    .par_iter()
                    .map(|path| self.render_one(&ctx, &writer, path))
                    .collect::<Result<Vec<_>, _>>()
            })?
        } else {
            paths
                .iter()
                .map(|path| self.render_one(&ctx, &writer, path))
                .collect::<Result<Vec<_>, _>>()?
        };

        let written_set = writer.into_written();
        let reconciled = reconcile(ctx.output_dir(), &written_set)?;

        let (written, unchanged): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.outcome == WriteOutcome::Written);

        Ok(BuildReport {
            output_dir: ctx.output_dir().to_path_buf(),
            paths,
            written: written.into_iter().map(|r| r.path).collect(),
            unchanged: unchanged.into_iter().map(|r| r.path).collect(),
            deleted: reconciled.deleted,
            removed_dirs: reconciled.removed_dirs,
        })
    }

    fn render_one(
        &self,
        ctx: &BuildContext,
        writer: &OutputWriter,
        path: &SitePath,
    ) -> Result<WriteRecord, BuildError> {
        debug!(path = %path, "rendering");
        let response = {
            let request = Request::new(path.clone(), ctx);
            self.dispatcher
                .render(&request)
                .map_err(|source| BuildError::Dispatch {
                    path: path.clone(),
                    source,
                })?
        };
        Ok(writer.write(path, &response.body)?)
    }
}

fn enumerate_context(ctx: &BuildContext) -> Result<Vec<SitePath>, EnumerateError> {
    enumerate(
        ctx.root(),
        ctx.static_mappings(),
        ctx.routes(),
        ctx.excludes(),
    )
}

/// Open the site at `site_root` and build it.
pub fn build(site_root: &Path, options: &BuildOptions) -> Result<BuildReport, BuildError> {
    Site::open(site_root)?.build(options)
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`Site`] programmatically.
///
/// Routes added with a view are served by the built-in [`Router`]. Supplying a
/// custom [`Dispatcher`] replaces the router entirely; routes registered with
/// [`register_route`](Self::register_route) then only feed enumeration and
/// URL generation.
pub struct SiteBuilder {
    root: PathBuf,
    resource: Option<Arc<dyn Resource>>,
    routes: RouteTable,
    static_mappings: Vec<StaticMapping>,
    viewlets: ViewletRegistry,
    router: Router,
    dispatcher: Option<Arc<dyn Dispatcher>>,
    config_factory: Arc<dyn ConfigFactory>,
    hooks: Vec<Box<dyn BuildHook>>,
}

impl SiteBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            resource: None,
            routes: RouteTable::new(),
            static_mappings: Vec::new(),
            viewlets: ViewletRegistry::new(),
            router: Router::new(),
            dispatcher: None,
            config_factory: Arc::new(TomlConfigFactory),
            hooks: Vec::new(),
        }
    }

    /// Use `resource` as the traversal root.
    pub fn root_resource(mut self, resource: impl Resource + 'static) -> Self {
        self.resource = Some(Arc::new(resource));
        self
    }

    /// Add a route served by `view`.
    pub fn add_route(mut self, route: Route, view: impl View + 'static) -> Result<Self, RouteError> {
        let name = route.name().to_string();
        self.routes.add(route)?;
        self.router.add_view(name, view);
        Ok(self)
    }

    /// Add a route without a view.
    pub fn register_route(mut self, route: Route) -> Result<Self, RouteError> {
        self.routes.add(route)?;
        Ok(self)
    }

    /// Serve every file under `directory` at `/<name>/<subpath>`.
    pub fn add_static_view(
        mut self,
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Result<Self, RouteError> {
        let mapping = StaticMapping::new(name, directory);
        let view = StaticFileView::new(mapping.directory.clone());
        self = self.add_route(mapping.route()?, view)?;
        self.static_mappings.push(mapping);
        Ok(self)
    }

    pub fn add_viewlet(mut self, name: impl Into<String>, viewlet: impl Viewlet + 'static) -> Self {
        self.viewlets.add(name, viewlet);
        self
    }

    pub fn add_hook(mut self, hook: impl BuildHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn config_factory(mut self, factory: impl ConfigFactory + 'static) -> Self {
        self.config_factory = Arc::new(factory);
        self
    }

    pub fn dispatcher(mut self, dispatcher: impl Dispatcher + 'static) -> Self {
        self.dispatcher = Some(Arc::new(dispatcher));
        self
    }

    /// Builder populated from an entry configuration. Relative paths in
    /// `entry` resolve against `root`.
    pub fn from_entry(root: impl Into<PathBuf>, entry: &EntryConfig) -> Result<Self, ConfigError> {
        let root = root.into();
        let mut builder = SiteBuilder::new(&root);

        if let Some(dir) = &entry.root {
            builder = builder.root_resource(FsResource::new(root.join(dir)));
        }
        for mapping in &entry.statics {
            builder = builder.add_static_view(&mapping.name, root.join(&mapping.path))?;
        }
        for route_entry in &entry.routes {
            let mut route = Route::new(&route_entry.name, RoutePattern::parse(&route_entry.pattern)?);
            let source = match (&route_entry.template, &route_entry.body) {
                (Some(path), _) => TemplateSource::File(root.join(path)),
                (None, Some(body)) => TemplateSource::Inline(body.clone()),
                (None, None) => {
                    return Err(ConfigError::Validation(format!(
                        "route '{}' has no template",
                        route_entry.name
                    )));
                }
            };
            let mut view = TemplateView::new(source);
            match &route_entry.matches {
                Some(MatchesEntry::List(list)) => {
                    route = route.with_matches(ListMatches(list.clone()));
                }
                Some(MatchesEntry::Dir { dir, param }) => {
                    let dir = root.join(dir);
                    view = view.with_content_dir(&dir, param);
                    route = route.with_matches(DirMatches {
                        dir,
                        param: param.clone(),
                    });
                }
                Some(MatchesEntry::Data { data }) => {
                    route = route.with_matches(JsonMatches {
                        path: root.join(data),
                    });
                }
                None => {}
            }
            builder = builder.add_route(route, view)?;
        }
        for (name, path) in &entry.viewlets {
            builder = builder.add_viewlet(name, TemplateViewlet::new(root.join(path)));
        }
        Ok(builder)
    }

    pub fn finish(self) -> Site {
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(self.router) as Arc<dyn Dispatcher>);
        Site {
            root: self.root,
            resource: self.resource,
            routes: Arc::new(self.routes),
            static_mappings: Arc::new(self.static_mappings),
            viewlets: Arc::new(self.viewlets),
            dispatcher,
            config_factory: self.config_factory,
            hooks: self.hooks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Response;
    use crate::test_helpers::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn strs(paths: &[SitePath]) -> Vec<&str> {
        paths.iter().map(|p| p.as_str()).collect()
    }

    #[test]
    fn scenario_build_writes_every_path() {
        let (tmp, site) = scenario_site();
        let report = site.build(&BuildOptions::default()).unwrap();

        assert_eq!(
            strs(&report.paths),
            ["/", "/assets/logo.png", "/post/1", "/post/2"]
        );
        assert_eq!(report.written.len(), 4);
        assert_eq!(
            output_tree(&tmp.path().join("output")),
            ["assets/", "assets/logo.png", "index.html", "post/", "post/1", "post/2"]
        );
        let post = fs::read_to_string(tmp.path().join("output/post/1")).unwrap();
        assert_eq!(post, "<h1>Post 1</h1><nav><a href=\"../\">home</a></nav>");
        let home = fs::read_to_string(tmp.path().join("output/index.html")).unwrap();
        assert!(home.contains("href=\"post/1\""));
        assert!(home.contains("src=\"assets/logo.png\""));
        assert_eq!(
            fs::read(tmp.path().join("output/assets/logo.png")).unwrap(),
            LOGO_BYTES
        );
    }

    #[test]
    fn second_build_writes_nothing() {
        let (_tmp, site) = scenario_site();
        site.build(&BuildOptions::default()).unwrap();
        let report = site.build(&BuildOptions::default()).unwrap();

        assert!(report.written.is_empty());
        assert_eq!(report.unchanged.len(), 4);
        assert!(report.deleted.is_empty());
        assert!(report.removed_dirs.is_empty());
    }

    #[test]
    fn stale_output_is_reconciled() {
        let (tmp, site) = scenario_site();
        write_file(tmp.path(), "output/old/page.html", "stale");
        write_file(tmp.path(), "output/post/3", "stale");

        let report = site.build(&BuildOptions::default()).unwrap();

        assert_eq!(
            report.deleted,
            [PathBuf::from("old/page.html"), PathBuf::from("post/3")]
        );
        assert_eq!(report.removed_dirs, [PathBuf::from("old")]);
        assert!(!tmp.path().join("output/old").exists());
        assert!(tmp.path().join("output/post/2").exists());
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let (tmp, site) = scenario_site();
        let options = BuildOptions {
            jobs: Some(4),
            output: Some(tmp.path().join("parallel")),
        };
        let report = site.build(&options).unwrap();
        site.build(&BuildOptions::default()).unwrap();

        assert_eq!(report.written.len(), 4);
        assert_eq!(
            output_tree(&tmp.path().join("parallel")),
            output_tree(&tmp.path().join("output"))
        );
        assert_eq!(
            fs::read(tmp.path().join("parallel/post/2")).unwrap(),
            fs::read(tmp.path().join("output/post/2")).unwrap()
        );
    }

    #[test]
    fn open_without_entry_config_fails_fast() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Site::open(tmp.path()),
            Err(ConfigError::MissingEntry(_))
        ));
        assert!(matches!(
            build(tmp.path(), &BuildOptions::default()),
            Err(BuildError::Config(ConfigError::MissingEntry(_)))
        ));
        assert!(!tmp.path().join("output").exists());
    }

    #[test]
    fn dispatch_error_aborts_before_reconcile() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "config.toml",
            "[[route]]\nname = \"home\"\npattern = \"/\"\nbody = \"{{ nope }}\"\n",
        );
        write_file(tmp.path(), "output/stale.html", "stale");
        let site = Site::open(tmp.path()).unwrap();

        let err = site.build(&BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Dispatch { ref path, .. } if path.as_str() == "/"));
        assert!(tmp.path().join("output/stale.html").exists());
    }

    #[test]
    fn colliding_output_files_abort_before_writing() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "config.toml",
            "root = \"content\"\n\n[[route]]\nname = \"home\"\npattern = \"/\"\nbody = \"HOME\"\n",
        );
        write_file(tmp.path(), "content/index.html", "RESOURCE INDEX");
        let site = Site::open(tmp.path()).unwrap();

        let err = site.build(&BuildOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            BuildError::Enumerate(EnumerateError::OutputCollision { .. })
        ));
        assert!(!tmp.path().join("output/index.html").exists());
    }

    #[test]
    fn outpath_from_site_config() {
        let (tmp, site) = scenario_site();
        write_file(tmp.path(), "site.toml", "[site]\noutpath = \"public\"\n");
        let report = site.build(&BuildOptions::default()).unwrap();
        assert_eq!(report.output_dir, tmp.path().join("public"));
        assert!(tmp.path().join("public/index.html").exists());
        assert!(!tmp.path().join("output").exists());
    }

    #[test]
    fn resource_root_is_frozen_with_excludes() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "config.toml", "root = \".\"\n");
        write_file(tmp.path(), "site.toml", "[site]\nexcludes = \"drafts/\"\n");
        write_file(tmp.path(), "about.html", "about");
        write_file(tmp.path(), "docs/index.html", "docs");
        write_file(tmp.path(), "drafts/wip.html", "wip");
        write_file(tmp.path(), ".git/HEAD", "ref");

        let site = Site::open(tmp.path()).unwrap();
        let report = site.build(&BuildOptions::default()).unwrap();
        assert_eq!(strs(&report.paths), ["/about.html", "/docs/index.html"]);

        // The first build's output must not feed the second.
        let report = site.build(&BuildOptions::default()).unwrap();
        assert_eq!(strs(&report.paths), ["/about.html", "/docs/index.html"]);
        assert_eq!(
            fs::read_to_string(tmp.path().join("output/docs/index.html")).unwrap(),
            "docs"
        );
    }

    #[test]
    fn hooks_run_before_enumeration() {
        let tmp = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let site = SiteBuilder::new(tmp.path())
            .add_hook(move |ctx: &BuildContext| -> Result<(), HookError> {
                assert_eq!(ctx.config().site.outpath, "output");
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .finish();
        site.build(&BuildOptions::default()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_hook_aborts_build() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "output/keep.html", "x");
        let site = SiteBuilder::new(tmp.path())
            .add_hook(|_: &BuildContext| -> Result<(), HookError> { Err("no database".into()) })
            .finish();
        let err = site.build(&BuildOptions::default()).unwrap_err();
        assert!(matches!(err, BuildError::Hook(_)));
        assert!(tmp.path().join("output/keep.html").exists());
    }

    struct Echo;

    impl Dispatcher for Echo {
        fn render(&self, request: &Request<'_>) -> Result<Response, DispatchError> {
            Ok(Response::from(format!("echo {}", request.path())))
        }
    }

    #[test]
    fn custom_dispatcher_and_config_factory() {
        struct Fixed;
        impl ConfigFactory for Fixed {
            fn load(&self, _site_root: &Path) -> Result<SiteConfig, ConfigError> {
                let mut config = SiteConfig::default();
                config.site.outpath = "frozen".into();
                Ok(config)
            }
        }

        let tmp = TempDir::new().unwrap();
        let site = SiteBuilder::new(tmp.path())
            .register_route(Route::new("a", RoutePattern::parse("/a/").unwrap()))
            .unwrap()
            .dispatcher(Echo)
            .config_factory(Fixed)
            .finish();
        site.build(&BuildOptions::default()).unwrap();
        assert_eq!(
            fs::read_to_string(tmp.path().join("frozen/a/index.html")).unwrap(),
            "echo /a/"
        );
    }

    #[test]
    fn duplicate_route_names_rejected_by_builder() {
        let tmp = TempDir::new().unwrap();
        let result = SiteBuilder::new(tmp.path())
            .add_static_view("assets", tmp.path().join("static"))
            .unwrap()
            .register_route(Route::new("assets", RoutePattern::parse("/x").unwrap()));
        assert!(matches!(result, Err(RouteError::DuplicateRoute(_))));
    }
}
