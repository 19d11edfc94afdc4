//! Render configuration.
//!
//! [`RenderSettings`] are the options an application configures rendering with, either in code
//! or from the `[render]` section of its TOML config file. They're resolved once into a
//! [`RenderConfig`], which is immutable and shared by every render call.
//!
//! # Example
//!
//! ```
//! use rwf_render::prelude::*;
//!
//! let env = AppEnv::new("/app");
//! let config = RenderSettings::new()
//!     .engine("erb")
//!     .layout("application")
//!     .build(&env)
//!     .unwrap();
//!
//! assert_eq!(config.views(), "/app/views");
//! assert_eq!(config.layout_opts().template.as_deref(), Some("application"));
//! ```
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use std::collections::HashMap;
use std::env::var;
use std::fs::read_to_string;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use crate::cache::{Cache, CacheClass};
use crate::options::{Layout, RenderOpts};
use crate::template::{Escaper, HtmlEscaper, Locals, Registry, TemplateOpts};

#[derive(Error, Debug)]
pub enum Error {
    #[error("config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("views directory \"{0}\" can't be resolved to an absolute path")]
    ViewsRoot(PathBuf),

    #[error("template engine can't be empty")]
    EmptyEngine,
}

/// What the application provides to rendering.
#[derive(Debug, Clone)]
pub struct AppEnv {
    root: PathBuf,
    development: bool,
    cache_class: CacheClass,
    registry: Arc<Registry>,
}

impl AppEnv {
    /// Application rooted at the given directory, in production mode.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            development: false,
            cache_class: CacheClass::default(),
            registry: Arc::new(Registry::default()),
        }
    }

    /// Application rooted in the current working directory. It's in development mode
    /// if the `RWF_ENV` environment variable is set to `development`.
    pub fn from_env() -> Result<Self, Error> {
        let development = match var("RWF_ENV") {
            Ok(env) => env == "development",
            Err(_) => false,
        };

        Ok(Self::new(std::env::current_dir()?).development(development))
    }

    /// Templates aren't cached by default in development.
    pub fn development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    /// Use these compilers instead of the built-in ones.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Cache constructor used when the settings don't specify one.
    pub fn cache_class(mut self, cache_class: CacheClass) -> Self {
        self.cache_class = cache_class;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_development(&self) -> bool {
        self.development
    }

    /// Create a new thread-safe template cache.
    pub fn thread_safe_cache(&self) -> Arc<dyn Cache> {
        self.cache_class.build()
    }
}

/// Rendering options, as configured by the application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Default template engine, also the template file extension. Defaults to `erb`.
    pub engine: Option<String>,
    /// Deprecated alias for `engine`.
    pub ext: Option<String>,
    /// Directory with the templates, relative to the application root. Defaults to `views`.
    pub views: Option<String>,
    /// Cache compiled templates. Defaults to on, except in development.
    pub cache: Option<bool>,
    #[serde(skip)]
    pub cache_class: Option<CacheClass>,
    /// Default layout. Defaults to `true`, which uses the `layout` template.
    pub layout: Option<Layout>,
    pub layout_opts: Option<RenderOpts>,
    /// Compiler options for all templates.
    pub template_opts: Option<TemplateOpts>,
    /// Compiler options by engine.
    pub engine_opts: Option<HashMap<String, TemplateOpts>>,
    /// Escape `<%= %>` output in ERB templates.
    pub escape: Option<bool>,
    #[serde(skip)]
    pub escaper: Option<Arc<dyn Escaper>>,
    /// Default locals for every template, except layouts.
    pub locals: Option<Locals>,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    render: RenderSettings,
}

impl RenderSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the `[render]` section of a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = read_to_string(path)?;
        Self::from_toml(&file)
    }

    /// Read settings from the `[render]` section of a TOML document.
    pub fn from_toml(toml: &str) -> Result<Self, Error> {
        let file: ConfigFile = toml::from_str(toml)?;
        Ok(file.render)
    }

    pub fn engine(mut self, engine: impl ToString) -> Self {
        self.engine = Some(engine.to_string());
        self
    }

    pub fn views(mut self, views: impl ToString) -> Self {
        self.views = Some(views.to_string());
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache_class(mut self, cache_class: CacheClass) -> Self {
        self.cache_class = Some(cache_class);
        self
    }

    pub fn layout(mut self, layout: impl Into<Layout>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn layout_opts(mut self, layout_opts: RenderOpts) -> Self {
        self.layout_opts = Some(layout_opts);
        self
    }

    pub fn template_opts(mut self, template_opts: TemplateOpts) -> Self {
        self.template_opts = Some(template_opts);
        self
    }

    pub fn engine_opts(mut self, engine: &str, template_opts: TemplateOpts) -> Self {
        self.engine_opts
            .get_or_insert_with(HashMap::new)
            .insert(engine.to_string(), template_opts);
        self
    }

    pub fn escape(mut self, escape: bool) -> Self {
        self.escape = Some(escape);
        self
    }

    pub fn escaper(mut self, escaper: impl Escaper + 'static) -> Self {
        self.escaper = Some(Arc::new(escaper));
        self
    }

    pub fn locals(mut self, locals: impl Into<Locals>) -> Self {
        self.locals = Some(locals.into());
        self
    }

    /// Merge `other` on top of these settings. Settings in `other` win.
    pub fn merge(self, other: RenderSettings) -> RenderSettings {
        RenderSettings {
            engine: other.engine.or(self.engine),
            ext: other.ext.or(self.ext),
            views: other.views.or(self.views),
            cache: other.cache.or(self.cache),
            cache_class: other.cache_class.or(self.cache_class),
            layout: other.layout.or(self.layout),
            layout_opts: other.layout_opts.or(self.layout_opts),
            template_opts: other.template_opts.or(self.template_opts),
            engine_opts: other.engine_opts.or(self.engine_opts),
            escape: other.escape.or(self.escape),
            escaper: other.escaper.or(self.escaper),
            locals: other.locals.or(self.locals),
        }
    }

    /// Resolve the settings into a render configuration.
    pub fn build(self, env: &AppEnv) -> Result<Arc<RenderConfig>, Error> {
        RenderConfig::configure(env, None, self)
    }
}

/// Resolved render configuration.
///
/// Immutable once built. Templates compiled with it are cached in its own cache,
/// which is never shared with another configuration.
#[derive(Debug)]
pub struct RenderConfig {
    orig: RenderSettings,
    engine: String,
    views: String,
    cache: Option<Arc<dyn Cache>>,
    cache_class: CacheClass,
    layout: Layout,
    layout_opts: RenderOpts,
    template_opts: TemplateOpts,
    engine_opts: HashMap<String, TemplateOpts>,
    escape: bool,
    escaper: Arc<dyn Escaper>,
    locals: Option<Locals>,
    registry: Arc<Registry>,
}

impl RenderConfig {
    /// Resolve settings into a configuration.
    ///
    /// If a prior configuration is given, the settings are merged over the settings that
    /// configuration was originally built from, so configuring twice is the same as
    /// configuring once with both sets of settings.
    pub fn configure(
        env: &AppEnv,
        prior: Option<&RenderConfig>,
        settings: RenderSettings,
    ) -> Result<Arc<RenderConfig>, Error> {
        let orig = match prior {
            Some(prior) => prior.orig.clone().merge(settings),
            None => settings,
        };
        let opts = orig.clone();

        let engine = opts
            .engine
            .or(opts.ext)
            .unwrap_or_else(|| "erb".to_string());
        if engine.is_empty() {
            return Err(Error::EmptyEngine);
        }

        let views = expand_path(opts.views.as_deref().unwrap_or("views"), env.root())?;

        let cache_class = opts
            .cache_class
            .unwrap_or_else(|| env.cache_class.clone());
        let cache = if opts.cache.unwrap_or(!env.is_development()) {
            Some(cache_class.build())
        } else {
            None
        };

        let mut layout_opts = opts.layout_opts.unwrap_or_default();
        layout_opts.is_layout = true;
        let layout = opts.layout.unwrap_or(Layout::Enabled(true));

        match &layout {
            Layout::Options(options) => layout_opts = layout_opts.merge(options.as_ref().clone()),
            Layout::Enabled(true) => {
                layout_opts
                    .template
                    .get_or_insert_with(|| "layout".to_string());
            }
            Layout::Template(template) => layout_opts.template = Some(template.clone()),
            Layout::Enabled(false) => (),
        }

        let mut template_opts = opts.template_opts.unwrap_or_default();
        if !template_opts.contains("outvar") {
            template_opts.set("outvar", "@_out_buf");
        }
        if !template_opts.contains("default_encoding") {
            template_opts.set("default_encoding", "UTF-8");
        }

        let escape = opts.escape.unwrap_or(false);
        if escape {
            template_opts.set("escape", true);
        }
        let escaper = opts
            .escaper
            .unwrap_or_else(|| Arc::new(HtmlEscaper) as Arc<dyn Escaper>);

        let config = RenderConfig {
            orig,
            engine,
            views,
            cache,
            cache_class,
            layout,
            layout_opts,
            template_opts,
            engine_opts: opts.engine_opts.unwrap_or_default(),
            escape,
            escaper,
            locals: opts.locals,
            registry: env.registry.clone(),
        };

        debug!(
            "render configured: engine \"{}\", views \"{}\", cache {}",
            config.engine,
            config.views,
            config.cache.is_some()
        );

        Ok(Arc::new(config))
    }

    /// Create a configuration for a derived application, e.g. a sub-app.
    ///
    /// All settings are copied. If caching is on, the derived configuration gets its own new
    /// cache, so templates compiled by one are never served by the other.
    pub fn inherit(&self) -> Arc<RenderConfig> {
        let cache = self.cache.as_ref().map(|_| self.cache_class.build());

        debug!("render configuration inherited, cache {}", cache.is_some());

        Arc::new(RenderConfig {
            orig: self.orig.clone(),
            engine: self.engine.clone(),
            views: self.views.clone(),
            cache,
            cache_class: self.cache_class.clone(),
            layout: self.layout.clone(),
            layout_opts: self.layout_opts.clone(),
            template_opts: self.template_opts.clone(),
            engine_opts: self.engine_opts.clone(),
            escape: self.escape,
            escaper: self.escaper.clone(),
            locals: self.locals.clone(),
            registry: self.registry.clone(),
        })
    }

    /// Default template engine.
    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Absolute path to the templates directory.
    pub fn views(&self) -> &str {
        &self.views
    }

    /// Template cache, if caching is on.
    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    /// Default layout.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Default options for rendering the layout.
    pub fn layout_opts(&self) -> &RenderOpts {
        &self.layout_opts
    }

    /// Compiler options for all templates.
    pub fn template_opts(&self) -> &TemplateOpts {
        &self.template_opts
    }

    /// Compiler options for templates of the given engine.
    pub fn engine_opts(&self, engine: &str) -> Option<&TemplateOpts> {
        self.engine_opts.get(engine)
    }

    pub fn escape(&self) -> bool {
        self.escape
    }

    pub fn escaper(&self) -> &Arc<dyn Escaper> {
        &self.escaper
    }

    /// Default locals for non-layout templates.
    pub fn locals(&self) -> Option<&Locals> {
        self.locals.as_ref()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Settings this configuration was built from.
    pub fn settings(&self) -> &RenderSettings {
        &self.orig
    }

    /// Log the configuration.
    pub fn log_info(&self) {
        info!(
            "templates in \"{}\", engine \"{}\", cache {}, layout {}",
            self.views,
            self.engine,
            if self.cache.is_some() { "on" } else { "off" },
            self.layout_opts
                .template
                .as_deref()
                .filter(|_| self.layout.enabled())
                .unwrap_or("none"),
        );
    }
}

/// Resolve `path` relative to `root`, removing `.` and `..` components.
fn expand_path(path: &str, root: &Path) -> Result<String, Error> {
    let joined = root.join(path);

    if !joined.is_absolute() {
        return Err(Error::ViewsRoot(joined));
    }

    let mut expanded = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => (),
            Component::ParentDir => {
                expanded.pop();
            }
            component => expanded.push(component),
        }
    }

    let expanded = expanded
        .to_str()
        .map(|s| s.trim_end_matches('/').to_string())
        .ok_or(Error::ViewsRoot(joined))?;

    if expanded.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(expanded)
    }
}
