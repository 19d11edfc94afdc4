//! Per-call render options and how they're merged.
//!
//! Every `render` and `view` call builds a fresh [`RenderOpts`] from the template argument
//! and the call options. Merging is always "later wins": a field set on the right-hand side
//! replaces the same field on the left.
use serde::Deserialize;

use std::fmt::Debug;
use std::sync::Arc;

use crate::cache::CacheKey;
use crate::config::RenderConfig;
use crate::template::{CompilerRef, Locals, Scope, TemplateBlock, TemplateOpts, ToValue};

/// Shared scope override.
#[derive(Clone)]
pub struct ScopeRef(Arc<dyn Scope + Send + Sync>);

impl ScopeRef {
    pub fn new(scope: impl Scope + Send + Sync + 'static) -> Self {
        Self(Arc::new(scope))
    }

    pub fn as_scope(&self) -> &dyn Scope {
        self.0.as_ref()
    }
}

impl Debug for ScopeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ScopeRef(..)")
    }
}

/// Whether and which layout to use.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Layout {
    /// `true` uses the default layout, `false` disables it.
    Enabled(bool),
    /// Name of the layout template.
    Template(String),
    /// Options for rendering the layout.
    Options(Box<RenderOpts>),
}

impl Layout {
    pub fn enabled(&self) -> bool {
        !matches!(self, Layout::Enabled(false))
    }
}

impl From<bool> for Layout {
    fn from(enabled: bool) -> Self {
        Layout::Enabled(enabled)
    }
}

impl From<&str> for Layout {
    fn from(template: &str) -> Self {
        Layout::Template(template.to_string())
    }
}

impl From<String> for Layout {
    fn from(template: String) -> Self {
        Layout::Template(template)
    }
}

impl From<RenderOpts> for Layout {
    fn from(opts: RenderOpts) -> Self {
        Layout::Options(Box::new(opts))
    }
}

/// Options for a single render call.
///
/// Any option left as `None` falls back to the configured default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RenderOpts {
    /// Template name, resolved to `{views}/{template}.{engine}`.
    pub template: Option<String>,
    /// Template source, used instead of reading a file.
    pub inline: Option<String>,
    /// Full path to the template, bypassing `views` and `engine`.
    pub path: Option<String>,
    pub views: Option<String>,
    pub engine: Option<String>,
    /// Deprecated alias for `engine`.
    pub ext: Option<String>,
    #[serde(skip)]
    pub template_class: Option<CompilerRef>,
    pub template_opts: Option<TemplateOpts>,
    /// Produces the template source, ignored with `inline`.
    #[serde(skip)]
    pub template_block: Option<TemplateBlock>,
    pub cache: Option<bool>,
    #[serde(skip)]
    pub cache_key: Option<CacheKey>,
    #[serde(skip)]
    pub scope: Option<ScopeRef>,
    pub locals: Option<Locals>,
    pub layout: Option<Layout>,
    pub layout_opts: Option<Box<RenderOpts>>,
    /// Only used by `view`, rendered inside the layout instead of a template.
    pub content: Option<String>,
    #[serde(skip)]
    pub(crate) is_layout: bool,
}

impl RenderOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn template(mut self, template: impl ToString) -> Self {
        self.template = Some(template.to_string());
        self
    }

    pub fn inline(mut self, inline: impl ToString) -> Self {
        self.inline = Some(inline.to_string());
        self
    }

    pub fn path(mut self, path: impl ToString) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn views(mut self, views: impl ToString) -> Self {
        self.views = Some(views.to_string());
        self
    }

    pub fn engine(mut self, engine: impl ToString) -> Self {
        self.engine = Some(engine.to_string());
        self
    }

    pub fn template_class(mut self, compiler: CompilerRef) -> Self {
        self.template_class = Some(compiler);
        self
    }

    pub fn template_opts(mut self, options: TemplateOpts) -> Self {
        self.template_opts = Some(options);
        self
    }

    pub fn template_block(mut self, block: TemplateBlock) -> Self {
        self.template_block = Some(block);
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Skip computing the cache key and use this one instead.
    /// Choosing a key that's shared by two different templates will render the wrong template.
    pub fn cache_key(mut self, key: impl ToString) -> Self {
        self.cache_key = Some(CacheKey::Explicit(key.to_string()));
        self
    }

    pub fn scope(mut self, scope: impl Scope + Send + Sync + 'static) -> Self {
        self.scope = Some(ScopeRef::new(scope));
        self
    }

    pub fn locals(mut self, locals: impl Into<Locals>) -> Self {
        self.locals = Some(locals.into());
        self
    }

    /// Set a single local variable.
    pub fn local(mut self, name: &str, value: impl ToValue) -> Self {
        self.locals.get_or_insert_with(Locals::new).set(name, value);
        self
    }

    pub fn layout(mut self, layout: impl Into<Layout>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn layout_opts(mut self, opts: RenderOpts) -> Self {
        self.layout_opts = Some(Box::new(opts));
        self
    }

    pub fn content(mut self, content: impl ToString) -> Self {
        self.content = Some(content.to_string());
        self
    }

    /// Is this the options for rendering a layout.
    pub fn is_layout(&self) -> bool {
        self.is_layout
    }

    /// Does this identify a template to render.
    pub fn has_source(&self) -> bool {
        self.template.is_some() || self.inline.is_some() || self.path.is_some()
    }

    /// Merge `other` on top of these options. Options set in `other` win.
    pub fn merge(self, other: RenderOpts) -> RenderOpts {
        RenderOpts {
            template: other.template.or(self.template),
            inline: other.inline.or(self.inline),
            path: other.path.or(self.path),
            views: other.views.or(self.views),
            engine: other.engine.or(self.engine),
            ext: other.ext.or(self.ext),
            template_class: other.template_class.or(self.template_class),
            template_opts: other.template_opts.or(self.template_opts),
            template_block: other.template_block.or(self.template_block),
            cache: other.cache.or(self.cache),
            cache_key: other.cache_key.or(self.cache_key),
            scope: other.scope.or(self.scope),
            locals: other.locals.or(self.locals),
            layout: other.layout.or(self.layout),
            layout_opts: other.layout_opts.or(self.layout_opts),
            content: other.content.or(self.content),
            is_layout: self.is_layout || other.is_layout,
        }
    }
}

/// First argument to `render` and `view`: a template name or a full set of options.
#[derive(Debug, Clone)]
pub enum Target {
    Name(String),
    Options(RenderOpts),
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Target::Name(name.to_string())
    }
}

impl From<String> for Target {
    fn from(name: String) -> Self {
        Target::Name(name)
    }
}

impl From<&String> for Target {
    fn from(name: &String) -> Self {
        Target::Name(name.clone())
    }
}

impl From<RenderOpts> for Target {
    fn from(opts: RenderOpts) -> Self {
        Target::Options(opts)
    }
}

/// Combine the template argument and call options into one set of options.
pub fn parse_request(target: Target, opts: RenderOpts) -> RenderOpts {
    match target {
        Target::Options(target) => opts.merge(target),
        Target::Name(name) => RenderOpts {
            template: Some(name),
            ..opts
        },
    }
}

/// Merge the configured default locals under the call's locals.
/// Layout renders are left alone, the layout has its own default locals.
pub fn merge_render_locals(config: &RenderConfig, opts: &mut RenderOpts) {
    if opts.is_layout {
        return;
    }

    if let Some(defaults) = config.locals() {
        opts.locals = Some(match opts.locals.take() {
            Some(locals) => defaults.merge(&locals),
            None => defaults.clone(),
        });
    }
}
