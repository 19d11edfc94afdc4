//! Rendering templates and views.
//!
//! Anything that implements [`Scope`] and can hand out a [`RenderConfig`] can render templates
//! by implementing [`Render`]. [`Renderer`] is a ready-made one, with its own scope variables.
//!
//! # Example
//!
//! ```
//! use rwf_render::prelude::*;
//!
//! let config = RenderSettings::new().layout(false).build(&AppEnv::new("/app")).unwrap();
//! let renderer = Renderer::new(config).assign("name", "Rwf");
//!
//! let page = renderer
//!     .render(RenderOpts::new().inline("Hello from <%= @name %>!"), RenderOpts::new())
//!     .unwrap();
//!
//! assert_eq!(page, "Hello from Rwf!");
//! ```
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::layout::view_layout_opts;
use crate::options::{merge_render_locals, parse_request, RenderOpts, Target};
use crate::resolve;
use crate::template::{Artifact, Content, Locals, Scope, ToValue, Value};
use crate::Error;

/// Render templates in the context of `self`.
pub trait Render: Scope + Sized {
    /// Render configuration.
    fn render_opts(&self) -> &RenderConfig;

    /// Name of the template to render. Override to map names, e.g. to a sub-directory.
    fn template_name(&self, opts: &RenderOpts) -> Result<String, Error> {
        opts.template.clone().ok_or(Error::NoTemplate)
    }

    /// Full path to the template file.
    fn template_path(&self, opts: &RenderOpts) -> Result<String, Error> {
        Ok(format!(
            "{}/{}.{}",
            opts.views.as_deref().unwrap_or(self.render_opts().views()),
            self.template_name(opts)?,
            opts.engine.as_deref().unwrap_or(self.render_opts().engine())
        ))
    }

    /// Get the compiled template for these options and the options it should be rendered with.
    fn retrieve_template(&self, opts: RenderOpts) -> Result<(Arc<dyn Artifact>, RenderOpts), Error> {
        resolve::retrieve_template(self.render_opts(), opts, &|opts: &RenderOpts| {
            self.template_path(opts)
        })
    }

    /// Get the compiled template without rendering it.
    fn template(&self, target: impl Into<Target>, opts: RenderOpts) -> Result<Arc<dyn Artifact>, Error> {
        let (template, _) = self.retrieve_template(parse_request(target.into(), opts))?;
        Ok(template)
    }

    /// Render a template without a layout.
    fn render(&self, target: impl Into<Target>, opts: RenderOpts) -> Result<String, Error> {
        self.render_with(target, opts, None)
    }

    /// Render a template, passing it a content block for `yield`.
    fn render_with(
        &self,
        target: impl Into<Target>,
        opts: RenderOpts,
        content: Option<Content>,
    ) -> Result<String, Error> {
        let mut opts = parse_request(target.into(), opts);

        if !opts.has_source() {
            return Err(Error::NoTemplate);
        }

        merge_render_locals(self.render_opts(), &mut opts);

        let (template, opts) = self.retrieve_template(opts)?;
        let locals = opts.locals.unwrap_or_default();

        match &opts.scope {
            Some(scope) => template.render(scope.as_scope(), &locals, content),
            None => template.render(self, &locals, content),
        }
    }

    /// Render a template, or the `content` option, inside the layout.
    fn view(&self, target: impl Into<Target>, opts: RenderOpts) -> Result<String, Error> {
        let opts = parse_request(target.into(), opts);

        let content = match &opts.content {
            Some(content) => content.clone(),
            None => self.render(opts.clone(), RenderOpts::new())?,
        };

        match view_layout_opts(self.render_opts(), &opts) {
            Some(layout_opts) => {
                let block = || -> Result<String, Error> { Ok(content.clone()) };
                self.render_with(layout_opts, RenderOpts::new(), Some(&block))
            }

            None => Ok(content),
        }
    }
}

/// Renders templates with its own scope variables.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: Arc<RenderConfig>,
    assigns: Locals,
}

impl Renderer {
    pub fn new(config: Arc<RenderConfig>) -> Self {
        Self {
            config,
            assigns: Locals::new(),
        }
    }

    /// Set a scope variable, available as `@name` in templates.
    pub fn assign(mut self, name: &str, value: impl ToValue) -> Self {
        self.assigns.set(name, value);
        self
    }

    pub fn config(&self) -> &Arc<RenderConfig> {
        &self.config
    }
}

impl Scope for Renderer {
    fn ivar(&self, name: &str) -> Option<Value> {
        self.assigns.get(name).cloned()
    }
}

impl Render for Renderer {
    fn render_opts(&self) -> &RenderConfig {
        &self.config
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{AppEnv, RenderSettings};
    use crate::template::{Compiler, Erb, Registry, Source, TemplateBlock};
    use std::fs::{create_dir_all, write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempdir::TempDir;

    #[derive(Debug, Clone, Default)]
    struct Counting(Arc<AtomicUsize>);

    impl Counting {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl Compiler for Counting {
        fn compile(&self, source: &Source) -> Result<Arc<dyn Artifact>, Error> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Erb.compile(source)
        }
    }

    struct App {
        dir: TempDir,
        counting: Counting,
    }

    impl App {
        fn new() -> Result<Self, Error> {
            let dir = TempDir::new("rwf-render")?;
            let views = dir.path().join("views");
            create_dir_all(views.join("admin"))?;

            write(
                views.join("layout.erb"),
                "<title><%= title %></title><main><%= yield %></main>",
            )?;
            write(views.join("home.erb"), "<h1>Hello <%= name %></h1>")?;
            write(views.join("profile.erb"), "<p><%= @user %></p>")?;
            write(views.join("admin/layout.erb"), "<div class=\"admin\"><%= yield %></div>")?;
            write(views.join("broken.erb"), "<% if %>")?;

            Ok(Self {
                dir,
                counting: Counting::default(),
            })
        }

        fn env(&self) -> AppEnv {
            AppEnv::new(self.dir.path()).registry(Registry::new().register("erb", self.counting.clone()))
        }

        fn renderer(&self, settings: RenderSettings) -> Result<Renderer, Error> {
            Ok(Renderer::new(settings.build(&self.env())?))
        }

        fn default_settings() -> RenderSettings {
            RenderSettings::new()
                .layout_opts(RenderOpts::new().local("title", "Rwf"))
                .locals(Locals::from([("name", "world")]))
        }
    }

    #[test]
    fn test_view_with_layout() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        let page = renderer.view("home", RenderOpts::new())?;
        assert_eq!(
            page,
            "<title>Rwf</title><main><h1>Hello world</h1></main>"
        );

        let page = renderer.view("home", RenderOpts::new().local("name", "Lev"))?;
        assert_eq!(page, "<title>Rwf</title><main><h1>Hello Lev</h1></main>");

        Ok(())
    }

    #[test]
    fn test_view_without_layout_is_render() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        assert_eq!(
            renderer.view("home", RenderOpts::new().layout(false))?,
            renderer.render("home", RenderOpts::new())?
        );

        Ok(())
    }

    #[test]
    fn test_view_content() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        let page = renderer.view(
            RenderOpts::new().content("<p>ready</p>"),
            RenderOpts::new().layout_opts(RenderOpts::new().local("title", "Status")),
        )?;
        assert_eq!(page, "<title>Status</title><main><p>ready</p></main>");

        let page = renderer.view(
            RenderOpts::new().content("<p>ready</p>"),
            RenderOpts::new().layout("admin/layout"),
        )?;
        assert_eq!(page, "<div class=\"admin\"><p>ready</p></div>");

        assert!(matches!(
            renderer.view(RenderOpts::new(), RenderOpts::new()),
            Err(Error::NoTemplate)
        ));

        Ok(())
    }

    #[test]
    fn test_layout_gets_no_default_locals() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(
            RenderSettings::new().locals(Locals::from([("title", "from render locals")])),
        )?;

        // Layouts don't see the default render locals, so `title` is undefined.
        assert!(matches!(
            renderer.view(RenderOpts::new().content("x"), RenderOpts::new()),
            Err(Error::UndefinedVariable(name)) if name == "title"
        ));

        Ok(())
    }

    #[test]
    fn test_custom_escaper() -> Result<(), Error> {
        #[derive(Debug)]
        struct Brackets;

        impl crate::template::Escaper for Brackets {
            fn escape(&self, text: &str) -> String {
                text.replace('<', "[").replace('>', "]")
            }
        }

        let app = App::new()?;
        let renderer = app.renderer(
            App::default_settings().escape(true).escaper(Brackets),
        )?;

        let opts = || RenderOpts::new().local("markup", "<b>");
        assert_eq!(
            renderer.render(RenderOpts::new().inline("<%= markup %>"), opts())?,
            "[b]"
        );
        assert_eq!(
            renderer.render(RenderOpts::new().inline("<%== markup %>"), opts())?,
            "<b>"
        );

        Ok(())
    }

    #[test]
    fn test_scope() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?.assign("user", "lev");

        assert_eq!(renderer.render("profile", RenderOpts::new())?, "<p>lev</p>");

        let other = Locals::from([("user", "admin")]);
        assert_eq!(
            renderer.render("profile", RenderOpts::new().scope(other))?,
            "<p>admin</p>"
        );

        Ok(())
    }

    #[test]
    fn test_templates_compiled_once() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        for _ in 0..3 {
            renderer.view("home", RenderOpts::new())?;
        }
        // home.erb and layout.erb.
        assert_eq!(app.counting.count(), 2);

        let first = renderer.template("home", RenderOpts::new())?;
        let second = renderer.template("home", RenderOpts::new())?;
        assert!(Arc::ptr_eq(&first, &second));

        Ok(())
    }

    #[test]
    fn test_inline_cached() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        for i in 0..3 {
            let output = renderer.render(
                RenderOpts::new().inline("<%= n * 2 %>"),
                RenderOpts::new().local("n", i),
            )?;
            assert_eq!(output, (i * 2).to_string());
        }
        assert_eq!(app.counting.count(), 1);

        Ok(())
    }

    #[test]
    fn test_no_cache() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings().cache(false))?;

        renderer.render("home", RenderOpts::new())?;
        renderer.render("home", RenderOpts::new())?;
        assert_eq!(app.counting.count(), 2);

        // Caching turned off for one call.
        let renderer = app.renderer(App::default_settings())?;
        renderer.render("home", RenderOpts::new().cache(false))?;
        renderer.render("home", RenderOpts::new().cache(false))?;
        assert_eq!(app.counting.count(), 4);

        Ok(())
    }

    #[test]
    fn test_template_block_recompiled() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;
        let calls = Arc::new(AtomicUsize::new(0));
        let block = {
            let calls = calls.clone();
            TemplateBlock::new(move || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(format!("call <%= {} %>", n))
            })
        };

        let opts = || RenderOpts::new().path("generated.erb").template_block(block.clone());
        assert_eq!(renderer.render(opts(), RenderOpts::new())?, "call 0");
        assert_eq!(renderer.render(opts(), RenderOpts::new())?, "call 1");

        // Once cached, the block isn't called again.
        let cached = || opts().cache(true);
        assert_eq!(renderer.render(cached(), RenderOpts::new())?, "call 2");
        assert_eq!(renderer.render(cached(), RenderOpts::new())?, "call 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        Ok(())
    }

    #[test]
    fn test_derived_config_doesnt_share_templates() -> Result<(), Error> {
        let app = App::new()?;
        let parent = app.renderer(App::default_settings())?;
        let child = Renderer::new(parent.config().inherit());

        let from_parent = parent.template("home", RenderOpts::new())?;
        let from_child = child.template("home", RenderOpts::new())?;

        assert!(!Arc::ptr_eq(&from_parent, &from_child));
        assert_eq!(app.counting.count(), 2);

        Ok(())
    }

    #[test]
    fn test_compile_error_not_cached() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        assert!(matches!(
            renderer.render("broken", RenderOpts::new()),
            Err(Error::Syntax { .. }) | Err(Error::Eof(_))
        ));
        assert!(renderer.render("broken", RenderOpts::new()).is_err());
        assert_eq!(app.counting.count(), 2);

        assert!(matches!(
            renderer.render("missing", RenderOpts::new()),
            Err(Error::TemplateDoesNotExist(_))
        ));

        Ok(())
    }

    #[test]
    fn test_template_name_override() -> Result<(), Error> {
        struct Admin(Renderer);

        impl Scope for Admin {
            fn ivar(&self, name: &str) -> Option<Value> {
                self.0.ivar(name)
            }
        }

        impl Render for Admin {
            fn render_opts(&self) -> &RenderConfig {
                self.0.render_opts()
            }

            fn template_name(&self, opts: &RenderOpts) -> Result<String, Error> {
                Ok(format!("admin/{}", opts.template.as_deref().unwrap_or_default()))
            }
        }

        let app = App::new()?;
        let admin = Admin(app.renderer(App::default_settings())?);

        let content = || -> Result<String, Error> { Ok("hi".to_string()) };
        let page = admin.render_with("layout", RenderOpts::new(), Some(&content))?;
        assert_eq!(page, "<div class=\"admin\">hi</div>");

        Ok(())
    }

    #[test]
    fn test_parallel_renders() -> Result<(), Error> {
        let app = App::new()?;
        let renderer = app.renderer(App::default_settings())?;

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| renderer.view("home", RenderOpts::new()).expect("view"));
            }
        });

        assert_eq!(app.counting.count(), 2);

        Ok(())
    }
}
