//! Template rendering for Rwf applications.
//!
//! Renders templates from a views directory, inline source or a block, optionally wrapped in a
//! layout. Compiled templates are cached per configuration, so each template is compiled once
//! no matter how many threads render it at the same time.
//!
//! ```
//! use rwf_render::prelude::*;
//!
//! let config = RenderSettings::new()
//!     .layout(RenderOpts::new().inline("<main><%= yield %></main>"))
//!     .locals(Locals::from([("greeting", "Hello")]))
//!     .build(&AppEnv::new("/app"))
//!     .unwrap();
//!
//! let renderer = Renderer::new(config);
//! let page = renderer
//!     .view(RenderOpts::new().inline("<h1><%= greeting %>, <%= name %></h1>"), RenderOpts::new().local("name", "Rwf"))
//!     .unwrap();
//!
//! assert_eq!(page, "<main><h1>Hello, Rwf</h1></main>");
//! ```
//!
//! Templates are looked up in `{views}/{template}.{engine}`, so `renderer.view("home", RenderOpts::new())`
//! renders `views/home.erb` inside `views/layout.erb`.
pub mod cache;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod options;
pub mod prelude;
pub mod resolve;
pub mod template;
pub mod view;

pub use cache::{Cache, CacheClass, CacheKey, TemplateCache};
pub use config::{AppEnv, RenderConfig, RenderSettings};
pub use error::Error;
pub use logging::Logger;
pub use options::{Layout, RenderOpts, Target};
pub use view::{Render, Renderer};
