//! Types and traits needed to render templates.
//!
//! ```
//! use rwf_render::prelude::*;
//! ```
pub use crate::cache::{Cache, CacheClass, CacheKey};
pub use crate::config::{AppEnv, RenderConfig, RenderSettings};
pub use crate::error::Error;
pub use crate::logging::Logger;
pub use crate::options::{Layout, RenderOpts, Target};
pub use crate::template::{Locals, Scope, TemplateBlock, TemplateOpts, ToValue, Value};
pub use crate::view::{Render, Renderer};
