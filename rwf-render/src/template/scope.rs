//! The object a template is evaluated against.
//!
//! Templates read scope variables with the `@name` syntax. By default the scope
//! is whatever called `render` or `view`; a render call can swap it out with
//! [`RenderOpts::scope`](crate::RenderOpts::scope).
use super::{Locals, Value};

/// Object in which context a template is evaluated.
pub trait Scope {
    /// Look up the scope variable `@name`. Unknown variables are `nil`.
    fn ivar(&self, name: &str) -> Option<Value>;
}

impl Scope for Locals {
    fn ivar(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// Scope without any variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyScope;

impl Scope for EmptyScope {
    fn ivar(&self, _name: &str) -> Option<Value> {
        None
    }
}
