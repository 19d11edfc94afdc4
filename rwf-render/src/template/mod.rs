//! Boundary to the template compilers.
//!
//! A [`Compiler`] turns a template path (or a block producing the template source) into an
//! [`Artifact`], which is then rendered any number of times against a [`Scope`] and [`Locals`].
//! Compilers are looked up by engine name in a [`Registry`]; the registry itself is also a
//! compiler which picks the engine from the template's file extension.
//!
//! # Example
//!
//! ```
//! # use rwf_render::template::*;
//! # use std::sync::Arc;
//! let registry = Registry::default();
//! let erb = registry.lookup("erb").unwrap();
//! let block = TemplateBlock::constant("<h1><%= title %></h1>");
//! let escaper: Arc<dyn Escaper> = Arc::new(HtmlEscaper);
//!
//! let template = erb.compile(&Source {
//!     path: "inline",
//!     line: 1,
//!     options: &TemplateOpts::new(),
//!     block: Some(&block),
//!     escaper: &escaper,
//! }).unwrap();
//!
//! let locals = Locals::from([("title", "Hello from Rwf!")]);
//! let rendered = template.render(&EmptyScope, &locals, None).unwrap();
//!
//! assert_eq!(rendered, "<h1>Hello from Rwf!</h1>");
//! ```
pub mod erb;
pub mod escape;
pub mod scope;
pub mod value;

pub use erb::Erb;
pub use escape::{Escaper, HtmlEscaper};
pub use scope::{EmptyScope, Scope};
pub use value::{Locals, ToValue, Value};

use serde::Deserialize;

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::Error;

/// Content block passed to a template, returned by `yield`.
pub type Content<'a> = &'a dyn Fn() -> Result<String, Error>;

/// A compiled template.
///
/// Rendering must not mutate the artifact, the same artifact is shared
/// by every render call that hits the same cache entry.
pub trait Artifact: Debug + Send + Sync {
    fn render(
        &self,
        scope: &dyn Scope,
        locals: &Locals,
        content: Option<Content>,
    ) -> Result<String, Error>;
}

/// Everything a compiler needs to build an artifact.
#[derive(Debug)]
pub struct Source<'a> {
    /// Template path, or the template source itself for inline templates.
    pub path: &'a str,
    /// Line number the template starts on, used in error messages.
    pub line: usize,
    pub options: &'a TemplateOpts,
    /// When set, the template source comes from the block instead of the file at `path`.
    pub block: Option<&'a TemplateBlock>,
    pub escaper: &'a Arc<dyn Escaper>,
}

impl Source<'_> {
    /// Read the template source, from the block if there is one, or from disk.
    pub fn read(&self) -> Result<String, Error> {
        match self.block {
            Some(block) => block.call(),
            None => std::fs::read_to_string(self.path)
                .map_err(|_| Error::TemplateDoesNotExist(self.path.into())),
        }
    }
}

/// Template compiler, e.g. ERB.
pub trait Compiler: Debug + Send + Sync {
    fn compile(&self, source: &Source) -> Result<Arc<dyn Artifact>, Error>;
}

/// Shared handle to a compiler.
///
/// Two handles are equal only if they point to the same compiler instance.
#[derive(Clone)]
pub struct CompilerRef(Arc<dyn Compiler>);

impl CompilerRef {
    pub fn new(compiler: impl Compiler + 'static) -> Self {
        Self(Arc::new(compiler))
    }

    pub fn compile(&self, source: &Source) -> Result<Arc<dyn Artifact>, Error> {
        self.0.compile(source)
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl From<Arc<dyn Compiler>> for CompilerRef {
    fn from(compiler: Arc<dyn Compiler>) -> Self {
        Self(compiler)
    }
}

impl PartialEq for CompilerRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for CompilerRef {}

impl Hash for CompilerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl Debug for CompilerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CompilerRef({:?})", self.0)
    }
}

/// Block producing the template source at compile time.
///
/// Identity is by instance: two blocks are equal only if one is a clone of the other.
#[derive(Clone)]
pub struct TemplateBlock(Arc<dyn Fn() -> Result<String, Error> + Send + Sync>);

impl TemplateBlock {
    pub fn new(f: impl Fn() -> Result<String, Error> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Block that always returns the given source.
    pub fn constant(source: impl ToString) -> Self {
        let source = source.to_string();
        Self::new(move || Ok(source.clone()))
    }

    pub fn call(&self) -> Result<String, Error> {
        (self.0)()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for TemplateBlock {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for TemplateBlock {}

impl Hash for TemplateBlock {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl Debug for TemplateBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TemplateBlock({:#x})", self.addr())
    }
}

/// A single compiler option value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(untagged)]
pub enum Setting {
    Bool(bool),
    Integer(i64),
    String(String),
}

impl From<bool> for Setting {
    fn from(value: bool) -> Self {
        Setting::Bool(value)
    }
}

impl From<i64> for Setting {
    fn from(value: i64) -> Self {
        Setting::Integer(value)
    }
}

impl From<&str> for Setting {
    fn from(value: &str) -> Self {
        Setting::String(value.to_string())
    }
}

impl From<String> for Setting {
    fn from(value: String) -> Self {
        Setting::String(value)
    }
}

/// Options handed to the compiler, e.g. `outvar` or `escape`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct TemplateOpts {
    options: BTreeMap<String, Setting>,
}

impl TemplateOpts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Setting>) -> &mut Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Builder-style [`TemplateOpts::set`].
    pub fn with(mut self, key: &str, value: impl Into<Setting>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Setting> {
        self.options.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.options.get(key), Some(Setting::Bool(true)))
    }

    /// Return a copy of these options with `other` merged on top.
    pub fn merge(&self, other: &TemplateOpts) -> TemplateOpts {
        let mut options = self.options.clone();
        options.extend(other.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        TemplateOpts { options }
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Compilers by engine name.
#[derive(Debug, Clone)]
pub struct Registry {
    compilers: HashMap<String, CompilerRef>,
}

impl Default for Registry {
    /// Registry with the built-in compilers.
    fn default() -> Self {
        Self::new().register("erb", Erb)
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            compilers: HashMap::new(),
        }
    }

    /// Register a compiler for the engine, replacing any previous one.
    pub fn register(mut self, engine: &str, compiler: impl Compiler + 'static) -> Self {
        self.compilers
            .insert(engine.to_string(), CompilerRef::new(compiler));
        self
    }

    /// Find the compiler registered for the engine.
    pub fn lookup(&self, engine: &str) -> Option<CompilerRef> {
        self.compilers.get(engine).cloned()
    }

    /// Find the compiler for a template path, using the longest registered
    /// extension, e.g. `home.html.erb` tries `html.erb` first, then `erb`.
    pub fn for_path(&self, path: &str) -> Result<CompilerRef, Error> {
        let name = path.rsplit('/').next().unwrap_or(path);

        for (i, c) in name.char_indices() {
            if c == '.' {
                if let Some(compiler) = self.lookup(&name[i + 1..]) {
                    return Ok(compiler);
                }
            }
        }

        let extension = name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        Err(Error::UnknownEngine(extension.to_string()))
    }
}

impl Compiler for Registry {
    fn compile(&self, source: &Source) -> Result<Arc<dyn Artifact>, Error> {
        self.for_path(source.path)?.compile(source)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct Upcase;

    impl Compiler for Upcase {
        fn compile(&self, source: &Source) -> Result<Arc<dyn Artifact>, Error> {
            Erb.compile(source)
        }
    }

    #[test]
    fn test_registry_longest_extension() -> Result<(), Error> {
        let registry = Registry::default().register("html.erb", Upcase);
        let html = registry.lookup("html.erb").expect("html.erb");
        let erb = registry.lookup("erb").expect("erb");

        assert_eq!(registry.for_path("/app/views/home.html.erb")?, html);
        assert_eq!(registry.for_path("/app/views/home.erb")?, erb);
        assert_ne!(html, erb);

        match registry.for_path("/app/views/home.haml") {
            Err(Error::UnknownEngine(ext)) => assert_eq!(ext, "haml"),
            other => panic!("expected unknown engine, got {:?}", other),
        }

        Ok(())
    }

    #[test]
    fn test_lookup_returns_same_instance() {
        let registry = Registry::default();
        assert_eq!(registry.lookup("erb"), registry.lookup("erb"));
        assert!(registry.lookup("haml").is_none());
    }

    #[test]
    fn test_template_block_identity() -> Result<(), Error> {
        let a = TemplateBlock::constant("hello");
        let b = TemplateBlock::constant("hello");

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.call()?, "hello");

        Ok(())
    }

    #[test]
    fn test_template_opts_merge() {
        let global = TemplateOpts::new()
            .with("outvar", "@_out_buf")
            .with("escape", false);
        let call = TemplateOpts::new().with("escape", true);

        let merged = global.merge(&call);

        assert!(merged.get_bool("escape"));
        assert_eq!(merged.get("outvar"), Some(&Setting::from("@_out_buf")));
        assert!(!global.get_bool("escape"));
    }

    #[test]
    fn test_missing_file() {
        let escaper: Arc<dyn Escaper> = Arc::new(HtmlEscaper);
        let source = Source {
            path: "/does/not/exist.erb",
            line: 1,
            options: &TemplateOpts::new(),
            block: None,
            escaper: &escaper,
        };

        assert!(matches!(
            source.read(),
            Err(Error::TemplateDoesNotExist(_))
        ));
    }
}
