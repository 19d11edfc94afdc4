//! Compiled template cache.
//!
//! Using the cache ensures that templates are only compiled once, increasing their
//! execution speed considerably. Each render configuration owns its own cache; derived
//! configurations get a fresh one. Entries are never evicted or replaced.
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::{debug, trace};

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::template::{Artifact, CompilerRef, TemplateBlock, TemplateOpts};
use crate::Error;

/// Identifies a compiled template in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Only the path, used when nothing else about the template differs from the defaults.
    Path(String),
    /// Path and every option that changes how the template is compiled.
    Composite {
        path: String,
        template_class: Option<CompilerRef>,
        engine: Option<String>,
        template_opts: Option<TemplateOpts>,
        template_block: Option<TemplateBlock>,
    },
    /// Key supplied by the caller.
    Explicit(String),
}

/// Template cache.
pub trait Cache: Debug + Send + Sync {
    /// Get a template, if it's been compiled already.
    fn get(&self, key: &CacheKey) -> Option<Arc<dyn Artifact>>;

    /// Get a template, compiling it if it's not in the cache yet.
    ///
    /// `compile` runs at most once per key, and a failed compilation leaves nothing behind.
    fn get_or_compile(
        &self,
        key: &CacheKey,
        compile: &dyn Fn() -> Result<Arc<dyn Artifact>, Error>,
    ) -> Result<Arc<dyn Artifact>, Error>;

    /// Number of compiled templates.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates a new cache for a configuration.
#[derive(Clone)]
pub struct CacheClass(Arc<dyn Fn() -> Arc<dyn Cache> + Send + Sync>);

impl CacheClass {
    pub fn new(f: impl Fn() -> Arc<dyn Cache> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Construct a new, empty, cache.
    pub fn build(&self) -> Arc<dyn Cache> {
        (self.0)()
    }
}

impl Default for CacheClass {
    fn default() -> Self {
        Self::new(|| Arc::new(TemplateCache::new()))
    }
}

impl Debug for CacheClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CacheClass(..)")
    }
}

type Entry = Arc<OnceCell<Arc<dyn Artifact>>>;

/// Thread-safe template cache.
///
/// The map lock is only held to find the entry; compilation happens outside of it,
/// so compiling one template doesn't block lookups of others. Callers compiling the same
/// template wait for the first one to finish instead of compiling it again.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: Mutex<HashMap<CacheKey, Entry>>,
}

impl TemplateCache {
    /// Create new empty template cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &CacheKey) -> Entry {
        self.templates
            .lock()
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

impl Cache for TemplateCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<dyn Artifact>> {
        self.templates
            .lock()
            .get(key)
            .and_then(|entry| entry.get().cloned())
    }

    fn get_or_compile(
        &self,
        key: &CacheKey,
        compile: &dyn Fn() -> Result<Arc<dyn Artifact>, Error>,
    ) -> Result<Arc<dyn Artifact>, Error> {
        let entry = self.entry(key);

        if let Some(template) = entry.get() {
            trace!("template cache hit: {:?}", key);
            return Ok(template.clone());
        }

        let template = entry
            .get_or_try_init(|| {
                debug!("compiling template for cache: {:?}", key);
                compile()
            })
            .cloned();

        // Don't keep empty entries for templates that fail to compile.
        if template.is_err() {
            let mut templates = self.templates.lock();
            let empty = templates
                .get(key)
                .map(|current| Arc::ptr_eq(current, &entry) && current.get().is_none())
                .unwrap_or(false);
            if empty {
                templates.remove(key);
            }
        }

        template
    }

    fn len(&self) -> usize {
        self.templates
            .lock()
            .values()
            .filter(|entry| entry.get().is_some())
            .count()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::{Locals, Scope};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Fixed(&'static str);

    impl Artifact for Fixed {
        fn render(
            &self,
            _scope: &dyn Scope,
            _locals: &Locals,
            _content: Option<crate::template::Content>,
        ) -> Result<String, Error> {
            Ok(self.0.to_string())
        }
    }

    fn key(path: &str) -> CacheKey {
        CacheKey::Path(path.to_string())
    }

    #[test]
    fn test_compiles_once() -> Result<(), Error> {
        let cache = TemplateCache::new();
        let compiled = AtomicUsize::new(0);
        let compile = || -> Result<Arc<dyn Artifact>, Error> {
            compiled.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Fixed("home")))
        };

        let first = cache.get_or_compile(&key("/views/home.erb"), &compile)?;
        let second = cache.get_or_compile(&key("/views/home.erb"), &compile)?;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(compiled.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("/views/home.erb")).is_some());
        assert!(cache.get(&key("/views/other.erb")).is_none());

        Ok(())
    }

    #[test]
    fn test_failed_compile_not_cached() -> Result<(), Error> {
        let cache = TemplateCache::new();
        let fail = || -> Result<Arc<dyn Artifact>, Error> { Err(Error::NoTemplate) };

        assert!(cache.get_or_compile(&key("/views/broken.erb"), &fail).is_err());
        assert!(cache.get(&key("/views/broken.erb")).is_none());
        assert!(cache.is_empty());
        assert!(cache.templates.lock().is_empty());

        let ok = || -> Result<Arc<dyn Artifact>, Error> { Ok(Arc::new(Fixed("fixed"))) };
        cache.get_or_compile(&key("/views/broken.erb"), &ok)?;
        assert_eq!(cache.len(), 1);

        Ok(())
    }

    #[test]
    fn test_concurrent_compile_once() {
        let cache = TemplateCache::new();
        let compiled = AtomicUsize::new(0);
        let compile = || -> Result<Arc<dyn Artifact>, Error> {
            compiled.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(Arc::new(Fixed("slow")))
        };

        let templates = std::thread::scope(|s| {
            let handles = (0..8)
                .map(|_| s.spawn(|| cache.get_or_compile(&key("/views/slow.erb"), &compile)))
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|h| h.join().expect("thread").expect("template"))
                .collect::<Vec<_>>()
        });

        assert_eq!(compiled.load(Ordering::SeqCst), 1);
        for template in &templates {
            assert!(Arc::ptr_eq(template, &templates[0]));
        }
    }

    #[test]
    fn test_composite_keys_differ() {
        let composite = |engine: Option<&str>| CacheKey::Composite {
            path: "/views/home.erb".into(),
            template_class: None,
            engine: engine.map(|e| e.to_string()),
            template_opts: None,
            template_block: None,
        };

        assert_eq!(composite(Some("erb")), composite(Some("erb")));
        assert_ne!(composite(Some("erb")), composite(Some("html.erb")));
        assert_ne!(composite(None), key("/views/home.erb"));
        assert_ne!(
            CacheKey::Explicit("/views/home.erb".into()),
            key("/views/home.erb")
        );
    }
}
