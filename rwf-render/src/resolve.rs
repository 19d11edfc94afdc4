//! Finding, compiling and caching templates.
//!
//! [`find_template`] turns render options into a template path, a compiler and a cache key.
//! The cache key is the template path when nothing else about the template differs from the
//! configured defaults. When the engine, compiler, compiler options or template block are
//! overridden, they all become part of the key, so two differently compiled templates never
//! share a cache entry.
use tracing::debug;

use std::sync::Arc;

use crate::cache::CacheKey;
use crate::config::RenderConfig;
use crate::options::RenderOpts;
use crate::template::{Artifact, Compiler, CompilerRef, Source, TemplateBlock};
use crate::Error;

/// Builds the template path from resolved options.
pub type TemplatePath<'a> = &'a dyn Fn(&RenderOpts) -> Result<String, Error>;

/// Default template path: `{views}/{template}.{engine}`.
pub fn template_path(opts: &RenderOpts) -> Result<String, Error> {
    let template = opts.template.as_deref().ok_or(Error::NoTemplate)?;

    Ok(format!(
        "{}/{}.{}",
        opts.views.as_deref().unwrap_or_default(),
        template,
        opts.engine.as_deref().unwrap_or_default()
    ))
}

/// Compiler that picks the engine from the template's file extension.
fn by_extension(config: &RenderConfig) -> CompilerRef {
    CompilerRef::from(config.registry().clone() as Arc<dyn Compiler>)
}

/// Set the engine, template path, compiler and cache key in the options.
pub fn find_template(
    config: &RenderConfig,
    mut opts: RenderOpts,
    template_path: TemplatePath,
) -> Result<RenderOpts, Error> {
    let engine_override = opts.engine.take().or_else(|| opts.ext.clone());
    let engine = engine_override
        .clone()
        .unwrap_or_else(|| config.engine().to_string());
    opts.engine = Some(engine.clone());

    let inline = opts.inline.clone();

    let (path, template_class) = match &inline {
        Some(source) => {
            let compiler = match opts.template_class.clone() {
                Some(compiler) => compiler,
                None => config
                    .registry()
                    .lookup(&engine)
                    .ok_or_else(|| Error::UnknownEngine(engine.clone()))?,
            };

            opts.path = Some(source.clone());
            opts.template_class = Some(compiler.clone());
            opts.template_block = Some(TemplateBlock::constant(source));

            (source.clone(), Some(compiler))
        }

        None => {
            if opts.views.is_none() {
                opts.views = Some(config.views().to_string());
            }

            let path = match opts.path.clone() {
                Some(path) => path,
                None => template_path(&opts)?,
            };
            opts.path = Some(path.clone());

            let template_class = opts.template_class.clone();
            if template_class.is_none() {
                opts.template_class = Some(by_extension(config));
            }

            (path, template_class)
        }
    };

    if config.cache().is_some() {
        // Template blocks may return something different every time,
        // so they're only cached if asked to.
        let cache = opts
            .cache
            .unwrap_or(inline.is_some() || opts.template_block.is_none());

        if cache {
            if opts.cache_key.is_none() {
                let template_block = match inline {
                    Some(_) => None,
                    None => opts.template_block.clone(),
                };
                let template_opts = opts.template_opts.clone();

                let key = if template_class.is_some()
                    || engine_override.is_some()
                    || template_opts.is_some()
                    || template_block.is_some()
                {
                    CacheKey::Composite {
                        path,
                        template_class,
                        engine: engine_override,
                        template_opts,
                        template_block,
                    }
                } else {
                    CacheKey::Path(path)
                };

                opts.cache_key = Some(key);
            }
        } else {
            opts.cache_key = None;
        }
    }

    Ok(opts)
}

/// Compile the template described by resolved options.
///
/// Compiler options are the configured ones, then the engine-specific ones,
/// then the ones passed to the render call.
pub fn compile_template(config: &RenderConfig, opts: &RenderOpts) -> Result<Arc<dyn Artifact>, Error> {
    let engine = opts.engine.as_deref().unwrap_or(config.engine());
    let path = opts.path.as_deref().ok_or(Error::NoTemplate)?;

    let mut template_opts = config.template_opts().clone();
    if let Some(engine_opts) = config.engine_opts(engine) {
        template_opts = template_opts.merge(engine_opts);
    }
    if let Some(call_opts) = &opts.template_opts {
        template_opts = template_opts.merge(call_opts);
    }

    let compiler = match &opts.template_class {
        Some(compiler) => compiler.clone(),
        None => by_extension(config),
    };

    debug!(
        "compiling template \"{}\"",
        if opts.inline.is_some() { "inline" } else { path }
    );

    compiler.compile(&Source {
        path,
        line: 1,
        options: &template_opts,
        block: opts.template_block.as_ref(),
        escaper: config.escaper(),
    })
}

/// Get the compiled template, from the cache if possible.
///
/// Returns the template and the options it should be rendered with. When the caller already
/// supplied a cache key, finding the template is skipped unless it's not in the cache yet.
pub fn retrieve_template(
    config: &RenderConfig,
    opts: RenderOpts,
    template_path: TemplatePath,
) -> Result<(Arc<dyn Artifact>, RenderOpts), Error> {
    let found = !(opts.cache_key.is_some() && opts.cache != Some(false));
    let opts = if found {
        find_template(config, opts, template_path)?
    } else {
        opts
    };

    let compile = || -> Result<Arc<dyn Artifact>, Error> {
        if found {
            compile_template(config, &opts)
        } else {
            let resolved = find_template(config, opts.clone(), template_path)?;
            compile_template(config, &resolved)
        }
    };

    let template = match (config.cache(), &opts.cache_key) {
        (Some(cache), Some(key)) => cache.get_or_compile(key, &compile)?,
        _ => compile()?,
    };

    Ok((template, opts))
}
