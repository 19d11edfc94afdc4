//! Layout composition for `view`.
use crate::config::RenderConfig;
use crate::options::{Layout, RenderOpts};

/// Options for rendering the layout around a view, or `None` if the layout is disabled.
///
/// Starts with the configured layout options. Options passed in `layout_opts` win over them,
/// except locals, which are merged: the call's layout locals over the configured layout locals.
/// The `layout` option, or the configured layout, is applied last: a name sets the template,
/// options are merged over everything else.
pub fn view_layout_opts(config: &RenderConfig, opts: &RenderOpts) -> Option<RenderOpts> {
    let layout = opts.layout.as_ref().unwrap_or(config.layout());

    if !layout.enabled() {
        return None;
    }

    let mut layout_opts = config.layout_opts().clone();

    if let Some(call_opts) = &opts.layout_opts {
        let locals = match (&layout_opts.locals, &call_opts.locals) {
            (Some(defaults), Some(locals)) => Some(defaults.merge(locals)),
            _ => None,
        };

        layout_opts = layout_opts.merge(call_opts.as_ref().clone());

        if locals.is_some() {
            layout_opts.locals = locals;
        }
    }

    match layout {
        Layout::Options(options) => layout_opts = layout_opts.merge(options.as_ref().clone()),
        Layout::Template(template) => layout_opts.template = Some(template.clone()),
        Layout::Enabled(_) => (),
    }

    Some(layout_opts)
}
