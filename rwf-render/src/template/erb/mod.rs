//! Built-in ERB compiler.
//!
//! Supports the subset of ERB that views typically use:
//!
//! - `<%= expression %>` prints the expression,
//! - `<%== expression %>` prints it with the opposite escaping,
//! - `<% if %>`, `<% elsif %>`, `<% else %>` and `<% end %>`,
//! - `<%# comments %>` and `<%%` for a literal `<%`,
//! - `yield` to print the content block, e.g. inside a layout.
//!
//! Local variables are referenced by name, scope variables with `@name`.
//!
//! When the `escape` compiler option is set, `<%= %>` escapes its output with the configured
//! escaper and `<%== %>` prints it raw. Without it, `<%= %>` prints raw and `<%== %>` escapes.
pub mod expression;
pub mod lexer;
pub mod program;
pub mod token;

pub use expression::{Expression, Op, Term};
pub use lexer::Lexer;
pub use program::{Env, Parser, Program, Statement};
pub use token::{Token, TokenWithContext};

use super::{Artifact, Compiler, Content, Escaper, Locals, Scope, Setting, Source};
use crate::Error;

use std::sync::Arc;

/// ERB compiler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Erb;

impl Compiler for Erb {
    fn compile(&self, source: &Source) -> Result<Arc<dyn Artifact>, Error> {
        if let Some(Setting::String(encoding)) = source.options.get("default_encoding") {
            if !encoding.eq_ignore_ascii_case("utf-8") {
                return Err(Error::Runtime(format!(
                    "erb templates must be UTF-8, got \"{}\"",
                    encoding
                )));
            }
        }

        let text = source.read()?;
        let escape = source.options.get_bool("escape");
        let program = Program::from_str(&text, source.path, source.line, escape)?;

        Ok(Arc::new(ErbTemplate {
            program,
            path: source.path.to_string(),
            escaper: source.escaper.clone(),
        }))
    }
}

/// Compiled ERB template.
#[derive(Debug)]
pub struct ErbTemplate {
    program: Program,
    path: String,
    escaper: Arc<dyn Escaper>,
}

impl ErbTemplate {
    /// Path the template was compiled from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Artifact for ErbTemplate {
    fn render(
        &self,
        scope: &dyn Scope,
        locals: &Locals,
        content: Option<Content>,
    ) -> Result<String, Error> {
        self.program.evaluate(&Env {
            scope,
            locals,
            content,
            escaper: self.escaper.as_ref(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::{EmptyScope, HtmlEscaper, TemplateBlock, TemplateOpts};

    fn compile(text: &str, options: &TemplateOpts) -> Result<Arc<dyn Artifact>, Error> {
        let escaper: Arc<dyn Escaper> = Arc::new(HtmlEscaper);
        let block = TemplateBlock::constant(text);

        Erb.compile(&Source {
            path: "inline",
            line: 1,
            options,
            block: Some(&block),
            escaper: &escaper,
        })
    }

    #[test]
    fn test_layout_yield() -> Result<(), Error> {
        let layout = compile("<main><%= yield %></main>", &TemplateOpts::new())?;
        let content = || -> Result<String, Error> { Ok("<p>hello</p>".to_string()) };

        let output = layout.render(&EmptyScope, &Locals::new(), Some(&content))?;
        assert_eq!(output, "<main><p>hello</p></main>");

        // Content isn't escaped again in escaping mode.
        let layout = compile(
            "<main><%= yield %></main>",
            &TemplateOpts::new().with("escape", true),
        )?;
        let output = layout.render(&EmptyScope, &Locals::new(), Some(&content))?;
        assert_eq!(output, "<main><p>hello</p></main>");

        Ok(())
    }

    #[test]
    fn test_render_is_repeatable() -> Result<(), Error> {
        let template = compile("<%= a + b %>", &TemplateOpts::new())?;
        let locals = Locals::from([("a", 1), ("b", 2)]);

        let first = template.render(&EmptyScope, &locals, None)?;
        let second = template.render(&EmptyScope, &locals, None)?;

        assert_eq!(first, "3");
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_encoding() {
        let options = TemplateOpts::new().with("default_encoding", "ISO-8859-1");
        assert!(matches!(compile("hello", &options), Err(Error::Runtime(_))));

        let options = TemplateOpts::new().with("default_encoding", "UTF-8");
        assert!(compile("hello", &options).is_ok());
    }
}
