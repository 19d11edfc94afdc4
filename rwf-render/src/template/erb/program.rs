//! Executable template.
//!
//! A program is a list of statements.
use super::super::{Content, Escaper, Locals, Scope, Value};
use super::{Expression, Lexer, Token, TokenWithContext};
use crate::Error;

/// What a program is evaluated against.
pub struct Env<'a> {
    pub scope: &'a dyn Scope,
    pub locals: &'a Locals,
    pub content: Option<Content<'a>>,
    pub escaper: &'a dyn Escaper,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Text(String),
    Print {
        expression: Expression,
        escape: bool,
    },
    If {
        branches: Vec<(Expression, Vec<Statement>)>,
        otherwise: Vec<Statement>,
    },
}

impl Statement {
    pub fn evaluate(&self, env: &Env, output: &mut String) -> Result<(), Error> {
        match self {
            Statement::Text(text) => output.push_str(text),

            Statement::Print { expression, escape } => match expression.evaluate(env)? {
                Value::Safe(text) => output.push_str(&text),
                value if *escape => output.push_str(&env.escaper.escape(&value.to_string())),
                value => output.push_str(&value.to_string()),
            },

            Statement::If {
                branches,
                otherwise,
            } => {
                let mut body = otherwise;

                for (condition, statements) in branches {
                    if condition.evaluate(env)?.truthy() {
                        body = statements;
                        break;
                    }
                }

                for statement in body {
                    statement.evaluate(env, output)?;
                }
            }
        }

        Ok(())
    }
}

/// Token stream with a cursor.
pub struct Parser {
    tokens: Vec<TokenWithContext>,
    pos: usize,
    path: String,
}

impl Parser {
    pub fn new(tokens: Vec<TokenWithContext>, path: &str) -> Self {
        Self {
            tokens,
            pos: 0,
            path: path.to_string(),
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| t.token())
    }

    pub fn next(&mut self) -> Option<TokenWithContext> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Next token, failing if the template ended while parsing `what`.
    pub fn expect_next(&mut self, what: &'static str) -> Result<TokenWithContext, Error> {
        self.next().ok_or(Error::Eof(what))
    }

    pub fn expect(&mut self, expected: Token, what: &'static str) -> Result<(), Error> {
        let token = self.expect_next(what)?;

        if token.token() == &expected {
            Ok(())
        } else {
            Err(self.error(
                &token,
                format!("expected \"{}\", found \"{}\"", expected, token.token()),
            ))
        }
    }

    pub fn unexpected(&self, token: &TokenWithContext) -> Error {
        self.error(token, format!("unexpected \"{}\"", token.token()))
    }

    fn error(&self, token: &TokenWithContext, message: String) -> Error {
        Error::Syntax {
            path: self.path.clone(),
            line: token.line(),
            column: token.column(),
            message,
        }
    }

    /// Parse statements until the end of the template or until a
    /// `<% elsif %>`, `<% else %>` or `<% end %>` tag, which is returned
    /// with the `<%` already consumed.
    fn statements(
        &mut self,
        escape: bool,
    ) -> Result<(Vec<Statement>, Option<TokenWithContext>), Error> {
        let mut statements = vec![];

        while let Some(token) = self.next() {
            match token.token() {
                Token::Text(text) => statements.push(Statement::Text(text.clone())),

                Token::BlockStartPrint | Token::BlockStartPrintDouble => {
                    let double = token.token() == &Token::BlockStartPrintDouble;
                    let expression = Expression::parse(self)?;
                    self.expect(Token::BlockEnd, "print")?;

                    statements.push(Statement::Print {
                        expression,
                        // `<%==` does the opposite of `<%=`.
                        escape: escape != double,
                    });
                }

                Token::BlockStart => {
                    let keyword = self.expect_next("code block")?;

                    if matches!(keyword.token(), Token::ElseIf | Token::Else | Token::End) {
                        return Ok((statements, Some(keyword)));
                    }

                    match keyword.token() {
                        Token::If => {
                            let condition = Expression::parse(self)?;
                            self.expect(Token::BlockEnd, "if")?;
                            statements.push(self.if_statement(condition, escape)?);
                        }

                        _ => return Err(self.unexpected(&keyword)),
                    }
                }

                _ => return Err(self.unexpected(&token)),
            }
        }

        Ok((statements, None))
    }

    fn if_statement(&mut self, condition: Expression, escape: bool) -> Result<Statement, Error> {
        let mut branches = vec![];
        let mut condition = condition;

        loop {
            let (body, terminator) = self.statements(escape)?;
            branches.push((condition, body));

            let terminator = terminator.ok_or(Error::Eof("if"))?;

            match terminator.token() {
                Token::ElseIf => {
                    condition = Expression::parse(self)?;
                    self.expect(Token::BlockEnd, "elsif")?;
                }

                Token::Else => {
                    self.expect(Token::BlockEnd, "else")?;
                    let (otherwise, terminator) = self.statements(escape)?;
                    let terminator = terminator.ok_or(Error::Eof("else"))?;

                    if terminator.token() != &Token::End {
                        return Err(self.unexpected(&terminator));
                    }
                    self.expect(Token::BlockEnd, "end")?;

                    return Ok(Statement::If {
                        branches,
                        otherwise,
                    });
                }

                _ => {
                    self.expect(Token::BlockEnd, "end")?;

                    return Ok(Statement::If {
                        branches,
                        otherwise: vec![],
                    });
                }
            }
        }
    }
}

/// Executable program.
#[derive(Debug, Clone)]
pub struct Program {
    statements: Vec<Statement>,
}

impl Program {
    /// Evaluate the program.
    pub fn evaluate(&self, env: &Env) -> Result<String, Error> {
        let mut output = String::new();

        for statement in &self.statements {
            statement.evaluate(env, &mut output)?;
        }

        Ok(output)
    }

    /// Parse the program from a list of tokens.
    ///
    /// With `escape` set, `<%= %>` escapes its output and `<%== %>` doesn't;
    /// without it, it's the other way around.
    pub fn parse(tokens: Vec<TokenWithContext>, path: &str, escape: bool) -> Result<Self, Error> {
        let mut parser = Parser::new(tokens, path);
        let (statements, terminator) = parser.statements(escape)?;

        if let Some(token) = terminator {
            return Err(parser.unexpected(&token));
        }

        Ok(Program { statements })
    }

    /// Compile the program from source.
    pub fn from_str(source: &str, path: &str, line: usize, escape: bool) -> Result<Self, Error> {
        let tokens = Lexer::new(source, path, line).tokens()?;
        Program::parse(tokens, path, escape)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::HtmlEscaper;

    fn render(source: &str, locals: &Locals, escape: bool) -> Result<String, Error> {
        Program::from_str(source, "test", 1, escape)?.evaluate(&Env {
            scope: locals,
            locals,
            content: None,
            escaper: &HtmlEscaper,
        })
    }

    #[test]
    fn test_basic_program() -> Result<(), Error> {
        let output = render(
            "<html><body><% if 1 == 4 %>world is great<% else %>not so much<% end %></body></html>",
            &Locals::new(),
            false,
        )?;
        assert_eq!("<html><body>not so much</body></html>", output);
        Ok(())
    }

    #[test]
    fn test_elsif() -> Result<(), Error> {
        let source = "<% if n > 10 %>big<% elsif n > 5 %>medium<% else %>small<% end %>";

        assert_eq!(render(source, &Locals::from([("n", 11)]), false)?, "big");
        assert_eq!(render(source, &Locals::from([("n", 6)]), false)?, "medium");
        assert_eq!(render(source, &Locals::from([("n", 1)]), false)?, "small");
        Ok(())
    }

    #[test]
    fn test_escaping_modes() -> Result<(), Error> {
        let locals = Locals::from([("html", "<b>")]);

        assert_eq!(render("<%= html %>|<%== html %>", &locals, false)?, "<b>|&lt;b&gt;");
        assert_eq!(render("<%= html %>|<%== html %>", &locals, true)?, "&lt;b&gt;|<b>");

        let mut safe = Locals::new();
        safe.set("html", Value::safe("<b>"));
        assert_eq!(render("<%= html %>", &safe, true)?, "<b>");
        Ok(())
    }

    #[test]
    fn test_scope_variables() -> Result<(), Error> {
        let scope = Locals::from([("title", "Home")]);
        let output = Program::from_str("<%= @title %>:<%= @missing %>", "test", 1, false)?
            .evaluate(&Env {
                scope: &scope,
                locals: &Locals::new(),
                content: None,
                escaper: &HtmlEscaper,
            })?;

        assert_eq!(output, "Home:");
        Ok(())
    }

    #[test]
    fn test_unclosed_if() {
        assert!(matches!(
            render("<% if true %>open", &Locals::new(), false),
            Err(Error::Eof("if"))
        ));
        assert!(matches!(
            render("<% end %>", &Locals::new(), false),
            Err(Error::Syntax { .. })
        ));
    }
}
