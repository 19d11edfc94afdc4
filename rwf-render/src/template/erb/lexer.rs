//! Template lexer, turning template source into tokens.
//!
//! Text outside of `<% %>` tags is passed through as a single [`Token::Text`].
//! Code inside the tags is split into tokens the parser understands.
use super::super::Value;
use super::{Token, TokenWithContext};
use crate::Error;

pub struct Lexer<'a> {
    source: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    path: &'a str,
    tokens: Vec<TokenWithContext>,
}

impl<'a> Lexer<'a> {
    /// Create a lexer. `path` and `line` are only used in error messages.
    pub fn new(source: &str, path: &'a str, line: usize) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line,
            column: 1,
            path,
            tokens: vec![],
        }
    }

    /// Split the template into tokens.
    pub fn tokens(mut self) -> Result<Vec<TokenWithContext>, Error> {
        let mut text = String::new();
        let mut text_start = (self.line, self.column);

        while let Some(c) = self.peek(0) {
            if c == '<' && self.peek(1) == Some('%') {
                // `<%%` is a literal `<%`.
                if self.peek(2) == Some('%') {
                    self.skip(3);
                    text.push_str("<%");
                    continue;
                }

                self.flush_text(&mut text, text_start);
                let (line, column) = (self.line, self.column);
                self.skip(2);

                match self.peek(0) {
                    Some('#') => self.comment()?,
                    Some('=') => {
                        self.advance();
                        let token = if self.peek(0) == Some('=') {
                            self.advance();
                            Token::BlockStartPrintDouble
                        } else {
                            Token::BlockStartPrint
                        };
                        self.push(token, line, column);
                        self.code()?;
                    }
                    _ => {
                        self.push(Token::BlockStart, line, column);
                        self.code()?;
                    }
                }

                text_start = (self.line, self.column);
            } else {
                if text.is_empty() {
                    text_start = (self.line, self.column);
                }
                text.push(c);
                self.advance();
            }
        }

        self.flush_text(&mut text, text_start);

        Ok(self.tokens)
    }

    fn comment(&mut self) -> Result<(), Error> {
        loop {
            match self.peek(0) {
                None => return Err(Error::Eof("comment")),
                Some('%') if self.peek(1) == Some('>') => {
                    self.skip(2);
                    return Ok(());
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn code(&mut self) -> Result<(), Error> {
        loop {
            let (line, column) = (self.line, self.column);
            let c = match self.peek(0) {
                Some(c) => c,
                None => return Err(Error::Eof("code block")),
            };
            let next = self.peek(1);

            match c {
                c if c.is_whitespace() => {
                    self.advance();
                }

                '%' if next == Some('>') => {
                    self.skip(2);
                    self.push(Token::BlockEnd, line, column);
                    return Ok(());
                }

                // `-%>` swallows the newline after the tag.
                '-' if next == Some('%') && self.peek(2) == Some('>') => {
                    self.skip(3);
                    self.push(Token::BlockEnd, line, column);
                    if self.peek(0) == Some('\n') {
                        self.advance();
                    }
                    return Ok(());
                }

                '0'..='9' => {
                    let value = self.number(line, column)?;
                    self.push(Token::Value(value), line, column);
                }

                '"' | '\'' => {
                    let string = self.string(c)?;
                    self.push(Token::Value(Value::String(string)), line, column);
                }

                '@' => {
                    self.advance();
                    let name = self.identifier();
                    if name.is_empty() {
                        return Err(self.syntax(line, column, "expected a variable name after @"));
                    }
                    self.push(Token::Ivar(name), line, column);
                }

                c if c.is_alphabetic() || c == '_' => {
                    let name = self.identifier();
                    let token = match name.as_str() {
                        "if" => Token::If,
                        "elsif" => Token::ElseIf,
                        "else" => Token::Else,
                        "end" => Token::End,
                        "yield" => Token::Yield,
                        "true" => Token::Value(Value::Boolean(true)),
                        "false" => Token::Value(Value::Boolean(false)),
                        "nil" => Token::Value(Value::Null),
                        "and" => Token::And,
                        "or" => Token::Or,
                        "not" => Token::Not,
                        _ => Token::Variable(name),
                    };
                    self.push(token, line, column);
                }

                _ => {
                    let (token, len) = match (c, next) {
                        ('=', Some('=')) => (Token::Equals, 2),
                        ('!', Some('=')) => (Token::NotEquals, 2),
                        ('>', Some('=')) => (Token::GreaterEqualThan, 2),
                        ('<', Some('=')) => (Token::LessEqualThan, 2),
                        ('&', Some('&')) => (Token::And, 2),
                        ('|', Some('|')) => (Token::Or, 2),
                        ('!', _) => (Token::Not, 1),
                        ('>', _) => (Token::GreaterThan, 1),
                        ('<', _) => (Token::LessThan, 1),
                        ('.', _) => (Token::Dot, 1),
                        ('+', _) => (Token::Plus, 1),
                        ('-', _) => (Token::Minus, 1),
                        ('*', _) => (Token::Mult, 1),
                        ('/', _) => (Token::Div, 1),
                        ('(', _) => (Token::RoundBracketStart, 1),
                        (')', _) => (Token::RoundBracketEnd, 1),
                        (c, _) => {
                            return Err(self.syntax(
                                line,
                                column,
                                &format!("unexpected character '{}'", c),
                            ))
                        }
                    };
                    self.skip(len);
                    self.push(token, line, column);
                }
            }
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Value, Error> {
        let mut number = String::new();
        let mut float = false;

        while let Some(c) = self.peek(0) {
            if c.is_ascii_digit() || c == '_' {
                number.push(c);
            } else if c == '.' && !float && self.peek(1).is_some_and(|n| n.is_ascii_digit()) {
                float = true;
                number.push(c);
            } else {
                break;
            }
            self.advance();
        }

        let number = number.replace('_', "");

        if float {
            number
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| self.syntax(line, column, "invalid float"))
        } else {
            number
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| self.syntax(line, column, "invalid integer"))
        }
    }

    fn string(&mut self, quote: char) -> Result<String, Error> {
        let mut string = String::new();
        self.advance();

        loop {
            match self.advance() {
                None => return Err(Error::Eof("string")),
                Some(c) if c == quote => return Ok(string),
                Some('\\') => match self.advance() {
                    Some('n') => string.push('\n'),
                    Some('t') => string.push('\t'),
                    Some(c) => string.push(c),
                    None => return Err(Error::Eof("string")),
                },
                Some(c) => string.push(c),
            }
        }
    }

    fn identifier(&mut self) -> String {
        let mut name = String::new();

        while let Some(c) = self.peek(0) {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Predicate methods, e.g. `empty?`.
        if !name.is_empty() && self.peek(0) == Some('?') {
            name.push('?');
            self.advance();
        }

        name
    }

    fn flush_text(&mut self, text: &mut String, (line, column): (usize, usize)) {
        if !text.is_empty() {
            let token = Token::Text(std::mem::take(text));
            self.push(token, line, column);
        }
    }

    fn push(&mut self, token: Token, line: usize, column: usize) {
        self.tokens.push(TokenWithContext::new(token, line, column));
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;

        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }

    fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn syntax(&self, line: usize, column: usize, message: &str) -> Error {
        Error::Syntax {
            path: self.path.to_string(),
            line,
            column,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tokens(source: &str) -> Result<Vec<Token>, Error> {
        Ok(Lexer::new(source, "test", 1)
            .tokens()?
            .into_iter()
            .map(|t| t.into_token())
            .collect())
    }

    #[test]
    fn test_print() -> Result<(), Error> {
        assert_eq!(
            tokens("<h1><%= 1+1 %></h1>")?,
            vec![
                Token::Text("<h1>".into()),
                Token::BlockStartPrint,
                Token::Value(Value::Integer(1)),
                Token::Plus,
                Token::Value(Value::Integer(1)),
                Token::BlockEnd,
                Token::Text("</h1>".into()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_keywords_and_ivars() -> Result<(), Error> {
        assert_eq!(
            tokens(r#"<% if @user.name == "Ann" %><%== yield %><% end %>"#)?,
            vec![
                Token::BlockStart,
                Token::If,
                Token::Ivar("user".into()),
                Token::Dot,
                Token::Variable("name".into()),
                Token::Equals,
                Token::Value(Value::String("Ann".into())),
                Token::BlockEnd,
                Token::BlockStartPrintDouble,
                Token::Yield,
                Token::BlockEnd,
                Token::BlockStart,
                Token::End,
                Token::BlockEnd,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_comments_and_literal_tags() -> Result<(), Error> {
        assert_eq!(
            tokens("a<%# ignored %>b<%% c")?,
            vec![Token::Text("a".into()), Token::Text("b<% c".into())]
        );
        Ok(())
    }

    #[test]
    fn test_line_numbers() -> Result<(), Error> {
        let tokens = Lexer::new("line one\n<%= x %>", "test", 10).tokens()?;
        assert_eq!(tokens[1].line(), 11);
        assert_eq!(tokens[1].column(), 1);
        assert_eq!(tokens[2].column(), 5);
        Ok(())
    }

    #[test]
    fn test_errors() {
        assert!(matches!(tokens("<%= 1 "), Err(Error::Eof("code block"))));
        assert!(matches!(tokens("<%= \"open %>"), Err(Error::Eof("string"))));
        assert!(matches!(
            tokens("<%= 1 $ 2 %>"),
            Err(Error::Syntax { line: 1, column: 7, .. })
        ));
    }
}
