use super::super::Value;

/// A template language token, e.g. `if` or `<%=`.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    // e.g. `<html><body></body></html>`
    Text(String),
    // e.g. `<% logged_in %>`
    Variable(String),
    // e.g. `<%= @title %>`
    Ivar(String),
    // e.g. `<% 5 %>` or `<% "hello" %>`
    Value(Value),
    If,
    ElseIf,
    Else,
    End,
    Yield,
    // `<%`
    BlockStart,
    // `<%=`
    BlockStartPrint,
    // `<%==`
    BlockStartPrintDouble,
    // `%>`
    BlockEnd,
    Dot,
    And,
    Or,
    Not,
    Plus,
    Minus,
    Mult,
    Div,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterEqualThan,
    LessThan,
    LessEqualThan,
    RoundBracketStart,
    RoundBracketEnd,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Token::Text(_) => "text",
            Token::Variable(name) | Token::Ivar(name) => name,
            Token::Value(_) => "value",
            Token::If => "if",
            Token::ElseIf => "elsif",
            Token::Else => "else",
            Token::End => "end",
            Token::Yield => "yield",
            Token::BlockStart => "<%",
            Token::BlockStartPrint => "<%=",
            Token::BlockStartPrintDouble => "<%==",
            Token::BlockEnd => "%>",
            Token::Dot => ".",
            Token::And => "&&",
            Token::Or => "||",
            Token::Not => "!",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Mult => "*",
            Token::Div => "/",
            Token::Equals => "==",
            Token::NotEquals => "!=",
            Token::GreaterThan => ">",
            Token::GreaterEqualThan => ">=",
            Token::LessThan => "<",
            Token::LessEqualThan => "<=",
            Token::RoundBracketStart => "(",
            Token::RoundBracketEnd => ")",
        };

        write!(f, "{}", s)
    }
}

/// Token with its position in the template source.
#[derive(Debug, PartialEq, Clone)]
pub struct TokenWithContext {
    token: Token,
    line: usize,
    column: usize,
}

impl TokenWithContext {
    pub fn new(token: Token, line: usize, column: usize) -> Self {
        Self {
            token,
            line,
            column,
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn into_token(self) -> Token {
        self.token
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn column(&self) -> usize {
        self.column
    }
}
