//! Expressions, e.g. `user.name` or `count + 1 > 5`,
//! which when evaluated produce a single value.
use super::super::Value;
use super::{Env, Parser, Token};
use crate::Error;

use std::cmp::Ordering;

/// Single entity in an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Constant(Value),
    // Local variable.
    Variable(String),
    // Scope variable, `@name`.
    Ivar(String),
}

impl Term {
    pub fn evaluate(&self, env: &Env) -> Result<Value, Error> {
        match self {
            Term::Constant(value) => Ok(value.clone()),
            Term::Variable(name) => env
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| Error::UndefinedVariable(name.clone())),
            Term::Ivar(name) => Ok(env.scope.ivar(name).unwrap_or(Value::Null)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Not,
    Neg,
    Add,
    Sub,
    Mult,
    Div,
    Equals,
    NotEquals,
    GreaterThan,
    GreaterEqualThan,
    LessThan,
    LessEqualThan,
    And,
    Or,
}

impl Op {
    fn binary(token: &Token) -> Option<Self> {
        Some(match token {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            Token::Mult => Op::Mult,
            Token::Div => Op::Div,
            Token::Equals => Op::Equals,
            Token::NotEquals => Op::NotEquals,
            Token::GreaterThan => Op::GreaterThan,
            Token::GreaterEqualThan => Op::GreaterEqualThan,
            Token::LessThan => Op::LessThan,
            Token::LessEqualThan => Op::LessEqualThan,
            Token::And => Op::And,
            Token::Or => Op::Or,
            _ => return None,
        })
    }

    /// Binding power, higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Op::Or => 1,
            Op::And => 2,
            Op::Equals | Op::NotEquals => 3,
            Op::GreaterThan | Op::GreaterEqualThan | Op::LessThan | Op::LessEqualThan => 4,
            Op::Add | Op::Sub => 5,
            Op::Mult | Op::Div => 6,
            Op::Not | Op::Neg => 7,
        }
    }

    fn evaluate_binary(&self, left: &Value, right: &Value) -> Result<Value, Error> {
        let compare = || {
            left.partial_cmp(right).ok_or_else(|| {
                Error::Runtime(format!(
                    "comparison of {} with {} failed",
                    left.type_name(),
                    right.type_name()
                ))
            })
        };

        Ok(match self {
            Op::Add => left.add(right)?,
            Op::Sub => left.sub(right)?,
            Op::Mult => left.mul(right)?,
            Op::Div => left.div(right)?,
            Op::Equals => Value::Boolean(equals(left, right)),
            Op::NotEquals => Value::Boolean(!equals(left, right)),
            Op::GreaterThan => Value::Boolean(compare()? == Ordering::Greater),
            Op::GreaterEqualThan => Value::Boolean(compare()? != Ordering::Less),
            Op::LessThan => Value::Boolean(compare()? == Ordering::Less),
            Op::LessEqualThan => Value::Boolean(compare()? != Ordering::Greater),
            Op::And | Op::Or | Op::Not | Op::Neg => {
                return Err(Error::Runtime(format!("{:?} is not a binary operator", self)))
            }
        })
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    left == right || left.partial_cmp(right) == Some(Ordering::Equal)
}

#[derive(Debug, Clone)]
pub enum Expression {
    Binary {
        left: Box<Expression>,
        op: Op,
        right: Box<Expression>,
    },

    Unary {
        op: Op,
        operand: Box<Expression>,
    },

    Term {
        term: Term,
    },

    // e.g. `user.name`
    Attribute {
        target: Box<Expression>,
        name: String,
    },

    // Output of the content block.
    Yield,
}

impl Expression {
    /// Evaluate the expression to a value.
    pub fn evaluate(&self, env: &Env) -> Result<Value, Error> {
        match self {
            Expression::Term { term } => term.evaluate(env),

            // `&&` and `||` short-circuit and return one of their operands.
            Expression::Binary {
                left,
                op: Op::And,
                right,
            } => {
                let left = left.evaluate(env)?;
                if left.truthy() {
                    right.evaluate(env)
                } else {
                    Ok(left)
                }
            }

            Expression::Binary {
                left,
                op: Op::Or,
                right,
            } => {
                let left = left.evaluate(env)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    right.evaluate(env)
                }
            }

            Expression::Binary { left, op, right } => {
                let left = left.evaluate(env)?;
                let right = right.evaluate(env)?;
                op.evaluate_binary(&left, &right)
            }

            Expression::Unary { op, operand } => {
                let operand = operand.evaluate(env)?;
                match op {
                    Op::Not => Ok(Value::Boolean(!operand.truthy())),
                    _ => Value::Integer(0).sub(&operand),
                }
            }

            Expression::Attribute { target, name } => target.evaluate(env)?.attribute(name),

            Expression::Yield => match env.content {
                Some(content) => Ok(Value::Safe(content()?)),
                None => Err(Error::NoBlockGiven),
            },
        }
    }

    /// Parse an expression, stopping at the first token that can't continue it.
    pub fn parse(parser: &mut Parser) -> Result<Self, Error> {
        Self::parse_binary(parser, 0)
    }

    // Precedence climbing, all binary operators are left-associative.
    fn parse_binary(parser: &mut Parser, min_precedence: u8) -> Result<Self, Error> {
        let mut left = Self::parse_unary(parser)?;

        loop {
            let op = match parser.peek().and_then(Op::binary) {
                Some(op) if op.precedence() > min_precedence => op,
                _ => break,
            };
            parser.next();

            let right = Self::parse_binary(parser, op.precedence())?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(parser: &mut Parser) -> Result<Self, Error> {
        let op = match parser.peek() {
            Some(Token::Not) => Op::Not,
            Some(Token::Minus) => Op::Neg,
            _ => return Self::parse_postfix(parser),
        };
        parser.next();

        Ok(Expression::Unary {
            op,
            operand: Box::new(Self::parse_unary(parser)?),
        })
    }

    fn parse_postfix(parser: &mut Parser) -> Result<Self, Error> {
        let mut expression = Self::parse_primary(parser)?;

        while parser.peek() == Some(&Token::Dot) {
            parser.next();
            let token = parser.expect_next("attribute")?;
            match token.token() {
                Token::Variable(name) => {
                    expression = Expression::Attribute {
                        target: Box::new(expression),
                        name: name.clone(),
                    }
                }
                _ => return Err(parser.unexpected(&token)),
            }
        }

        Ok(expression)
    }

    fn parse_primary(parser: &mut Parser) -> Result<Self, Error> {
        let token = parser.expect_next("expression")?;

        Ok(match token.token() {
            Token::Value(value) => Expression::Term {
                term: Term::Constant(value.clone()),
            },
            Token::Variable(name) => Expression::Term {
                term: Term::Variable(name.clone()),
            },
            Token::Ivar(name) => Expression::Term {
                term: Term::Ivar(name.clone()),
            },
            Token::Yield => Expression::Yield,
            Token::RoundBracketStart => {
                let expression = Self::parse(parser)?;
                parser.expect(Token::RoundBracketEnd, "expression")?;
                expression
            }
            _ => return Err(parser.unexpected(&token)),
        })
    }
}
