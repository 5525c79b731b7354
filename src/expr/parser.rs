//! Expression AST and recursive-descent parser

use super::interp::Value;
use super::lexer::{tokenize, Spanned, Token};
use thiserror::Error;

/// Nesting limit for parenthesized and unary chains
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expression is empty")]
    Empty,

    #[error("unexpected character '{ch}' at {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unterminated string starting at {pos}")]
    UnterminatedString { pos: usize },

    #[error("unterminated placeholder starting at {pos}")]
    UnterminatedPlaceholder { pos: usize },

    #[error("empty placeholder at {pos}")]
    EmptyPlaceholder { pos: usize },

    #[error("invalid number '{text}' at {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("unexpected '{found}' at {pos}")]
    UnexpectedToken { found: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unknown member '{name}' at {pos}")]
    UnknownMember { name: String, pos: usize },

    #[error("expression nested too deeply")]
    TooDeep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Bare answer key; missing keys are an evaluation error
    Ident(String),
    /// `${name}`; missing keys evaluate to null
    Placeholder(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Length(Box<Expr>),
    Includes {
        target: Box<Expr>,
        needle: Box<Expr>,
    },
}

pub fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        index: 0,
        depth: 0,
    };
    let expr = parser.conditional()?;
    match parser.peek() {
        None => Ok(expr),
        Some(extra) => Err(unexpected(extra)),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    depth: usize,
}

fn unexpected(spanned: &Spanned) -> ParseError {
    ParseError::UnexpectedToken {
        found: spanned.token.describe(),
        pos: spanned.pos,
    }
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.index)
    }

    fn peek_token(&self) -> Option<&Token> {
        self.peek().map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.index).cloned();
        if token.is_some() {
            self.index += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.advance() {
            Some(s) if s.token == expected => Ok(()),
            Some(s) => Err(unexpected(&s)),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ParseError::TooDeep);
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn conditional(&mut self) -> Result<Expr, ParseError> {
        self.enter()?;
        let cond = self.or()?;
        let expr = if self.peek_token() == Some(&Token::Question) {
            self.advance();
            let then = self.conditional()?;
            self.expect(Token::Colon)?;
            let otherwise = self.conditional()?;
            Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            }
        } else {
            cond
        };
        self.leave();
        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(Token::OrOr, BinaryOp::Or)], Self::and)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(Token::AndAnd, BinaryOp::And)], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (Token::EqEq, BinaryOp::Eq),
                (Token::NotEq, BinaryOp::NotEq),
                (Token::StrictEq, BinaryOp::StrictEq),
                (Token::StrictNotEq, BinaryOp::StrictNotEq),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (Token::Lt, BinaryOp::Lt),
                (Token::Le, BinaryOp::Le),
                (Token::Gt, BinaryOp::Gt),
                (Token::Ge, BinaryOp::Ge),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (Token::Star, BinaryOp::Mul),
                (Token::Slash, BinaryOp::Div),
                (Token::Percent, BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    /// Left-associative binary level
    fn binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        loop {
            let op = match self.peek_token() {
                Some(token) => ops.iter().find(|(t, _)| t == token).map(|(_, op)| *op),
                None => None,
            };
            let Some(op) = op else { break };
            self.advance();
            let right = next(self)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek_token() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            Some(Token::Plus) => {
                // Unary plus is a no-op numeric hint
                self.advance();
                return self.unary();
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.enter()?;
                self.advance();
                let operand = self.unary()?;
                self.leave();
                Ok(Expr::Unary {
                    op,
                    operand: Box::new(operand),
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.peek_token() == Some(&Token::Dot) {
            self.advance();
            let member = self.advance().ok_or(ParseError::UnexpectedEnd)?;
            expr = match member.token {
                Token::Ident(ref name) if name == "length" => Expr::Length(Box::new(expr)),
                Token::Ident(ref name) if name == "includes" => {
                    self.expect(Token::LParen)?;
                    let needle = self.conditional()?;
                    self.expect(Token::RParen)?;
                    Expr::Includes {
                        target: Box::new(expr),
                        needle: Box::new(needle),
                    }
                }
                Token::Ident(name) => {
                    return Err(ParseError::UnknownMember {
                        name,
                        pos: member.pos,
                    })
                }
                _ => return Err(unexpected(&member)),
            };
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let spanned = self.advance().ok_or(ParseError::UnexpectedEnd)?;
        match spanned.token {
            Token::Number(n) => Ok(Expr::Literal(Value::Number(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::True => Ok(Expr::Literal(Value::Bool(true))),
            Token::False => Ok(Expr::Literal(Value::Bool(false))),
            Token::Null => Ok(Expr::Literal(Value::Null)),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::Placeholder(name) => Ok(Expr::Placeholder(name)),
            Token::LParen => {
                self.enter()?;
                let inner = self.conditional()?;
                self.expect(Token::RParen)?;
                self.leave();
                Ok(inner)
            }
            _ => Err(unexpected(&spanned)),
        }
    }
}
