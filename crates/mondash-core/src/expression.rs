//! Per-series value expressions such as `$1*8` or `($1-32)/1.8`.
//!
//! Grammar:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | atom
//! atom   := number | '$1' | '(' expr ')'
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token at position {pos}")]
    UnexpectedToken { pos: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("unknown variable '${0}', only $1 is available")]
    UnknownVariable(String),

    #[error("expression nested deeper than {MAX_DEPTH} levels at position {pos}")]
    TooDeep { pos: usize },

    #[error("expression longer than {MAX_TOKENS} tokens")]
    TooLong,
}

/// Parentheses plus unary minus nesting
pub const MAX_DEPTH: usize = 32;

/// Also bounds the depth of left-leaning operator chains
pub const MAX_TOKENS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Value,
    Plus,
    Minus,
    Star,
    Slash,
    Open,
    Close,
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let ch = chars[pos];
        let single = match ch {
            c if c.is_whitespace() => {
                pos += 1;
                continue;
            }
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            _ => None,
        };
        if let Some(token) = single {
            tokens.push((pos, token));
            pos += 1;
            if tokens.len() > MAX_TOKENS {
                return Err(ExpressionError::TooLong);
            }
            continue;
        }

        let start = pos;
        if ch == '$' {
            pos += 1;
            while pos < chars.len() && chars[pos].is_ascii_alphanumeric() {
                pos += 1;
            }
            let name: String = chars[start + 1..pos].iter().collect();
            if name != "1" {
                return Err(ExpressionError::UnknownVariable(name));
            }
            tokens.push((start, Token::Value));
            if tokens.len() > MAX_TOKENS {
                return Err(ExpressionError::TooLong);
            }
        } else if ch.is_ascii_digit() || ch == '.' {
            while pos < chars.len() && (chars[pos].is_ascii_digit() || chars[pos] == '.') {
                pos += 1;
            }
            // exponent: 1e3, 2.5E-4
            if pos < chars.len() && matches!(chars[pos], 'e' | 'E') {
                pos += 1;
                if pos < chars.len() && matches!(chars[pos], '+' | '-') {
                    pos += 1;
                }
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            let text: String = chars[start..pos].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| ExpressionError::InvalidNumber(text.clone()))?;
            tokens.push((start, Token::Num(value)));
            if tokens.len() > MAX_TOKENS {
                return Err(ExpressionError::TooLong);
            }
        } else {
            return Err(ExpressionError::UnexpectedChar { ch, pos });
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Ast {
    Value,
    Const(f64),
    Neg(Box<Ast>),
    Add(Box<Ast>, Box<Ast>),
    Sub(Box<Ast>, Box<Ast>),
    Mul(Box<Ast>, Box<Ast>),
    Div(Box<Ast>, Box<Ast>),
}

impl Ast {
    fn eval(&self, value: f64) -> f64 {
        match self {
            Ast::Value => value,
            Ast::Const(c) => *c,
            Ast::Neg(a) => -a.eval(value),
            Ast::Add(a, b) => a.eval(value) + b.eval(value),
            Ast::Sub(a, b) => a.eval(value) - b.eval(value),
            Ast::Mul(a, b) => a.eval(value) * b.eval(value),
            Ast::Div(a, b) => a.eval(value) / b.eval(value),
        }
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    next: usize,
    depth: usize,
}

impl Parser {
    /// Run `nested` one level deeper; `pos` is reported when the limit is hit
    fn nested<T>(
        &mut self,
        pos: usize,
        nested: impl FnOnce(&mut Self) -> Result<T, ExpressionError>,
    ) -> Result<T, ExpressionError> {
        if self.depth >= MAX_DEPTH {
            return Err(ExpressionError::TooDeep { pos });
        }
        self.depth += 1;
        let result = nested(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.next).map(|(_, t)| *t)
    }

    fn bump(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.next).copied();
        self.next += 1;
        token
    }

    fn expr(&mut self) -> Result<Ast, ExpressionError> {
        let mut lhs = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.next += 1;
            let rhs = self.term()?;
            lhs = match op {
                Token::Plus => Ast::Add(Box::new(lhs), Box::new(rhs)),
                _ => Ast::Sub(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Ast, ExpressionError> {
        let mut lhs = self.unary()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.next += 1;
            let rhs = self.unary()?;
            lhs = match op {
                Token::Star => Ast::Mul(Box::new(lhs), Box::new(rhs)),
                _ => Ast::Div(Box::new(lhs), Box::new(rhs)),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast, ExpressionError> {
        if let Some((pos, Token::Minus)) = self.tokens.get(self.next).copied() {
            self.next += 1;
            let operand = self.nested(pos, Self::unary)?;
            return Ok(Ast::Neg(Box::new(operand)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Ast, ExpressionError> {
        match self.bump() {
            Some((_, Token::Num(n))) => Ok(Ast::Const(n)),
            Some((_, Token::Value)) => Ok(Ast::Value),
            Some((pos, Token::Open)) => {
                let inner = self.nested(pos, Self::expr)?;
                match self.bump() {
                    Some((_, Token::Close)) => Ok(inner),
                    Some((pos, _)) => Err(ExpressionError::UnexpectedToken { pos }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some((pos, _)) => Err(ExpressionError::UnexpectedToken { pos }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

/// Parsed value expression; `$1` is the fetched value
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Ast,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        if source.trim().is_empty() {
            return Ok(Self::identity());
        }

        let mut parser = Parser {
            tokens: tokenize(source)?,
            next: 0,
            depth: 0,
        };
        let ast = parser.expr()?;
        if let Some((pos, _)) = parser.bump() {
            return Err(ExpressionError::UnexpectedToken { pos });
        }

        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn identity() -> Self {
        Self {
            source: "$1".to_string(),
            ast: Ast::Value,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.ast == Ast::Value
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn eval(&self, value: f64) -> f64 {
        self.ast.eval(value)
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self::identity()
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str, value: f64) -> f64 {
        Expression::parse(source).expect("valid expression").eval(value)
    }

    #[test]
    fn test_identity() {
        assert!(Expression::parse("$1").expect("valid").is_identity());
        assert!(Expression::parse("  ").expect("valid").is_identity());
        assert_eq!(eval("$1", 4.5), 4.5);
    }

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(eval("$1*8", 2.0), 16.0);
        assert_eq!(eval("1 + 2 * $1", 3.0), 7.0);
        assert_eq!(eval("(1 + 2) * $1", 3.0), 9.0);
        assert_eq!(eval("10 - 4 - 3", 0.0), 3.0);
        assert_eq!(eval("-$1 / 2", 5.0), -2.5);
        assert_eq!(eval("--$1", 5.0), 5.0);
        assert_eq!(eval("$1 * 1e3", 0.002), 2.0);
        assert!((eval("($1-32)/1.8", 212.0) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Expression::parse("$1 % 2"),
            Err(ExpressionError::UnexpectedChar { ch: '%', pos: 3 })
        );
        assert_eq!(Expression::parse("($1 + 1"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(Expression::parse("$1 2"), Err(ExpressionError::UnexpectedToken { pos: 3 }));
        assert_eq!(
            Expression::parse("$2 * 3"),
            Err(ExpressionError::UnknownVariable("2".to_string()))
        );
        assert_eq!(
            Expression::parse("1..2"),
            Err(ExpressionError::InvalidNumber("1..2".to_string()))
        );
    }

    #[test]
    fn test_nesting_is_bounded() {
        let nested = |depth: usize| format!("{}$1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(eval(&nested(MAX_DEPTH), 3.0), 3.0);
        assert_eq!(
            Expression::parse(&nested(MAX_DEPTH + 8)),
            Err(ExpressionError::TooDeep { pos: MAX_DEPTH })
        );
        assert_eq!(
            Expression::parse(&format!("{}$1", "-".repeat(MAX_DEPTH + 1))),
            Err(ExpressionError::TooDeep { pos: MAX_DEPTH })
        );
        // far past the limit fails on length before any recursion
        assert_eq!(Expression::parse(&nested(100_000)), Err(ExpressionError::TooLong));
        assert_eq!(
            Expression::parse(&vec!["$1"; 1000].join("+")),
            Err(ExpressionError::TooLong)
        );
    }
}
