//! Recursive-descent parser for composite/boolean expressions.
//!
//! Precedence, tightest to loosest (spec §4.3.1): `!`, arithmetic (`+`,
//! `*`), comparison, `&`, `|`. All operators are left-associative.

use super::ast::{CompareOp, Expr};
use super::lexer::{LexError, Lexer, Token};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("unexpected token {found:?}, expected {expected}")]
    Unexpected { found: Token, expected: &'static str },
    #[error("trailing tokens after expression")]
    TrailingTokens,
    #[error("empty expression")]
    Empty,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = Parser { tokens, pos: 0 };
        if parser.peek() == &Token::Eof {
            return Err(ParseError::Empty);
        }
        let expr = parser.parse_or()?;
        if parser.peek() != &Token::Eof {
            return Err(ParseError::TrailingTokens);
        }
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_comparison()?;
        while *self.peek() == Token::And {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_arith()?;
        let op = match self.peek() {
            Token::Gt => CompareOp::Gt,
            Token::Lt => CompareOp::Lt,
            Token::Ge => CompareOp::Ge,
            Token::Le => CompareOp::Le,
            Token::Eq => CompareOp::Eq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_number()?;
        Ok(Expr::Compare(op, Box::new(lhs), rhs))
    }

    fn parse_arith(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek() {
                Token::Plus => {
                    self.advance();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Plus(Box::new(lhs), Box::new(rhs));
                }
                Token::Star => {
                    self.advance();
                    let lit = self.parse_number()?;
                    lhs = Expr::Mul(Box::new(lhs), lit);
                }
                _ => break,
            }
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if *self.peek() == Token::Not {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().clone() {
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                if *self.peek() != Token::RParen {
                    return Err(ParseError::Unexpected {
                        found: self.peek().clone(),
                        expected: "')'",
                    });
                }
                self.advance();
                Ok(inner)
            }
            Token::Atom(atom) => {
                self.advance();
                Ok(Expr::Atom(atom))
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "an atom or '('",
            }),
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        match self.peek().clone() {
            Token::Number(n) => {
                self.advance();
                Ok(n)
            }
            other => Err(ParseError::Unexpected {
                found: other,
                expected: "a number",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::AtomKind;

    fn atom_name(e: &Expr) -> &str {
        match e {
            Expr::Atom(a) => match &a.kind {
                AtomKind::Symbol(s) => s,
                AtomKind::Group(_) => panic!("expected symbol atom"),
            },
            _ => panic!("expected atom expr"),
        }
    }

    #[test]
    fn parses_bare_atom() {
        let e = Parser::parse("A").unwrap();
        assert_eq!(atom_name(&e), "A");
    }

    #[test]
    fn parses_and_or_precedence() {
        // & binds tighter than |
        let e = Parser::parse("A & B | C").unwrap();
        match e {
            Expr::Or(l, r) => {
                assert!(matches!(*l, Expr::And(_, _)));
                assert_eq!(atom_name(&r), "C");
            }
            _ => panic!("expected top-level Or"),
        }
    }

    #[test]
    fn parses_not_binds_tighter_than_and() {
        let e = Parser::parse("!A & B").unwrap();
        match e {
            Expr::And(l, r) => {
                assert!(matches!(*l, Expr::Not(_)));
                assert_eq!(atom_name(&r), "B");
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn parses_comparison() {
        let e = Parser::parse("A > 3").unwrap();
        match e {
            Expr::Compare(CompareOp::Gt, lhs, rhs) => {
                assert_eq!(atom_name(&lhs), "A");
                assert_eq!(rhs, 3.0);
            }
            _ => panic!("expected Compare"),
        }
    }

    #[test]
    fn parses_parens() {
        let e = Parser::parse("(A | B) & C").unwrap();
        match e {
            Expr::And(l, r) => {
                assert!(matches!(*l, Expr::Or(_, _)));
                assert_eq!(atom_name(&r), "C");
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn parses_tilde_modifier_and_group_atom() {
        let e = Parser::parse("~A & g:NET").unwrap();
        match e {
            Expr::And(l, r) => {
                match *l {
                    Expr::Atom(a) => assert!(a.modifiers.protect),
                    _ => panic!("expected atom"),
                }
                match *r {
                    Expr::Atom(a) => assert_eq!(a.kind, AtomKind::Group("NET".into())),
                    _ => panic!("expected atom"),
                }
            }
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn rejects_trailing_tokens() {
        let err = Parser::parse("A B").unwrap_err();
        assert_eq!(err, ParseError::TrailingTokens);
    }

    #[test]
    fn rejects_empty() {
        let err = Parser::parse("   ").unwrap_err();
        assert_eq!(err, ParseError::Empty);
    }

    #[test]
    fn arithmetic_binds_tighter_than_comparison() {
        let e = Parser::parse("A + B > 3").unwrap();
        match e {
            Expr::Compare(CompareOp::Gt, lhs, rhs) => {
                assert!(matches!(*lhs, Expr::Plus(_, _)));
                assert_eq!(rhs, 3.0);
            }
            _ => panic!("expected Compare"),
        }
    }
}
