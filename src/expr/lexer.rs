//! Lexer for composite/boolean expression bodies.

use super::ast::{Atom, AtomKind, Modifiers};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{ch}' at column {col}")]
    UnexpectedChar { ch: char, col: usize },
    #[error("unterminated atom at column {col}")]
    UnterminatedAtom { col: usize },
    #[error("expected a number at column {col}")]
    ExpectedNumber { col: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Atom(Atom),
    Number(f64),
    And,
    Or,
    Not,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Plus,
    Star,
    LParen,
    RParen,
    Eof,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '-'
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Tokenize the whole source, including a trailing [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok == Token::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();
        let col = self.pos + 1;
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };

        match c {
            '(' => {
                self.advance();
                Ok(Token::LParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RParen)
            }
            '!' => {
                self.advance();
                Ok(Token::Not)
            }
            '+' => {
                self.advance();
                Ok(Token::Plus)
            }
            '*' => {
                self.advance();
                Ok(Token::Star)
            }
            '&' => {
                self.advance();
                if self.peek() == Some('&') {
                    self.advance();
                }
                Ok(Token::And)
            }
            '|' => {
                self.advance();
                if self.peek() == Some('|') {
                    self.advance();
                }
                Ok(Token::Or)
            }
            '>' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Ge)
                } else {
                    Ok(Token::Gt)
                }
            }
            '<' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Le)
                } else {
                    Ok(Token::Lt)
                }
            }
            '=' => {
                self.advance();
                if self.peek() == Some('=') {
                    self.advance();
                    Ok(Token::Eq)
                } else {
                    Err(LexError::UnexpectedChar { ch: '=', col })
                }
            }
            c if c.is_ascii_digit() => self.lex_number(col),
            '~' | '^' => self.lex_atom(col),
            '-' if matches!(self.peek2(), Some(n) if n.is_alphabetic() || n == '~' || n == '^' || n == '-') => {
                self.lex_atom(col)
            }
            c if c.is_alphabetic() || c == '_' => self.lex_atom(col),
            other => Err(LexError::UnexpectedChar { ch: other, col }),
        }
    }

    fn lex_number(&mut self, col: usize) -> Result<Token, LexError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| LexError::ExpectedNumber { col })
    }

    fn lex_atom(&mut self, col: usize) -> Result<Token, LexError> {
        let mut modifiers = Modifiers::none();
        loop {
            match self.peek() {
                Some('~') => {
                    modifiers.protect = true;
                    self.advance();
                }
                Some('-') => {
                    modifiers.no_score = true;
                    self.advance();
                }
                Some('^') => {
                    modifiers.forward = true;
                    self.advance();
                }
                _ => break,
            }
        }

        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.advance();
        }
        if self.pos == start {
            return Err(LexError::UnterminatedAtom { col });
        }
        let ident: String = self.chars[start..self.pos].iter().collect();

        let (kind, suboption) = if self.peek() == Some(':') {
            self.advance();
            let sub_start = self.pos;
            while matches!(self.peek(), Some(c) if is_ident_char(c)) {
                self.advance();
            }
            let rest: String = self.chars[sub_start..self.pos].iter().collect();
            if (ident == "g" || ident == "gr") && !rest.is_empty() {
                (AtomKind::Group(rest), None)
            } else {
                (AtomKind::Symbol(ident), Some(rest).filter(|s| !s.is_empty()))
            }
        } else {
            (AtomKind::Symbol(ident), None)
        };

        Ok(Token::Atom(Atom {
            kind,
            modifiers,
            suboption,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<Token> {
        Lexer::new(s).tokenize().unwrap()
    }

    #[test]
    fn simple_atom() {
        let toks = lex("A");
        assert_eq!(
            toks[0],
            Token::Atom(Atom {
                kind: AtomKind::Symbol("A".into()),
                modifiers: Modifiers::none(),
                suboption: None,
            })
        );
    }

    #[test]
    fn modifiers_combine() {
        let toks = lex("~-A");
        match &toks[0] {
            Token::Atom(a) => {
                assert!(a.modifiers.protect);
                assert!(a.modifiers.no_score);
                assert!(!a.modifiers.forward);
            }
            _ => panic!("expected atom"),
        }
    }

    #[test]
    fn group_prefix() {
        let toks = lex("g:NETWORK");
        match &toks[0] {
            Token::Atom(a) => assert_eq!(a.kind, AtomKind::Group("NETWORK".into())),
            _ => panic!("expected atom"),
        }
    }

    #[test]
    fn suboption() {
        let toks = lex("FOO:bar");
        match &toks[0] {
            Token::Atom(a) => {
                assert_eq!(a.kind, AtomKind::Symbol("FOO".into()));
                assert_eq!(a.suboption.as_deref(), Some("bar"));
            }
            _ => panic!("expected atom"),
        }
    }

    #[test]
    fn operators() {
        assert_eq!(lex("&"), vec![Token::And, Token::Eof]);
        assert_eq!(lex("&&"), vec![Token::And, Token::Eof]);
        assert_eq!(lex("|"), vec![Token::Or, Token::Eof]);
        assert_eq!(lex("||"), vec![Token::Or, Token::Eof]);
        assert_eq!(lex(">="), vec![Token::Ge, Token::Eof]);
        assert_eq!(lex("<="), vec![Token::Le, Token::Eof]);
        assert_eq!(lex("=="), vec![Token::Eq, Token::Eof]);
    }

    #[test]
    fn rejects_lone_equals() {
        let err = Lexer::new("A = 1").tokenize().unwrap_err();
        assert!(matches!(err, LexError::UnexpectedChar { ch: '=', .. }));
    }
}
