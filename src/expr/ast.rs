//! Expression tree shared by composite bodies and generic boolean expressions.
//!
//! See spec §3 "Expression tree" and §4.3.1 for the grammar this tree is
//! built from.

use std::fmt;

/// A single-character modifier prefix on an atom (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// `~` — evaluate, but never remove the underlying symbol on match.
    pub protect: bool,
    /// `-` — evaluate, but never add the composite's own score on match.
    pub no_score: bool,
    /// `^` — forward reference / second-pass hint.
    pub forward: bool,
}

impl Modifiers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.protect && !self.no_score && !self.forward
    }
}

/// What an atom names: a single symbol, or "some symbol in group X".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomKind {
    /// A bare identifier naming a symbol.
    Symbol(String),
    /// `g:NAME` / `gr:NAME` — true iff some symbol in group NAME fired;
    /// numerically, the sum of scores of symbols in the group.
    Group(String),
}

/// A leaf reference to a symbol or group, with its modifiers and optional
/// `:suboption` qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Atom {
    pub kind: AtomKind,
    pub modifiers: Modifiers,
    pub suboption: Option<String>,
}

impl Atom {
    /// The underlying symbol name this atom contributes toward truth /
    /// removal decisions. For `Group` atoms there is no single symbol name;
    /// callers should use [`AtomKind::Group`] directly where that matters.
    pub fn symbol_name(&self) -> Option<&str> {
        match &self.kind {
            AtomKind::Symbol(name) => Some(name),
            AtomKind::Group(_) => None,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.protect {
            write!(f, "~")?;
        }
        if self.modifiers.no_score {
            write!(f, "-")?;
        }
        if self.modifiers.forward {
            write!(f, "^")?;
        }
        match &self.kind {
            AtomKind::Symbol(name) => write!(f, "{name}")?,
            AtomKind::Group(name) => write!(f, "g:{name}")?,
        }
        if let Some(sub) = &self.suboption {
            write!(f, ":{sub}")?;
        }
        Ok(())
    }
}

/// A comparison operator (spec §4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl CompareOp {
    pub fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Gt => lhs > rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Ge => lhs >= rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Eq => (lhs - rhs).abs() < f64::EPSILON,
        }
    }
}

/// The parsed expression tree (spec §3).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Atom(Atom),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(CompareOp, Box<Expr>, f64),
    Plus(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, f64),
}

impl Expr {
    /// Walk every atom reachable from this expression (used for freeze-time
    /// dependency / second-pass classification).
    pub fn walk_atoms<'a>(&'a self, f: &mut impl FnMut(&'a Atom)) {
        match self {
            Expr::Atom(atom) => f(atom),
            Expr::And(l, r) | Expr::Or(l, r) | Expr::Plus(l, r) => {
                l.walk_atoms(f);
                r.walk_atoms(f);
            }
            Expr::Not(x) | Expr::Mul(x, _) => x.walk_atoms(f),
            Expr::Compare(_, x, _) => x.walk_atoms(f),
        }
    }
}
