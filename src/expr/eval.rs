//! Evaluation of an [`Expr`] against an external scoring context.
//!
//! The expression tree itself (spec §3) is a shared primitive; evaluating it
//! against live accumulator state is what the composite evaluator (spec
//! §4.3.3) actually drives, so this module only defines the *interface* a
//! caller must provide ([`EvalContext`]) plus the evaluation algorithm.

use super::ast::{Atom, AtomKind, Expr};

/// What an [`Expr`] evaluation needs to know about the outside world.
///
/// A symbol's truthiness is *presence*, not "score != 0" (spec §4.3.1: "a
/// bare identifier ... truthy iff the symbol is present in the
/// accumulator"), so presence and score are queried separately.
pub trait EvalContext {
    /// Is `symbol` present in the accumulator (regardless of score)?
    fn is_present(&self, symbol: &str) -> bool;
    /// The symbol's accumulated score (0.0 if absent).
    fn score(&self, symbol: &str) -> f64;
    /// Is any symbol in `group` present?
    fn group_present(&self, group: &str) -> bool;
    /// Sum of scores of symbols in `group` that are present.
    fn group_score(&self, group: &str) -> f64;
}

/// The result of evaluating an expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalOutcome {
    /// Whether this node's result is considered true.
    pub truthy: bool,
    /// The numeric value of this node (used by comparisons/arithmetic above it).
    pub value: f64,
    /// Atoms that contributed to `truthy` being true, bottom-up. Empty when
    /// `truthy` is false.
    pub contributing: Vec<Atom>,
}

impl EvalOutcome {
    fn atom(truthy: bool, value: f64, atom: &Atom) -> Self {
        let contributing = if truthy { vec![atom.clone()] } else { Vec::new() };
        Self {
            truthy,
            value,
            contributing,
        }
    }

    fn bare(truthy: bool, value: f64) -> Self {
        Self {
            truthy,
            value,
            contributing: Vec::new(),
        }
    }
}

/// Evaluate `expr` against `ctx`, per spec §4.3.3 step 1.
pub fn eval(expr: &Expr, ctx: &dyn EvalContext) -> EvalOutcome {
    match expr {
        Expr::Atom(atom) => eval_atom(atom, ctx),
        Expr::Not(x) => {
            let inner = eval(x, ctx);
            let truthy = !inner.truthy;
            EvalOutcome::bare(truthy, if truthy { 1.0 } else { 0.0 })
        }
        Expr::And(l, r) => {
            let lv = eval(l, ctx);
            let rv = eval(r, ctx);
            let truthy = lv.truthy && rv.truthy;
            if truthy {
                let mut contributing = lv.contributing;
                contributing.extend(rv.contributing);
                EvalOutcome {
                    truthy,
                    value: lv.value + rv.value,
                    contributing,
                }
            } else {
                EvalOutcome::bare(false, 0.0)
            }
        }
        Expr::Or(l, r) => {
            let lv = eval(l, ctx);
            let rv = eval(r, ctx);
            let truthy = lv.truthy || rv.truthy;
            let mut value = 0.0;
            let mut contributing = Vec::new();
            if lv.truthy {
                value += lv.value;
                contributing.extend(lv.contributing);
            }
            if rv.truthy {
                value += rv.value;
                contributing.extend(rv.contributing);
            }
            EvalOutcome {
                truthy,
                value,
                contributing,
            }
        }
        Expr::Compare(op, x, literal) => {
            let inner = eval(x, ctx);
            let truthy = op.apply(inner.value, *literal);
            let contributing = if truthy { inner.contributing } else { Vec::new() };
            EvalOutcome {
                truthy,
                value: if truthy { 1.0 } else { 0.0 },
                contributing,
            }
        }
        Expr::Plus(l, r) => {
            let lv = eval(l, ctx);
            let rv = eval(r, ctx);
            let value = lv.value + rv.value;
            let mut contributing = lv.contributing;
            contributing.extend(rv.contributing);
            EvalOutcome {
                truthy: value != 0.0,
                value,
                contributing,
            }
        }
        Expr::Mul(l, literal) => {
            let lv = eval(l, ctx);
            let value = lv.value * literal;
            EvalOutcome {
                truthy: value != 0.0,
                value,
                contributing: lv.contributing,
            }
        }
    }
}

fn eval_atom(atom: &Atom, ctx: &dyn EvalContext) -> EvalOutcome {
    match &atom.kind {
        AtomKind::Symbol(name) => {
            let present = ctx.is_present(name);
            EvalOutcome::atom(present, ctx.score(name), atom)
        }
        AtomKind::Group(name) => {
            let present = ctx.group_present(name);
            EvalOutcome::atom(present, ctx.group_score(name), atom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::Parser;
    use std::collections::HashMap;

    struct MapContext(HashMap<String, f64>);

    impl EvalContext for MapContext {
        fn is_present(&self, symbol: &str) -> bool {
            self.0.contains_key(symbol)
        }
        fn score(&self, symbol: &str) -> f64 {
            self.0.get(symbol).copied().unwrap_or(0.0)
        }
        fn group_present(&self, _group: &str) -> bool {
            false
        }
        fn group_score(&self, _group: &str) -> f64 {
            0.0
        }
    }

    fn ctx(pairs: &[(&str, f64)]) -> MapContext {
        MapContext(pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect())
    }

    #[test]
    fn and_requires_both_present() {
        let expr = Parser::parse("A & B").unwrap();
        let out = eval(&expr, &ctx(&[("A", 1.0)]));
        assert!(!out.truthy);

        let out = eval(&expr, &ctx(&[("A", 1.0), ("B", 2.0)]));
        assert!(out.truthy);
        assert_eq!(out.value, 3.0);
        assert_eq!(out.contributing.len(), 2);
    }

    #[test]
    fn tilde_protects_from_removal_but_not_truth() {
        let expr = Parser::parse("~A & B").unwrap();
        let out = eval(&expr, &ctx(&[("A", 1.0), ("B", 2.0)]));
        assert!(out.truthy);
        assert!(out.contributing.iter().any(|a| a.modifiers.protect));
    }

    #[test]
    fn not_inverts_presence() {
        let expr = Parser::parse("!A").unwrap();
        assert!(eval(&expr, &ctx(&[])).truthy);
        assert!(!eval(&expr, &ctx(&[("A", 1.0)])).truthy);
    }

    #[test]
    fn or_sums_only_truthy_sides() {
        let expr = Parser::parse("A | B").unwrap();
        let out = eval(&expr, &ctx(&[("A", 5.0)]));
        assert!(out.truthy);
        assert_eq!(out.value, 5.0);
        assert_eq!(out.contributing.len(), 1);
    }

    #[test]
    fn comparison_is_boolean() {
        let expr = Parser::parse("A > 3").unwrap();
        assert!(eval(&expr, &ctx(&[("A", 5.0)])).truthy);
        assert!(!eval(&expr, &ctx(&[("A", 2.0)])).truthy);
    }
}
