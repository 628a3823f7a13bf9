//! Two-phase, fixed-point composite evaluation (spec §4.3.3).

use super::context::AccumulatorEvalContext;
use super::model::{Composite, Policy};
use crate::accumulator::{Accumulator, InsertRequest};
use std::collections::HashSet;
use thiserror::Error;

/// Bound on within-phase rewrite iterations (spec §4.3.3: "a bounded
/// iteration cap (e.g., 32)").
pub const MAX_ITERATIONS: usize = 32;

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("composite rewriting exceeded {0} iterations; halting for this task")]
    IterationExceeded(usize),
}

/// Evaluate one pass (first or second) of `composites` against `accumulator`
/// to a fixed point, applying removal policies as composites fire.
///
/// Firing is monotone within a pass: once a composite fires it is never
/// re-evaluated, so a full iteration that fires nothing new is the fixed
/// point (spec §8 property 4, confluence modulo the iteration cap).
pub fn evaluate_pass(composites: &[Composite], accumulator: &mut Accumulator) -> Result<(), CompositeError> {
    let mut order: Vec<&Composite> = composites.iter().collect();
    order.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));

    let mut fired: HashSet<String> = HashSet::new();

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;

        for composite in &order {
            if fired.contains(&composite.name) {
                continue;
            }

            let ctx = AccumulatorEvalContext::new(accumulator);
            let outcome = crate::expr::eval(&composite.expr, &ctx);
            if !outcome.truthy {
                continue;
            }

            fired.insert(composite.name.clone());
            changed = true;

            let suppress_score = outcome.contributing.iter().any(|a| a.modifiers.no_score);
            if !suppress_score {
                let _ = accumulator.insert(InsertRequest {
                    symbol: &composite.name,
                    multiplier: 1.0,
                    options: Vec::new(),
                    registered_weight: Some(composite.score),
                    group: composite.group.as_deref(),
                    one_shot: false,
                    is_composite: true,
                });
            }

            for atom in &outcome.contributing {
                if atom.modifiers.protect {
                    continue;
                }
                let Some(name) = atom.symbol_name() else {
                    continue;
                };
                match composite.policy {
                    Policy::RemoveAll => accumulator.remove_all(name),
                    Policy::RemoveSymbol => accumulator.remove_symbol(name),
                    Policy::RemoveWeight => accumulator.remove_weight(name),
                    Policy::Leave => {}
                }
            }
        }

        if !changed {
            return Ok(());
        }
    }

    Err(CompositeError::IterationExceeded(MAX_ITERATIONS))
}
