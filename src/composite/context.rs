//! Bridges [`Accumulator`] state to the generic [`EvalContext`] interface
//! the expression evaluator requires (spec §4.3.3 step 1).

use crate::accumulator::Accumulator;
use crate::expr::EvalContext;

pub struct AccumulatorEvalContext<'a> {
    accumulator: &'a Accumulator,
}

impl<'a> AccumulatorEvalContext<'a> {
    pub fn new(accumulator: &'a Accumulator) -> Self {
        Self { accumulator }
    }
}

impl EvalContext for AccumulatorEvalContext<'_> {
    fn is_present(&self, symbol: &str) -> bool {
        self.accumulator.contains(symbol)
    }

    fn score(&self, symbol: &str) -> f64 {
        self.accumulator.get(symbol).map(|r| r.raw_score).unwrap_or(0.0)
    }

    fn group_present(&self, group: &str) -> bool {
        self.accumulator.records().any(|r| r.group.as_deref() == Some(group))
    }

    fn group_score(&self, group: &str) -> f64 {
        self.accumulator
            .records()
            .filter(|r| r.group.as_deref() == Some(group))
            .map(|r| r.raw_score)
            .sum()
    }
}
