//! Composite registration and freeze (spec §4.3, §4.3.2, §7 "ConfigError").

use super::classify::classify;
use super::model::{Composite, Policy};
use crate::expr::parser::{ParseError, Parser};
use crate::scheduler::FrozenSchedule;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositeRegistrationError {
    #[error("composite '{name}' has an unparseable expression: {source}")]
    Unparseable { name: String, source: ParseError },
}

/// Not-yet-classified composite definitions, built up via `register` and
/// consumed once by `freeze`.
#[derive(Default)]
pub struct CompositeRegistry {
    composites: Vec<Composite>,
    name_index: HashMap<String, usize>,
}

impl CompositeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register (or silently replace) a composite definition.
    /// Parse failures are rejected here (spec §7: "unparseable composite...
    /// rejected with a log; offending definition ignored") — callers should
    /// log `Err` and continue.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        expression: &str,
        score: f64,
        policy: Policy,
        group: Option<String>,
        priority: i32,
    ) -> Result<(), CompositeRegistrationError> {
        let name = name.into();
        let expr = Parser::parse(expression).map_err(|source| CompositeRegistrationError::Unparseable {
            name: name.clone(),
            source,
        })?;

        let composite = Composite {
            name: name.clone(),
            score,
            group,
            policy,
            priority,
            expr,
            second_pass: false,
        };

        if let Some(&idx) = self.name_index.get(&name) {
            self.composites[idx] = composite;
        } else {
            self.name_index.insert(name, self.composites.len());
            self.composites.push(composite);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.composites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.composites.is_empty()
    }

    /// Classify into first/second pass against the frozen symbol schedule
    /// and return the two pass groups (spec §4.3.2).
    pub fn freeze(mut self, frozen: &FrozenSchedule) -> FrozenComposites {
        classify(&mut self.composites, frozen);
        let (second_pass, first_pass): (Vec<_>, Vec<_>) = self.composites.into_iter().partition(|c| c.second_pass);
        FrozenComposites { first_pass, second_pass }
    }
}

/// Composites split by pass, ready for [`super::eval::evaluate_pass`].
pub struct FrozenComposites {
    pub first_pass: Vec<Composite>,
    pub second_pass: Vec<Composite>,
}
