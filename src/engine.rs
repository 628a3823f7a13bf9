//! Top-level wiring (spec §2 "Data flow", §6 "Response"): freezes a
//! [`SymbolRegistry`]/[`CompositeRegistry`] pair once, then drives each
//! submitted [`Task`] through every phase in order and serializes the
//! resulting accumulator into a [`ScanResult`].

use crate::accumulator::AccumRecord;
use crate::actions::Action;
use crate::composite::{evaluate_pass, CompositeError, CompositeRegistry, FrozenComposites};
use crate::config::Config;
use crate::scheduler::{FreezeWarning, SchedulerError, SymbolRegistry, TaskScheduler};
use crate::symbol::Phase;
use crate::task::Task;
use std::time::Duration;

/// The frozen, shared state built once at startup (spec §3 "Lifecycles":
/// "the configuration... is built once, frozen, and shared read-only
/// across tasks").
pub struct Engine {
    frozen: crate::scheduler::FrozenSchedule,
    composites: FrozenComposites,
    config: Config,
    default_timeout: Duration,
}

/// One symbol's contribution as reported back to the caller (spec §6
/// "Response": "symbols, score, action, messages").
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSymbol {
    pub name: String,
    pub score: f64,
    pub options: Vec<String>,
}

impl From<&AccumRecord> for ScanSymbol {
    fn from(record: &AccumRecord) -> Self {
        ScanSymbol {
            name: record.symbol.clone(),
            score: record.raw_score,
            options: record.options.as_slice().to_vec(),
        }
    }
}

/// The serialized scan result for one task (spec §6 "Response").
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub action: Action,
    pub score: f64,
    pub message: Option<String>,
    pub symbols: Vec<ScanSymbol>,
}

impl Engine {
    /// Freeze `symbols` and `composites` together and return the engine plus
    /// any non-fatal warnings noticed while doing so (spec §7: none of these
    /// abort startup).
    pub fn build(symbols: SymbolRegistry, composites: CompositeRegistry, config: Config, default_timeout: Duration) -> (Engine, Vec<FreezeWarning>) {
        let (frozen, warnings) = symbols.freeze();
        let composites = composites.freeze(&frozen);
        (
            Engine {
                frozen,
                composites,
                config,
                default_timeout,
            },
            warnings,
        )
    }

    /// Run one task through the full phase sequence (spec §2): Connect,
    /// Prefilter, Filter, Classifier, composite pass 1, Postfilter,
    /// composite pass 2, Idempotent.
    pub fn run_task(&self, mut task: Task) -> (ScanResult, Vec<SchedulerError>) {
        self.config.configure_accumulator(&mut task.accumulator);
        let mut scheduler = TaskScheduler::with_default_timeout(&self.frozen, self.default_timeout);

        for phase in [Phase::Connect, Phase::Prefilter, Phase::Filter, Phase::Classifier] {
            scheduler.run_phase(&mut task, phase);
        }

        self.run_composite_pass(&self.composites.first_pass, &mut task, "composite pass 1");

        scheduler.run_phase(&mut task, Phase::Postfilter);

        self.run_composite_pass(&self.composites.second_pass, &mut task, "composite pass 2");

        scheduler.run_phase(&mut task, Phase::Idempotent);

        let action_result = task.accumulator.action();
        let symbols = task.accumulator.records().map(ScanSymbol::from).collect();
        let result = ScanResult {
            action: action_result.action,
            score: action_result.score,
            message: action_result.message,
            symbols,
        };
        (result, scheduler.errors)
    }

    fn run_composite_pass(&self, composites: &[crate::composite::Composite], task: &mut Task, label: &str) {
        if let Err(CompositeError::IterationExceeded(n)) = evaluate_pass(composites, &mut task.accumulator) {
            tracing::warn!(task_id = %task.id, pass = label, iterations = n, "composite rewriting halted, keeping best-effort state");
        }
    }
}
