//! Per-task execution of one phase (spec §4.1.3).

use crate::accumulator::InsertRequest;
use crate::panic_boundary::catch_and_log;
use crate::scheduler::callback::{CallbackOutcome, ConditionResult, Emitter, IoEvent, TaskView};
use crate::scheduler::freeze::{PhasePlan, ResolvedDependency};
use crate::scheduler::registry::FrozenSchedule;
use crate::symbol::{Phase, SymbolId};
use crate::task::Task;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors surfaced by task execution (spec §7: `SchedulerTimeout`,
/// `CallbackPanic`). Neither aborts the task — both are recorded on the
/// offending item and logged; this type exists for callers that want to
/// observe them explicitly (e.g. test assertions), not to short-circuit
/// the run.
#[derive(Debug, Error, Clone)]
pub enum SchedulerError {
    #[error("symbol '{0}' timed out")]
    Timeout(String),
    #[error("callback for '{0}' panicked: {1}")]
    CallbackPanic(String, String),
}

/// Default per-item async timeout when neither `augmentations.timeout` nor
/// an explicit phase default is configured.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(1);

/// The state machine of a symbol item per task (spec §4.1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    Runnable,
    Running,
    DoneFired,
    DoneNotFired,
    Skipped,
    Failed,
    Timeout,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemState::Pending | ItemState::Runnable | ItemState::Running)
    }

    /// Only `DONE_*` and `SKIPPED` satisfy dependents directly (spec
    /// §4.1.3 "State machine").
    pub fn satisfies_dependents(self) -> bool {
        matches!(self, ItemState::DoneFired | ItemState::DoneNotFired | ItemState::Skipped)
    }
}

enum Gate {
    Ready,
    Waiting,
    TransitiveSkip,
}

/// Drives one task's symbol items through the phases of the frozen
/// schedule. Owns no task state across tasks — a fresh instance per task
/// (spec §3: "Task... never shared across worker threads while live").
pub struct TaskScheduler<'a> {
    frozen: &'a FrozenSchedule,
    default_timeout: Duration,
    states: HashMap<SymbolId, ItemState>,
    runnable: VecDeque<SymbolId>,
    awaiting: HashSet<SymbolId>,
    pending_deadlines: HashMap<SymbolId, Instant>,
    outstanding: usize,
    pub errors: Vec<SchedulerError>,
}

impl<'a> TaskScheduler<'a> {
    pub fn new(frozen: &'a FrozenSchedule) -> Self {
        Self::with_default_timeout(frozen, DEFAULT_ITEM_TIMEOUT)
    }

    pub fn with_default_timeout(frozen: &'a FrozenSchedule, default_timeout: Duration) -> Self {
        Self {
            frozen,
            default_timeout,
            states: HashMap::new(),
            runnable: VecDeque::new(),
            awaiting: HashSet::new(),
            pending_deadlines: HashMap::new(),
            outstanding: 0,
            errors: Vec::new(),
        }
    }

    pub fn state_of(&self, id: SymbolId) -> ItemState {
        self.states.get(&id).copied().unwrap_or(ItemState::Pending)
    }

    fn gate(&self, preds: &[ResolvedDependency]) -> Gate {
        let mut all_done = true;
        for p in preds {
            match self.states.get(&p.id).copied() {
                Some(s) if s.satisfies_dependents() => {}
                Some(ItemState::Failed) | Some(ItemState::Timeout) => {
                    if !p.soft {
                        return Gate::TransitiveSkip;
                    }
                }
                _ => all_done = false,
            }
        }
        if all_done {
            Gate::Ready
        } else {
            Gate::Waiting
        }
    }

    /// Run a single phase of the frozen schedule to completion for `task`.
    pub fn run_phase(&mut self, task: &mut Task, phase: Phase) {
        let Some(plan) = self.frozen.phases.get(&phase) else {
            return;
        };
        self.seed_phase(plan);

        loop {
            while let Some(id) = self.runnable.pop_front() {
                self.run_item(task, plan, id);
            }
            if self.outstanding == 0 {
                break;
            }
            self.wait_for_timeout(task);
        }
    }

    fn seed_phase(&mut self, plan: &PhasePlan) {
        for &id in &plan.order {
            let ext = self
                .frozen
                .external_predecessors
                .get(&id)
                .map(|v| v.as_slice())
                .unwrap_or(&[]);
            match self.gate(ext) {
                Gate::TransitiveSkip => {
                    self.states.insert(id, ItemState::Skipped);
                }
                _ => {
                    self.states.insert(id, ItemState::Pending);
                }
            }
        }
        for &id in &plan.order {
            if self.states.get(&id) == Some(&ItemState::Pending) {
                self.try_make_ready(plan, id);
            }
        }
    }

    fn try_make_ready(&mut self, plan: &PhasePlan, id: SymbolId) {
        if self.states.get(&id) != Some(&ItemState::Pending) {
            return;
        }
        let preds = plan.predecessors.get(&id).cloned().unwrap_or_default();
        match self.gate(&preds) {
            Gate::Ready => {
                self.states.insert(id, ItemState::Runnable);
                self.runnable.push_back(id);
            }
            Gate::TransitiveSkip => {
                self.states.insert(id, ItemState::Skipped);
                self.advance(plan, id);
            }
            Gate::Waiting => {}
        }
    }

    fn advance(&mut self, plan: &PhasePlan, id: SymbolId) {
        if let Some(successors) = plan.successors.get(&id) {
            for &succ in successors {
                self.try_make_ready(plan, succ);
            }
        }
    }

    fn run_item(&mut self, task: &mut Task, plan: &PhasePlan, id: SymbolId) {
        self.states.insert(id, ItemState::Running);
        let item = self.frozen.item(id);

        if !item.allowed_for(task.setting_id()) {
            self.states.insert(id, ItemState::Skipped);
            self.advance(plan, id);
            return;
        }

        if let Some(floor) = task.accumulator.passthrough_floor() {
            if item.priority < floor && !item.flags.ignore_passthrough {
                self.states.insert(id, ItemState::Skipped);
                self.advance(plan, id);
                return;
            }
        }

        let deadline = task.deadline();

        if let Some(conditions) = self.frozen.conditions.get(&id) {
            let view = TaskView {
                id: task.id,
                message: &task.message,
                envelope: &task.envelope,
                settings: &task.settings,
                deadline,
            };
            if conditions.iter().any(|c| matches!(c.check(&view), ConditionResult::Skip)) {
                self.states.insert(id, ItemState::Skipped);
                self.advance(plan, id);
                return;
            }
        }

        let Some(callback) = self.frozen.callbacks.get(&id).cloned() else {
            self.states.insert(id, ItemState::DoneNotFired);
            self.advance(plan, id);
            return;
        };

        let name = item.name.clone();
        let outcome = {
            let view = TaskView {
                id: task.id,
                message: &task.message,
                envelope: &task.envelope,
                settings: &task.settings,
                deadline,
            };
            let mut emitter = Emitter::new(&mut task.accumulator);
            catch_and_log(&name, std::panic::AssertUnwindSafe(|| callback.run(&view, &mut emitter)))
        };

        match outcome {
            Ok(CallbackOutcome::Sync { fired, multiplier, options }) => {
                self.record_result(task, &name, fired, multiplier, options);
                self.states.insert(id, if fired { ItemState::DoneFired } else { ItemState::DoneNotFired });
                self.advance(plan, id);
            }
            Ok(CallbackOutcome::Pending) => {
                self.outstanding += 1;
                self.awaiting.insert(id);
                let timeout = item.augmentations.timeout.unwrap_or(self.default_timeout);
                let remaining = deadline.saturating_duration_since(Instant::now());
                let effective = timeout.min(remaining);
                self.pending_deadlines.insert(id, Instant::now() + effective);
            }
            Err(panic) => {
                self.errors.push(SchedulerError::CallbackPanic(name, panic.message().to_string()));
                self.states.insert(id, ItemState::Failed);
                self.advance(plan, id);
            }
        }
    }

    /// Resume a `Pending` item once its I/O continuation resolves (spec
    /// §4.1.3 step 3 "async-pending"; §5 "finalize exactly once").
    pub fn finalize(&mut self, task: &mut Task, plan_phase: Phase, id: SymbolId, event: IoEvent) {
        debug_assert!(self.awaiting.remove(&id), "double finalize for {id:?}");
        self.outstanding = self.outstanding.saturating_sub(1);
        self.pending_deadlines.remove(&id);

        let Some(plan) = self.frozen.phases.get(&plan_phase) else {
            return;
        };
        let item = self.frozen.item(id);
        let name = item.name.clone();

        if matches!(event, IoEvent::Timeout) {
            self.errors.push(SchedulerError::Timeout(name.clone()));
            self.states.insert(id, ItemState::Timeout);
            self.maybe_record_fail_symbol(task, &name);
            self.advance(plan, id);
            return;
        }

        let Some(callback) = self.frozen.callbacks.get(&id).cloned() else {
            self.states.insert(id, ItemState::DoneNotFired);
            self.advance(plan, id);
            return;
        };

        let deadline = task.deadline();
        let result = {
            let view = TaskView {
                id: task.id,
                message: &task.message,
                envelope: &task.envelope,
                settings: &task.settings,
                deadline,
            };
            let mut emitter = Emitter::new(&mut task.accumulator);
            callback.on_continuation(&view, &mut emitter, event)
        };
        self.record_result(task, &name, result.fired, result.multiplier, result.options);
        self.states.insert(id, if result.fired { ItemState::DoneFired } else { ItemState::DoneNotFired });
        self.advance(plan, id);
    }

    fn maybe_record_fail_symbol(&self, task: &mut Task, symbol: &str) {
        let fail_name = format!("{symbol}_FAIL");
        if let Some(fail_id) = self.frozen.id_of(&fail_name) {
            let weight = self.frozen.item(fail_id).weight;
            let _ = task.accumulator.insert(InsertRequest {
                symbol: &fail_name,
                multiplier: 1.0,
                options: Vec::new(),
                registered_weight: Some(weight),
                group: self.frozen.item(fail_id).group.as_deref(),
                one_shot: self.frozen.item(fail_id).one_shot,
                is_composite: false,
            });
        }
    }

    fn record_result(&self, task: &mut Task, name: &str, fired: bool, multiplier: f64, options: Vec<String>) {
        if !fired {
            return;
        }
        let Some(id) = self.frozen.id_of(name) else { return };
        let item = self.frozen.item(id);
        let result = task.accumulator.insert(InsertRequest {
            symbol: name,
            multiplier,
            options,
            registered_weight: Some(item.weight),
            group: item.group.as_deref(),
            one_shot: item.one_shot,
            is_composite: false,
        });
        if let Err(e) = result {
            tracing::debug!(symbol = name, error = %e, "insert rejected");
        }
    }

    /// Block until the nearest outstanding deadline elapses, then finalize
    /// that item as `Timeout` (spec §4.1.3 "Deadlines"). Real collaborator
    /// responses race this via [`TaskScheduler::finalize`]; whichever
    /// happens first removes the item from `awaiting` and the other has no
    /// effect (enforced by the double-finalize `debug_assert`).
    fn wait_for_timeout(&mut self, task: &mut Task) {
        let Some((&id, &deadline)) = self.pending_deadlines.iter().min_by_key(|(_, d)| **d) else {
            return;
        };
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        if self.awaiting.contains(&id) {
            let phase = self
                .frozen
                .item(id)
                .kind
                .phase()
                .expect("scheduled item always has a phase");
            self.finalize(task, phase, id, IoEvent::Timeout);
        }
    }
}
