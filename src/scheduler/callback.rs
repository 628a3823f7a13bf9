//! The symbol callback interface (spec §9 "Dynamic-dispatch symbol
//! callbacks"): `run(task, emitter) -> {sync_result | pending}` and
//! `on_continuation(task, emitter, io_event)`. The scheduler sees only this
//! interface; concrete detection logic (DKIM, SPF, DNS blocklists, ...) is
//! an external collaborator (spec §1 "Deliberately out of scope").

use crate::accumulator::{Accumulator, Passthrough};
use crate::task::{Envelope, MessageHandle, Settings};
use std::time::Instant;
use uuid::Uuid;

/// A read-only view of the parts of a [`crate::task::Task`] a callback may
/// inspect. Deliberately excludes the accumulator, which is reached only
/// through [`Emitter`] — this lets the scheduler hand out an immutable view
/// and a mutable emitter over disjoint fields of the same task at once.
pub struct TaskView<'a> {
    pub id: Uuid,
    pub message: &'a MessageHandle,
    pub envelope: &'a Envelope,
    pub settings: &'a Settings,
    pub deadline: Instant,
}

/// The scheduler's write surface into the task's accumulator, handed to a
/// callback alongside a [`TaskView`].
pub struct Emitter<'a> {
    accumulator: &'a mut Accumulator,
}

impl<'a> Emitter<'a> {
    pub fn new(accumulator: &'a mut Accumulator) -> Self {
        Self { accumulator }
    }

    /// `add_passthrough` (spec §4.1.1): adds to the passthrough set of the
    /// currently-evaluating task.
    pub fn add_passthrough(&mut self, passthrough: Passthrough) {
        self.accumulator.add_passthrough(passthrough);
    }

    pub fn accumulator(&self) -> &Accumulator {
        self.accumulator
    }

    pub fn accumulator_mut(&mut self) -> &mut Accumulator {
        self.accumulator
    }
}

/// What a callback returns synchronously from `run` (spec §4.1.3 step 3).
#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// A synchronous result: whether the symbol fired, its multiplier, and
    /// its emitted options.
    Sync {
        fired: bool,
        multiplier: f64,
        options: Vec<String>,
    },
    /// The callback has registered an I/O continuation (DNS/HTTP/Redis/
    /// filter socket) and will call `finalize` later via
    /// [`SymbolCallback::on_continuation`].
    Pending,
}

impl CallbackOutcome {
    pub fn fired(multiplier: f64, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        CallbackOutcome::Sync {
            fired: true,
            multiplier,
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_fired() -> Self {
        CallbackOutcome::Sync {
            fired: false,
            multiplier: 0.0,
            options: Vec::new(),
        }
    }
}

/// The event delivered to a suspended callback's continuation (spec §6
/// "I/O collaborators").
#[derive(Debug, Clone)]
pub enum IoEvent {
    Resolved {
        fired: bool,
        multiplier: f64,
        options: Vec<String>,
    },
    /// The task deadline (or the continuation's own timeout) elapsed first.
    Timeout,
    /// The collaborator reported an error; delivered as a normal result,
    /// per spec §7 "IOError from collaborator".
    Error(String),
}

/// A registered detection unit's executable behavior.
///
/// `Send + Sync` because symbols are registered once into a frozen
/// configuration shared read-only across worker threads (spec §3
/// "Lifecycles"), even though no two callbacks for the *same* task ever run
/// concurrently (spec §5).
pub trait SymbolCallback: Send + Sync {
    fn run(&self, task: &TaskView<'_>, emitter: &mut Emitter<'_>) -> CallbackOutcome;

    /// Resume a previously `Pending` callback exactly once (spec §4.1.3:
    /// "the callback... MUST call finalize(item, result) exactly once").
    /// Returning here *is* that finalize call — `on_continuation` cannot
    /// itself return `Pending` again. The default treats any continuation
    /// as "not fired", which is correct for callbacks that never suspend.
    fn on_continuation(&self, _task: &TaskView<'_>, _emitter: &mut Emitter<'_>, _event: IoEvent) -> FinalResult {
        FinalResult::not_fired()
    }
}

/// The terminal result of a resumed (previously `Pending`) callback.
#[derive(Debug, Clone)]
pub struct FinalResult {
    pub fired: bool,
    pub multiplier: f64,
    pub options: Vec<String>,
}

impl FinalResult {
    pub fn fired(multiplier: f64, options: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            fired: true,
            multiplier,
            options: options.into_iter().map(Into::into).collect(),
        }
    }

    pub fn not_fired() -> Self {
        Self {
            fired: false,
            multiplier: 0.0,
            options: Vec::new(),
        }
    }
}

/// A callback built from a plain function, for symbols with no async
/// continuation (spec §9: "built-in: direct function pointer").
pub struct FnCallback<F>(pub F)
where
    F: Fn(&TaskView<'_>, &mut Emitter<'_>) -> CallbackOutcome + Send + Sync;

impl<F> SymbolCallback for FnCallback<F>
where
    F: Fn(&TaskView<'_>, &mut Emitter<'_>) -> CallbackOutcome + Send + Sync,
{
    fn run(&self, task: &TaskView<'_>, emitter: &mut Emitter<'_>) -> CallbackOutcome {
        (self.0)(task, emitter)
    }
}

/// A short-circuit predicate registered via `register_condition` (spec
/// §4.1.1). Returning `Skip` prevents the symbol's callback from running
/// this task; the item is marked completed without invoking it.
pub enum ConditionResult {
    Run,
    Skip,
}

pub trait Condition: Send + Sync {
    fn check(&self, task: &TaskView<'_>) -> ConditionResult;
}

impl<F> Condition for F
where
    F: Fn(&TaskView<'_>) -> ConditionResult + Send + Sync,
{
    fn check(&self, task: &TaskView<'_>) -> ConditionResult {
        self(task)
    }
}
