//! The symbol cache / scheduler (spec §4.1).

pub mod callback;
pub mod exec;
pub mod freeze;
pub mod registry;

pub use callback::{CallbackOutcome, Condition, ConditionResult, Emitter, FinalResult, FnCallback, IoEvent, SymbolCallback, TaskView};
pub use exec::{ItemState, SchedulerError, TaskScheduler, DEFAULT_ITEM_TIMEOUT};
pub use freeze::{FreezeWarning, PhasePlan, ResolvedDependency};
pub use registry::{FrozenSchedule, RegistrationError, SymbolRegistry, SymbolSpec};
