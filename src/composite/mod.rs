//! The composite evaluator (spec §4.3): parses composite expression
//! strings, classifies them into first/second pass, evaluates them against
//! a task's accumulator, and rewrites it per policy.

pub mod classify;
pub mod context;
pub mod eval;
pub mod mapfile;
pub mod model;
pub mod registry;

pub use context::AccumulatorEvalContext;
pub use eval::{evaluate_pass, CompositeError, MAX_ITERATIONS};
pub use mapfile::{load_composite_map, MapFileError};
pub use model::{Composite, Policy};
pub use registry::{CompositeRegistrationError, CompositeRegistry, FrozenComposites};
