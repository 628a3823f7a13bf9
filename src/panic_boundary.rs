//! Panic-vs-result boundary enforcement around symbol callbacks.
//!
//! # Policy
//!
//! - **Panics** are reserved for unrecoverable programmer errors inside a
//!   callback (violated invariants, unreachable code, corrupted state).
//! - **Results** are used for expected operational failures (timeouts,
//!   malformed input, collaborator errors).
//!
//! Every callback invocation in [`crate::scheduler::exec`] runs under
//! [`catch_panic`] so a single misbehaving symbol cannot bring down the
//! scheduler loop; the caught panic surfaces as the item's
//! [`crate::scheduler::SchedulerError::CallbackPanic`] error kind.

use std::any::Any;
use std::fmt;

/// An error type representing a caught panic.
#[derive(Debug, Clone)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = extract_panic_message(&payload);
        Self { message }
    }

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

fn extract_panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Catch a panic from `f` and convert it to `Result<T, PanicError>`.
pub fn catch_panic<T>(f: impl FnOnce() -> T + std::panic::UnwindSafe) -> Result<T, PanicError> {
    match std::panic::catch_unwind(f) {
        Ok(value) => Ok(value),
        Err(payload) => Err(PanicError::from_payload(payload)),
    }
}

/// Catch a panic from `f`, logging it via `tracing::error!` before
/// returning it to the caller. Used by the scheduler so a callback panic is
/// always visible in the log even when the caller only inspects the item's
/// final state.
pub fn catch_and_log<T>(
    symbol: &str,
    f: impl FnOnce() -> T + std::panic::UnwindSafe,
) -> Result<T, PanicError> {
    match catch_panic(f) {
        Ok(v) => Ok(v),
        Err(e) => {
            tracing::error!(symbol, panic = %e.message(), "callback panicked");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_panic_on_success() {
        let result = catch_panic(|| 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn catch_panic_on_str_panic() {
        let result = catch_panic(|| -> i32 { panic!("boom") });
        let err = result.unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "panic: boom");
    }

    #[test]
    fn catch_panic_on_string_panic() {
        let result = catch_panic(|| -> i32 {
            let msg = String::from("string panic");
            panic!("{}", msg);
        });
        let err = result.unwrap_err();
        assert!(err.message().contains("string panic"));
    }

    #[test]
    fn catch_panic_unknown_payload() {
        let result = catch_panic(|| -> i32 {
            std::panic::panic_any(42_i32);
        });
        let err = result.unwrap_err();
        assert_eq!(err.message(), "unknown panic payload");
    }

    #[test]
    fn catch_and_log_returns_err_on_panic() {
        let result = catch_and_log("SYM", || -> i32 { panic!("callback bug") });
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().message(), "callback bug");
    }

    #[test]
    fn catch_and_log_passes_through_success() {
        let result = catch_and_log("SYM", || 7);
        assert_eq!(result.unwrap(), 7);
    }
}
