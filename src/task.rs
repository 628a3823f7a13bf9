//! Per-message scan context (spec §3 "Task").

use crate::accumulator::Accumulator;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Envelope fields carried alongside the parsed message (spec §3).
#[derive(Debug, Clone, Default)]
pub struct Envelope {
    pub sender_ip: Option<String>,
    pub helo: Option<String>,
    pub mail_from: Option<String>,
    pub rcpt: Vec<String>,
    pub auth_user: Option<String>,
}

/// A user-supplied settings object (spec §3). Settings carry a `setting_id`
/// used by [`crate::symbol::SymbolItem::allowed_for`] and an arbitrary bag
/// of key/value overrides consumed by individual symbols.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub setting_id: Option<String>,
    pub overrides: HashMap<String, String>,
}

/// A per-task scan context (spec §3).
///
/// Created on submission, destroyed once the scan result is serialized back
/// to the caller. A `Task` is never shared across worker threads while
/// live (spec §5), so its accumulator uses plain (non-atomic, non-locked)
/// interior state rather than a mutex-guarded one.
pub struct Task {
    pub id: Uuid,
    pub message: MessageHandle,
    pub envelope: Envelope,
    pub settings: Settings,
    deadline: Instant,
    pub accumulator: Accumulator,
}

/// An opaque handle to the parsed message. The message/MIME parser itself
/// is out of scope (spec §1); the core only needs a handle it can pass to
/// symbol callbacks unchanged.
#[derive(Debug, Clone)]
pub struct MessageHandle {
    pub raw: std::sync::Arc<Vec<u8>>,
}

impl MessageHandle {
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            raw: std::sync::Arc::new(raw),
        }
    }
}

impl Task {
    pub fn new(message: MessageHandle, envelope: Envelope, settings: Settings, deadline_from_now: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            envelope,
            settings,
            deadline: Instant::now() + deadline_from_now,
            accumulator: Accumulator::new(),
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn time_remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn setting_id(&self) -> Option<&str> {
        self.settings.setting_id.as_deref()
    }
}
