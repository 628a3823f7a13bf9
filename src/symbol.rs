//! Symbol item data model (spec §3 "Symbol item").

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// A unique, opaque identifier assigned to a registered symbol item.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(u64);

impl SymbolId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({})", self.0)
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sym:{}", self.0)
    }
}

/// The scheduling phase a symbol type belongs to (spec §4.1.2).
///
/// Total phase order: `Connect` < `Prefilter` < `Filter` < `Classifier` <
/// `CompositePass1` < `Postfilter` < `CompositePass2` < `Idempotent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Connect,
    Prefilter,
    Filter,
    Classifier,
    CompositePass1,
    Postfilter,
    CompositePass2,
    Idempotent,
}

impl Phase {
    pub const ALL: [Phase; 8] = [
        Phase::Connect,
        Phase::Prefilter,
        Phase::Filter,
        Phase::Classifier,
        Phase::CompositePass1,
        Phase::Postfilter,
        Phase::CompositePass2,
        Phase::Idempotent,
    ];
}

/// A registered detection unit's type (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolType {
    Connect,
    Prefilter,
    Filter,
    Classifier,
    Composite,
    Postfilter,
    Idempotent,
    /// A `callback`-typed item: may parent `Virtual` symbols.
    Callback,
    /// A child of a `Callback` item; carries no callback of its own.
    Virtual,
}

impl SymbolType {
    /// The scheduling phase this symbol type runs in. Composites run across
    /// two phases depending on freeze-time classification and are scheduled
    /// by the composite evaluator rather than the phase DAG, so they have no
    /// single fixed phase here.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SymbolType::Connect => Some(Phase::Connect),
            SymbolType::Prefilter => Some(Phase::Prefilter),
            SymbolType::Filter | SymbolType::Callback | SymbolType::Virtual => Some(Phase::Filter),
            SymbolType::Classifier => Some(Phase::Classifier),
            SymbolType::Postfilter => Some(Phase::Postfilter),
            SymbolType::Idempotent => Some(Phase::Idempotent),
            SymbolType::Composite => None,
        }
    }
}

/// Boolean flags a symbol item may carry (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SymbolFlags {
    /// Fine-grained / high-confidence symbol.
    pub fine: bool,
    /// Never fires (placeholder / documentation-only symbol).
    pub empty: bool,
    /// Excluded from statistics collection; also makes referencing
    /// composites second-pass (spec §4.3.2).
    pub nostat: bool,
    /// Disabled unless explicitly re-enabled by settings.
    pub explicit_disable: bool,
    /// Continues running even after a passthrough short-circuit.
    pub ignore_passthrough: bool,
    /// Operates on MIME parts rather than the whole message.
    pub mime: bool,
    /// Implemented as a coroutine-style (suspend/resume) callback.
    pub coro: bool,
    /// Exempt from "squeeze" (ad-hoc batching) optimizations.
    pub no_squeeze: bool,
}

/// Per-symbol augmentations (spec §3), currently just an optional timeout
/// override used instead of the phase default (spec §4.1.3).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Augmentations {
    pub timeout: Option<Duration>,
}

/// A declared dependency edge, by name (resolved to an id at freeze).
///
/// `soft`: if the predecessor ends in `FAILED`/`TIMEOUT` rather than a
/// `DONE_*` state, a `soft` edge still counts as satisfied (spec §4.1.3
/// "State machine"); a non-soft edge instead transitively marks this item
/// `SKIPPED`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub soft: bool,
}

impl Dependency {
    pub fn hard(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soft: false,
        }
    }

    pub fn soft(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            soft: true,
        }
    }
}

/// A registered detection unit (spec §3 "Symbol item").
#[derive(Debug, Clone)]
pub struct SymbolItem {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolType,
    pub flags: SymbolFlags,
    /// Higher priority runs earlier within a phase.
    pub priority: i32,
    /// Default score multiplier applied when this symbol fires.
    pub weight: f64,
    pub group: Option<String>,
    /// `one_shot`: only the first result for this symbol in a task is kept.
    pub one_shot: bool,
    /// Declared dependencies, resolved to ids at freeze.
    pub dependencies: Vec<Dependency>,
    /// Parent callback id, for `Virtual` symbols.
    pub parent: Option<SymbolId>,
    pub augmentations: Augmentations,
    pub allowed_ids: Option<HashSet<String>>,
    pub forbidden_ids: Option<HashSet<String>>,
}

impl SymbolItem {
    /// Whether a settings object identified by `setting_id` permits this
    /// symbol to run (spec §4.1.3 step 1).
    pub fn allowed_for(&self, setting_id: Option<&str>) -> bool {
        if let Some(forbidden) = &self.forbidden_ids {
            if let Some(id) = setting_id {
                if forbidden.contains(id) {
                    return false;
                }
            }
        }
        if let Some(allowed) = &self.allowed_ids {
            return match setting_id {
                Some(id) => allowed.contains(id),
                None => false,
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_ids_are_unique_and_increasing() {
        let a = SymbolId::next();
        let b = SymbolId::next();
        assert!(a.as_u64() < b.as_u64());
    }

    #[test]
    fn phase_ordering_matches_spec_order() {
        assert!(Phase::Connect < Phase::Prefilter);
        assert!(Phase::Prefilter < Phase::Filter);
        assert!(Phase::Filter < Phase::Classifier);
        assert!(Phase::Classifier < Phase::CompositePass1);
        assert!(Phase::CompositePass1 < Phase::Postfilter);
        assert!(Phase::Postfilter < Phase::CompositePass2);
        assert!(Phase::CompositePass2 < Phase::Idempotent);
    }

    #[test]
    fn allowed_for_respects_forbidden_then_allowed() {
        let mut item = SymbolItem {
            id: SymbolId::next(),
            name: "TEST".into(),
            kind: SymbolType::Filter,
            flags: SymbolFlags::default(),
            priority: 0,
            weight: 1.0,
            group: None,
            one_shot: false,
            dependencies: Vec::new(),
            parent: None,
            augmentations: Augmentations::default(),
            allowed_ids: None,
            forbidden_ids: None,
        };
        assert!(item.allowed_for(Some("anything")));

        item.forbidden_ids = Some(["blocked".to_string()].into_iter().collect());
        assert!(!item.allowed_for(Some("blocked")));
        assert!(item.allowed_for(Some("ok")));

        item.allowed_ids = Some(["ok".to_string()].into_iter().collect());
        assert!(item.allowed_for(Some("ok")));
        assert!(!item.allowed_for(Some("other")));
        assert!(!item.allowed_for(None));
    }
}
