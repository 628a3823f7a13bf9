//! The scan-result accumulator (spec §3, §4.2).

use crate::actions::{Action, ActionMap};
use crate::bounded::{OrderedSet, DEFAULT_OPTION_CAP};
use std::collections::HashMap;
use thiserror::Error;

/// Default absolute per-symbol score cap (spec §4.2.1).
pub const DEFAULT_SYMBOL_CAP: f64 = 999.0;

#[derive(Debug, Error, PartialEq)]
pub enum AccumulatorError {
    #[error("symbol '{0}' is unknown and allow_unknown is not set")]
    UnknownSymbolDropped(String),
    #[error("insert for '{symbol}' rejected: raw score {candidate} exceeds cap {cap}")]
    CapExceeded {
        symbol: String,
        candidate: f64,
        cap: f64,
    },
    #[error("'{0}' is flagged one_shot and already has a recorded result")]
    OneShotIgnored(String),
}

/// Group score-cap metadata (spec §3 "symbol-group metadata").
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupMeta {
    pub max_score: Option<f64>,
    pub min_score: Option<f64>,
}

/// One record in the accumulator: a symbol's (or composite's) contribution.
#[derive(Debug, Clone)]
pub struct AccumRecord {
    pub symbol: String,
    /// Current raw score contribution. Mutated in place by composite
    /// policies (`remove_weight` zeroes it without deleting the record).
    pub raw_score: f64,
    pub options: OrderedSet,
    pub group: Option<String>,
    pub one_shot: bool,
    pub is_composite: bool,
}

/// An early-decision override that short-circuits action selection (spec
/// GLOSSARY "Passthrough").
#[derive(Debug, Clone)]
pub struct Passthrough {
    pub priority: i32,
    pub action: Action,
    pub message: Option<String>,
    pub module: Option<String>,
}

/// What the action-selection result exposes to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    pub action: Action,
    pub message: Option<String>,
    pub score: f64,
}

/// A request to insert a symbol result into the accumulator. Carries the
/// registration metadata the caller (scheduler) already knows, since the
/// accumulator itself holds no symbol registry (spec §4.2 keeps the
/// accumulator decoupled from the scheduler's configuration).
pub struct InsertRequest<'a> {
    pub symbol: &'a str,
    pub multiplier: f64,
    pub options: Vec<String>,
    /// `None` if the symbol has no registration.
    pub registered_weight: Option<f64>,
    pub group: Option<&'a str>,
    pub one_shot: bool,
    pub is_composite: bool,
}

/// The scan-result accumulator (spec §3, §4.2).
pub struct Accumulator {
    records: HashMap<String, AccumRecord>,
    insertion_order: Vec<String>,
    passthroughs: Vec<Passthrough>,
    groups: HashMap<String, GroupMeta>,
    pub action_map: ActionMap,
    pub grow_factor: Option<f64>,
    pub allow_unknown: bool,
    pub unknown_weight: f64,
    pub symbol_cap: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            insertion_order: Vec::new(),
            passthroughs: Vec::new(),
            groups: HashMap::new(),
            action_map: ActionMap::new(),
            grow_factor: None,
            allow_unknown: false,
            unknown_weight: 0.0,
            symbol_cap: DEFAULT_SYMBOL_CAP,
        }
    }

    pub fn set_group(&mut self, name: impl Into<String>, meta: GroupMeta) {
        self.groups.insert(name.into(), meta);
    }

    /// Insert (or merge into) a symbol result (spec §4.2.1 `insert`).
    pub fn insert(&mut self, req: InsertRequest<'_>) -> Result<(), AccumulatorError> {
        let weight = match req.registered_weight {
            Some(w) => w,
            None if self.allow_unknown => self.unknown_weight,
            None => return Err(AccumulatorError::UnknownSymbolDropped(req.symbol.to_string())),
        };

        if let Some(existing) = self.records.get(req.symbol) {
            if existing.one_shot {
                return Err(AccumulatorError::OneShotIgnored(req.symbol.to_string()));
            }
            let candidate = existing.raw_score + req.multiplier * weight;
            if candidate.abs() > self.symbol_cap {
                return Err(AccumulatorError::CapExceeded {
                    symbol: req.symbol.to_string(),
                    candidate,
                    cap: self.symbol_cap,
                });
            }
            let record = self.records.get_mut(req.symbol).unwrap();
            record.raw_score = candidate;
            record.options.extend(req.options);
        } else {
            let candidate = req.multiplier * weight;
            if candidate.abs() > self.symbol_cap {
                return Err(AccumulatorError::CapExceeded {
                    symbol: req.symbol.to_string(),
                    candidate,
                    cap: self.symbol_cap,
                });
            }
            let mut options = OrderedSet::with_capacity(DEFAULT_OPTION_CAP);
            options.extend(req.options);
            self.records.insert(
                req.symbol.to_string(),
                AccumRecord {
                    symbol: req.symbol.to_string(),
                    raw_score: candidate,
                    options,
                    group: req.group.map(str::to_string),
                    one_shot: req.one_shot,
                    is_composite: req.is_composite,
                },
            );
            self.insertion_order.push(req.symbol.to_string());
        }
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&AccumRecord> {
        self.records.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.records.contains_key(symbol)
    }

    /// Iterate records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &AccumRecord> {
        self.insertion_order
            .iter()
            .filter_map(|name| self.records.get(name))
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    // -- composite removal policies (spec §4.3.3 step 3) ------------------

    /// `remove_all`: delete the record entirely.
    pub fn remove_all(&mut self, symbol: &str) {
        self.records.remove(symbol);
    }

    /// `remove_symbol`: delete the record only if its score is non-negative.
    pub fn remove_symbol(&mut self, symbol: &str) {
        if let Some(record) = self.records.get(symbol) {
            if record.raw_score >= 0.0 {
                self.records.remove(symbol);
            }
        }
    }

    /// `remove_weight`: keep the record, zero its score contribution.
    pub fn remove_weight(&mut self, symbol: &str) {
        if let Some(record) = self.records.get_mut(symbol) {
            record.raw_score = 0.0;
        }
    }

    // -- passthroughs (spec §4.1.1 `add_passthrough`, §4.2.1 step 1) ------

    pub fn add_passthrough(&mut self, passthrough: Passthrough) {
        self.passthroughs.push(passthrough);
    }

    pub fn passthroughs(&self) -> &[Passthrough] {
        &self.passthroughs
    }

    /// The highest-priority passthrough, if any have been recorded.
    pub fn winning_passthrough(&self) -> Option<&Passthrough> {
        self.passthroughs.iter().max_by_key(|p| p.priority)
    }

    /// The minimum priority a scheduled item must have (or carry
    /// `ignore_passthrough`) to keep running after the current passthrough
    /// set (spec §4.1.3 "Passthrough short-circuit").
    pub fn passthrough_floor(&self) -> Option<i32> {
        self.passthroughs.iter().map(|p| p.priority).max()
    }

    // -- scoring (spec §4.2.1 `action`) ------------------------------------

    /// Raw score before grow-factor normalization: the sum of per-group
    /// clamped contributions plus ungrouped/composite contributions (spec
    /// §4.2.1 step 2, §8 invariant `|score - sum(clamped group
    /// contributions)| <= 1e-9`). Composites never contribute to a group's
    /// clamp (spec §9 Open Question 2).
    pub fn raw_score(&self) -> f64 {
        let mut group_totals: HashMap<&str, f64> = HashMap::new();
        let mut direct = 0.0;

        for record in self.records.values() {
            match (&record.group, record.is_composite) {
                (Some(group), false) => {
                    *group_totals.entry(group.as_str()).or_insert(0.0) += record.raw_score;
                }
                _ => direct += record.raw_score,
            }
        }

        let clamped_groups: f64 = group_totals
            .into_iter()
            .map(|(group, total)| match self.groups.get(group) {
                Some(meta) => total.clamp(
                    meta.min_score.unwrap_or(f64::NEG_INFINITY),
                    meta.max_score.unwrap_or(f64::INFINITY),
                ),
                None => total,
            })
            .sum();

        direct + clamped_groups
    }

    /// Compute the final action (spec §4.2.1 `action()`).
    pub fn action(&self) -> ActionResult {
        if let Some(pt) = self.winning_passthrough() {
            return ActionResult {
                action: pt.action,
                message: pt.message.clone(),
                score: self.raw_score(),
            };
        }

        let mut score = self.raw_score();
        let reject_threshold = self.action_map.threshold_of(Action::Reject);
        if let (Some(reject_threshold), Some(grow)) = (reject_threshold, self.grow_factor) {
            if score > reject_threshold {
                score = reject_threshold + (score - reject_threshold) * grow;
            }
        }

        let action = self.action_map.select(score).unwrap_or(Action::NoAction);
        ActionResult {
            action,
            message: None,
            score,
        }
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req<'a>(symbol: &'a str, multiplier: f64, weight: f64) -> InsertRequest<'a> {
        InsertRequest {
            symbol,
            multiplier,
            options: Vec::new(),
            registered_weight: Some(weight),
            group: None,
            one_shot: false,
            is_composite: false,
        }
    }

    #[test]
    fn insert_accumulates_across_calls() {
        let mut acc = Accumulator::new();
        acc.insert(req("A", 1.0, 2.0)).unwrap();
        acc.insert(req("A", 1.0, 2.0)).unwrap();
        assert_eq!(acc.get("A").unwrap().raw_score, 4.0);
    }

    #[test]
    fn one_shot_ignores_subsequent_inserts() {
        let mut acc = Accumulator::new();
        let mut first = req("A", 1.0, 2.0);
        first.one_shot = true;
        acc.insert(first).unwrap();

        let mut second = req("A", 1.0, 2.0);
        second.one_shot = true;
        let err = acc.insert(second).unwrap_err();
        assert_eq!(err, AccumulatorError::OneShotIgnored("A".into()));
        assert_eq!(acc.get("A").unwrap().raw_score, 2.0);
    }

    #[test]
    fn unknown_symbol_dropped_without_allow_unknown() {
        let mut acc = Accumulator::new();
        let r = InsertRequest {
            symbol: "X",
            multiplier: 1.0,
            options: Vec::new(),
            registered_weight: None,
            group: None,
            one_shot: false,
            is_composite: false,
        };
        assert!(acc.insert(r).is_err());
        assert!(!acc.contains("X"));
    }

    #[test]
    fn unknown_symbol_uses_unknown_weight_when_allowed() {
        let mut acc = Accumulator::new();
        acc.allow_unknown = true;
        acc.unknown_weight = 1.5;
        let r = InsertRequest {
            symbol: "X",
            multiplier: 2.0,
            options: Vec::new(),
            registered_weight: None,
            group: None,
            one_shot: false,
            is_composite: false,
        };
        acc.insert(r).unwrap();
        assert_eq!(acc.get("X").unwrap().raw_score, 3.0);
    }

    #[test]
    fn cap_rejects_oversized_insert() {
        let mut acc = Accumulator::new();
        acc.symbol_cap = 10.0;
        let err = acc.insert(req("A", 20.0, 1.0)).unwrap_err();
        assert!(matches!(err, AccumulatorError::CapExceeded { .. }));
        assert!(!acc.contains("A"));
    }

    #[test]
    fn group_cap_clamps_total_not_record() {
        let mut acc = Accumulator::new();
        acc.set_group(
            "NET",
            GroupMeta {
                max_score: Some(3.0),
                min_score: None,
            },
        );
        let mut a = req("A", 1.0, 2.0);
        a.group = Some("NET");
        acc.insert(a).unwrap();
        let mut b = req("B", 1.0, 2.0);
        b.group = Some("NET");
        acc.insert(b).unwrap();

        assert_eq!(acc.get("A").unwrap().raw_score, 2.0);
        assert_eq!(acc.get("B").unwrap().raw_score, 2.0);
        assert_eq!(acc.raw_score(), 3.0);
    }

    #[test]
    fn composites_excluded_from_group_cap() {
        let mut acc = Accumulator::new();
        acc.set_group(
            "NET",
            GroupMeta {
                max_score: Some(1.0),
                min_score: None,
            },
        );
        let mut a = req("A", 1.0, 5.0);
        a.group = Some("NET");
        acc.insert(a).unwrap();

        let mut c = req("C", 1.0, 5.0);
        c.group = Some("NET");
        c.is_composite = true;
        acc.insert(c).unwrap();

        // A clamps to 1.0 (group cap); C bypasses the cap entirely.
        assert_eq!(acc.raw_score(), 1.0 + 5.0);
    }

    #[test]
    fn remove_weight_keeps_presence_zeroes_score() {
        let mut acc = Accumulator::new();
        acc.insert(req("A", 1.0, 2.0)).unwrap();
        acc.remove_weight("A");
        assert!(acc.contains("A"));
        assert_eq!(acc.get("A").unwrap().raw_score, 0.0);
    }

    #[test]
    fn remove_symbol_only_removes_nonnegative() {
        let mut acc = Accumulator::new();
        acc.insert(req("POS", 1.0, 2.0)).unwrap();
        acc.insert(req("NEG", 1.0, -2.0)).unwrap();
        acc.remove_symbol("POS");
        acc.remove_symbol("NEG");
        assert!(!acc.contains("POS"));
        assert!(acc.contains("NEG"));
    }

    #[test]
    fn passthrough_wins_regardless_of_score() {
        let mut acc = Accumulator::new();
        acc.action_map.set(Action::Reject, 15.0);
        acc.insert(req("A", 1.0, 100.0)).unwrap();
        acc.add_passthrough(Passthrough {
            priority: 10,
            action: Action::Greylist,
            message: Some("blocked".into()),
            module: None,
        });
        let result = acc.action();
        assert_eq!(result.action, Action::Greylist);
        assert_eq!(result.message.as_deref(), Some("blocked"));
    }

    #[test]
    fn highest_priority_passthrough_wins() {
        let mut acc = Accumulator::new();
        acc.add_passthrough(Passthrough {
            priority: 5,
            action: Action::Greylist,
            message: None,
            module: None,
        });
        acc.add_passthrough(Passthrough {
            priority: 10,
            action: Action::Reject,
            message: None,
            module: None,
        });
        assert_eq!(acc.action().action, Action::Reject);
    }

    #[test]
    fn grow_factor_normalizes_score_above_reject_threshold() {
        let mut acc = Accumulator::new();
        acc.action_map.set(Action::Reject, 15.0);
        acc.grow_factor = Some(1.1);
        acc.insert(req("A", 1.0, 25.0)).unwrap();
        let result = acc.action();
        assert!((result.score - 26.0).abs() < 1e-9);
        assert_eq!(result.action, Action::Reject);
    }
}
