//! The final categorical decision for a task (spec §4.2.1, GLOSSARY).

use std::collections::HashMap;
use std::fmt;

/// A final action selection (spec GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    NoAction,
    Greylist,
    AddHeader,
    RewriteSubject,
    SoftReject,
    Reject,
    Discard,
    Quarantine,
}

impl Action {
    /// Default severity rank, least to greatest (spec §4.2.1 step 4).
    pub fn default_severity(&self) -> u8 {
        match self {
            Action::NoAction => 0,
            Action::Greylist => 1,
            Action::AddHeader => 2,
            Action::RewriteSubject => 3,
            Action::SoftReject => 4,
            Action::Reject => 5,
            Action::Discard => 6,
            Action::Quarantine => 7,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::NoAction => "no_action",
            Action::Greylist => "greylist",
            Action::AddHeader => "add_header",
            Action::RewriteSubject => "rewrite_subject",
            Action::SoftReject => "soft_reject",
            Action::Reject => "reject",
            Action::Discard => "discard",
            Action::Quarantine => "quarantine",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "no_action" => Action::NoAction,
            "greylist" => Action::Greylist,
            "add_header" => Action::AddHeader,
            "rewrite_subject" => Action::RewriteSubject,
            "soft_reject" => Action::SoftReject,
            "reject" => Action::Reject,
            "discard" => Action::Discard,
            "quarantine" => Action::Quarantine,
            _ => return None,
        })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A configured action: its score threshold and tie-breaking priority.
///
/// Priority defaults to the action's [`Action::default_severity`] so that,
/// absent explicit configuration, ties between equal thresholds resolve by
/// severity order: on tie, the action declared with the higher explicit
/// priority wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionThreshold {
    pub threshold: f64,
    pub priority: i32,
}

/// The map from action name to threshold (spec §3 accumulator data, §4.2.1).
#[derive(Debug, Clone, Default)]
pub struct ActionMap {
    entries: HashMap<Action, ActionThreshold>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action's threshold, defaulting its tie-break priority to
    /// its severity rank.
    pub fn set(&mut self, action: Action, threshold: f64) -> &mut Self {
        self.set_with_priority(action, threshold, action.default_severity() as i32)
    }

    pub fn set_with_priority(&mut self, action: Action, threshold: f64, priority: i32) -> &mut Self {
        self.entries.insert(
            action,
            ActionThreshold {
                threshold,
                priority,
            },
        );
        self
    }

    /// Select the action whose threshold is the greatest threshold `<=
    /// score`; ties broken by the higher declared priority (spec §4.2.1
    /// step 4). Returns `None` if no configured action's threshold is `<=
    /// score` (callers should treat this as `no_action` if `no_action` is
    /// not itself configured with a threshold).
    pub fn select(&self, score: f64) -> Option<Action> {
        self.entries
            .iter()
            .filter(|(_, t)| t.threshold <= score)
            .max_by(|(_, a), (_, b)| {
                a.threshold
                    .partial_cmp(&b.threshold)
                    .unwrap()
                    .then(a.priority.cmp(&b.priority))
            })
            .map(|(action, _)| *action)
    }

    /// The configured threshold for a specific action, if registered.
    pub fn threshold_of(&self, action: Action) -> Option<f64> {
        self.entries.get(&action).map(|t| t.threshold)
    }
}
