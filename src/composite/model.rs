//! Composite data model (spec §3 "Composite", §4.3).

use crate::expr::Expr;

/// What happens to a contributing symbol once its composite fires (spec
/// §4.3.3 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    RemoveAll,
    RemoveSymbol,
    RemoveWeight,
    Leave,
}

impl Policy {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "remove_all" => Policy::RemoveAll,
            "remove_symbol" => Policy::RemoveSymbol,
            "remove_weight" => Policy::RemoveWeight,
            "leave" => Policy::Leave,
            _ => return None,
        })
    }
}

/// A registered composite (spec §3): name, score, group, policy, parsed
/// expression, and a `second_pass` flag derived at freeze (spec §4.3.2),
/// never authored directly.
#[derive(Debug, Clone)]
pub struct Composite {
    pub name: String,
    pub score: f64,
    pub group: Option<String>,
    pub policy: Policy,
    pub priority: i32,
    pub expr: Expr,
    pub second_pass: bool,
}
