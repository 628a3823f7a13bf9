//! Freeze-time second-pass classification (spec §4.3.2).

use super::model::Composite;
use crate::scheduler::FrozenSchedule;
use crate::symbol::SymbolType;
use std::collections::HashMap;

/// Mark composites `second_pass` to a fixed point. An atom is
/// second-pass-inducing if it names a `postfilter`/`classifier`-typed
/// symbol, a symbol flagged `nostat`, carries the `^` forward-reference
/// modifier, or names another composite already classified second-pass.
/// Monotone (a composite never flips back), so this terminates within
/// `composites.len()` outer passes.
pub fn classify(composites: &mut [Composite], frozen: &FrozenSchedule) {
    loop {
        let snapshot: HashMap<String, bool> = composites.iter().map(|c| (c.name.clone(), c.second_pass)).collect();
        let mut changed = false;

        for composite in composites.iter_mut() {
            if composite.second_pass {
                continue;
            }
            let mut inducing = false;
            composite.expr.walk_atoms(&mut |atom| {
                if inducing {
                    return;
                }
                if atom.modifiers.forward {
                    inducing = true;
                    return;
                }
                let Some(name) = atom.symbol_name() else {
                    return;
                };
                if let Some(id) = frozen.id_of(name) {
                    let item = frozen.item(id);
                    if matches!(item.kind, SymbolType::Postfilter | SymbolType::Classifier) || item.flags.nostat {
                        inducing = true;
                        return;
                    }
                }
                if snapshot.get(name).copied().unwrap_or(false) {
                    inducing = true;
                }
            });

            if inducing {
                composite.second_pass = true;
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
}
