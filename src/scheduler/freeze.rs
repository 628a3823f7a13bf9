//! Phase partitioning and per-phase dependency-ordered scheduling (spec
//! §4.1.2 "Freeze").

use crate::symbol::{Phase, SymbolId, SymbolItem};
use std::collections::{HashMap, HashSet};

/// A dependency resolved to a concrete [`SymbolId`] (spec §3 "dependency
/// names... resolved to ids at freeze").
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDependency {
    pub id: SymbolId,
    pub soft: bool,
}

/// A non-fatal condition noticed while freezing the configuration. None of
/// these abort startup (spec §7 propagation policy); they are logged and
/// the offending edge/definition is dropped.
#[derive(Debug, Clone)]
pub enum FreezeWarning {
    UnresolvedDependency { child: String, parent: String },
    CrossPhaseDependency { child: String, parent: String },
    DependencyCycle { phase: Phase, symbols: Vec<String> },
    UnresolvedCondition { symbol: String },
}

/// The execution plan for one phase: a deterministic order plus the
/// same-phase predecessor/successor edges used to drive the runnable queue
/// at task time.
#[derive(Debug, Clone, Default)]
pub struct PhasePlan {
    /// Deterministic order respecting dependency rank, then (descending
    /// priority, ascending name) within a rank (spec §4.1.2 step 2).
    pub order: Vec<SymbolId>,
    pub predecessors: HashMap<SymbolId, Vec<ResolvedDependency>>,
    pub successors: HashMap<SymbolId, Vec<SymbolId>>,
}

/// The output of freezing all phases: a plan per phase plus, for every
/// item, the resolved dependencies that live in an *earlier* phase (already
/// guaranteed complete by phase ordering, but still consulted for the
/// soft/hard SKIPPED-propagation rule, spec §4.1.3 "State machine").
pub struct FreezeOutput {
    pub phases: HashMap<Phase, PhasePlan>,
    pub external_predecessors: HashMap<SymbolId, Vec<ResolvedDependency>>,
    pub warnings: Vec<FreezeWarning>,
}

/// Build phase plans for every schedulable item (non-`Virtual`,
/// non-`Composite` — composites are evaluated by
/// [`crate::composite`], not this DAG).
pub fn freeze_phases(
    items: &[SymbolItem],
    name_index: &HashMap<String, SymbolId>,
    phase_of: &HashMap<SymbolId, Phase>,
) -> FreezeOutput {
    let mut warnings = Vec::new();
    let mut phases: HashMap<Phase, PhasePlan> = HashMap::new();
    let mut external_predecessors: HashMap<SymbolId, Vec<ResolvedDependency>> = HashMap::new();

    for &phase in Phase::ALL.iter() {
        let members: Vec<&SymbolItem> = items
            .iter()
            .filter(|it| phase_of.get(&it.id) == Some(&phase))
            .collect();
        if members.is_empty() {
            continue;
        }

        let member_ids: HashSet<SymbolId> = members.iter().map(|it| it.id).collect();
        let mut predecessors: HashMap<SymbolId, Vec<ResolvedDependency>> = HashMap::new();
        let mut successors: HashMap<SymbolId, Vec<SymbolId>> = HashMap::new();
        for it in &members {
            predecessors.entry(it.id).or_default();
            successors.entry(it.id).or_default();
        }

        for it in &members {
            for dep in &it.dependencies {
                let Some(&dep_id) = name_index.get(&dep.name) else {
                    warnings.push(FreezeWarning::UnresolvedDependency {
                        child: it.name.clone(),
                        parent: dep.name.clone(),
                    });
                    continue;
                };
                let dep_phase = phase_of.get(&dep_id).copied();
                match dep_phase {
                    Some(p) if p < phase => {
                        external_predecessors.entry(it.id).or_default().push(ResolvedDependency {
                            id: dep_id,
                            soft: dep.soft,
                        });
                    }
                    Some(p) if p == phase => {
                        if member_ids.contains(&dep_id) {
                            predecessors.entry(it.id).or_default().push(ResolvedDependency {
                                id: dep_id,
                                soft: dep.soft,
                            });
                            successors.entry(dep_id).or_default().push(it.id);
                        }
                    }
                    Some(_) => {
                        warnings.push(FreezeWarning::CrossPhaseDependency {
                            child: it.name.clone(),
                            parent: dep.name.clone(),
                        });
                    }
                    None => {
                        // Dependency resolves to a Virtual/Composite item:
                        // not part of any DAG; nothing to enforce here.
                    }
                }
            }
        }

        let order = topo_sort(&members, &mut predecessors, &phase, &mut warnings);
        phases.insert(
            phase,
            PhasePlan {
                order,
                predecessors,
                successors,
            },
        );
    }

    FreezeOutput {
        phases,
        external_predecessors,
        warnings,
    }
}

/// Kahn's algorithm, breaking ties within a rank by (descending priority,
/// ascending name) (spec §4.1.2 step 2). Cycles are broken by dropping the
/// incoming edges of whatever remains once no zero-in-degree node exists,
/// logging the affected names (spec §3, §7 `DependencyCycle`).
fn topo_sort(
    members: &[&SymbolItem],
    predecessors: &mut HashMap<SymbolId, Vec<ResolvedDependency>>,
    phase: &Phase,
    warnings: &mut Vec<FreezeWarning>,
) -> Vec<SymbolId> {
    let by_id: HashMap<SymbolId, &SymbolItem> = members.iter().map(|it| (it.id, *it)).collect();
    let mut remaining: HashSet<SymbolId> = members.iter().map(|it| it.id).collect();
    let mut order = Vec::with_capacity(members.len());

    while !remaining.is_empty() {
        let mut ready: Vec<SymbolId> = remaining
            .iter()
            .copied()
            .filter(|id| {
                predecessors
                    .get(id)
                    .map(|preds| preds.iter().all(|p| !remaining.contains(&p.id)))
                    .unwrap_or(true)
            })
            .collect();

        if ready.is_empty() {
            // Every remaining node has at least one remaining predecessor:
            // a cycle. Drop all edges among the remaining set and report it.
            let mut names: Vec<String> = remaining.iter().filter_map(|id| by_id.get(id)).map(|it| it.name.clone()).collect();
            names.sort();
            warnings.push(FreezeWarning::DependencyCycle {
                phase: *phase,
                symbols: names,
            });
            for id in &remaining {
                if let Some(preds) = predecessors.get_mut(id) {
                    preds.retain(|p| !remaining.contains(&p.id));
                }
            }
            ready = remaining.iter().copied().collect();
        }

        ready.sort_by(|a, b| {
            let ia = by_id[a];
            let ib = by_id[b];
            ib.priority.cmp(&ia.priority).then_with(|| ia.name.cmp(&ib.name))
        });

        for id in ready {
            order.push(id);
            remaining.remove(&id);
        }
    }

    order
}
