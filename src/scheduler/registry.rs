//! Item registration and freeze (spec §4.1.1, §4.1.2).

use crate::scheduler::callback::{Condition, SymbolCallback};
use crate::scheduler::freeze::{freeze_phases, FreezeWarning, PhasePlan, ResolvedDependency};
use crate::symbol::{Augmentations, Dependency, Phase, SymbolFlags, SymbolId, SymbolItem, SymbolType};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("symbol '{0}' is already registered")]
    DuplicateName(String),
    #[error("parent '{parent}' for symbol '{child}' is not a registered callback item")]
    InvalidParent { child: String, parent: String },
}

/// A symbol registration request (spec §4.1.1 `register`). Built with the
/// `with_*` methods; `parent` is a name, resolved immediately against
/// already-registered items (spec §3: "a parent that is a callback-typed
/// item registered before it").
#[derive(Debug, Clone)]
pub struct SymbolSpec {
    pub name: String,
    pub kind: SymbolType,
    pub flags: SymbolFlags,
    pub priority: i32,
    pub weight: f64,
    pub group: Option<String>,
    pub one_shot: bool,
    pub dependencies: Vec<Dependency>,
    pub parent: Option<String>,
    pub augmentations: Augmentations,
    pub allowed_ids: Option<HashSet<String>>,
    pub forbidden_ids: Option<HashSet<String>>,
}

impl SymbolSpec {
    pub fn new(name: impl Into<String>, kind: SymbolType) -> Self {
        Self {
            name: name.into(),
            kind,
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
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_one_shot(mut self, one_shot: bool) -> Self {
        self.one_shot = one_shot;
        self
    }

    pub fn with_flags(mut self, flags: SymbolFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_dependency(mut self, dep: Dependency) -> Self {
        self.dependencies.push(dep);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.augmentations.timeout = Some(timeout);
        self
    }

    pub fn with_allowed_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allowed_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_forbidden_ids(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.forbidden_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// Not-yet-frozen symbol configuration (spec §3 "Lifecycles": "the
/// configuration... is built once, frozen, and shared read-only across
/// tasks").
#[derive(Default)]
pub struct SymbolRegistry {
    items: Vec<SymbolItem>,
    name_index: HashMap<String, usize>,
    callbacks: HashMap<SymbolId, Arc<dyn SymbolCallback>>,
    conditions: HashMap<SymbolId, Vec<Arc<dyn Condition>>>,
    pending_conditions: Vec<(String, Arc<dyn Condition>)>,
    pending_edges: Vec<(String, String, bool)>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_parent(&self, spec: &SymbolSpec) -> Result<Option<SymbolId>, RegistrationError> {
        match &spec.parent {
            None => Ok(None),
            Some(parent_name) => {
                let idx = *self.name_index.get(parent_name).ok_or_else(|| RegistrationError::InvalidParent {
                    child: spec.name.clone(),
                    parent: parent_name.clone(),
                })?;
                let parent_item = &self.items[idx];
                if parent_item.kind != SymbolType::Callback {
                    return Err(RegistrationError::InvalidParent {
                        child: spec.name.clone(),
                        parent: parent_name.clone(),
                    });
                }
                Ok(Some(parent_item.id))
            }
        }
    }

    /// `register` (spec §4.1.1).
    pub fn register(
        &mut self,
        spec: SymbolSpec,
        callback: Option<Arc<dyn SymbolCallback>>,
    ) -> Result<SymbolId, RegistrationError> {
        if spec.kind == SymbolType::Virtual && spec.parent.is_none() {
            return Err(RegistrationError::InvalidParent {
                child: spec.name.clone(),
                parent: String::new(),
            });
        }

        if let Some(&idx) = self.name_index.get(&spec.name) {
            let existing = &self.items[idx];
            // Virtual-extension rule: a name may be registered twice only
            // if the first registration was a scoreless `callback` item and
            // the second is also a `callback` registration supplying score.
            let is_extension = existing.kind == SymbolType::Callback
                && existing.weight == 0.0
                && spec.kind == SymbolType::Callback;
            if !is_extension {
                return Err(RegistrationError::DuplicateName(spec.name));
            }
            let id = existing.id;
            let parent = self.resolve_parent(&spec)?;
            self.items[idx] = build_item(id, spec, parent);
            if let Some(cb) = callback {
                self.callbacks.insert(id, cb);
            }
            return Ok(id);
        }

        let parent = self.resolve_parent(&spec)?;
        let id = SymbolId::next();
        let item = build_item(id, spec, parent);
        self.name_index.insert(item.name.clone(), self.items.len());
        self.items.push(item);
        if let Some(cb) = callback {
            self.callbacks.insert(id, cb);
        }
        Ok(id)
    }

    /// `register_dependency` (spec §4.1.1): adds an edge by name; unknown
    /// names are stored pending and resolved at freeze, at which point
    /// still-unresolved edges are logged and dropped.
    pub fn register_dependency(&mut self, child_name: impl Into<String>, parent_name: impl Into<String>, soft: bool) {
        self.pending_edges.push((child_name.into(), parent_name.into(), soft));
    }

    /// `register_condition` (spec §4.1.1).
    pub fn register_condition(&mut self, name: impl Into<String>, condition: Arc<dyn Condition>) {
        self.pending_conditions.push((name.into(), condition));
    }

    /// Freeze the registry into an execution plan. Returns the frozen
    /// schedule plus any non-fatal warnings noticed along the way (spec §7:
    /// none of these abort startup).
    pub fn freeze(mut self) -> (FrozenSchedule, Vec<FreezeWarning>) {
        let mut warnings = Vec::new();

        for (child, parent, soft) in self.pending_edges.drain(..) {
            if let Some(&idx) = self.name_index.get(&child) {
                self.items[idx].dependencies.push(Dependency { name: parent, soft });
            } else {
                warnings.push(FreezeWarning::UnresolvedDependency { child, parent });
            }
        }

        for (name, condition) in self.pending_conditions.drain(..) {
            if let Some(&idx) = self.name_index.get(&name) {
                let id = self.items[idx].id;
                self.conditions.entry(id).or_default().push(condition);
            } else {
                warnings.push(FreezeWarning::UnresolvedCondition { symbol: name });
            }
        }

        let name_index: HashMap<String, SymbolId> = self.items.iter().map(|it| (it.name.clone(), it.id)).collect();
        let id_index: HashMap<SymbolId, usize> = self.items.iter().enumerate().map(|(i, it)| (it.id, i)).collect();
        // Virtual items ride along with their parent callback's result (spec
        // §3) rather than being scheduled as independent DAG members.
        let phase_of: HashMap<SymbolId, Phase> = self
            .items
            .iter()
            .filter(|it| it.kind != SymbolType::Virtual)
            .filter_map(|it| it.kind.phase().map(|p| (it.id, p)))
            .collect();

        let out = freeze_phases(&self.items, &name_index, &phase_of);
        warnings.extend(out.warnings);

        let frozen = FrozenSchedule {
            items: self.items,
            id_index,
            name_index,
            callbacks: self.callbacks,
            conditions: self.conditions,
            phases: out.phases,
            external_predecessors: out.external_predecessors,
        };
        (frozen, warnings)
    }
}

fn build_item(id: SymbolId, spec: SymbolSpec, parent: Option<SymbolId>) -> SymbolItem {
    SymbolItem {
        id,
        name: spec.name,
        kind: spec.kind,
        flags: spec.flags,
        priority: spec.priority,
        weight: spec.weight,
        group: spec.group,
        one_shot: spec.one_shot,
        dependencies: spec.dependencies,
        parent,
        augmentations: spec.augmentations,
        allowed_ids: spec.allowed_ids,
        forbidden_ids: spec.forbidden_ids,
    }
}

/// The frozen, read-only-shared configuration (spec §3 "Lifecycles").
pub struct FrozenSchedule {
    pub items: Vec<SymbolItem>,
    id_index: HashMap<SymbolId, usize>,
    pub name_index: HashMap<String, SymbolId>,
    pub callbacks: HashMap<SymbolId, Arc<dyn SymbolCallback>>,
    pub conditions: HashMap<SymbolId, Vec<Arc<dyn Condition>>>,
    pub phases: HashMap<Phase, PhasePlan>,
    pub external_predecessors: HashMap<SymbolId, Vec<ResolvedDependency>>,
}

impl FrozenSchedule {
    pub fn item(&self, id: SymbolId) -> &SymbolItem {
        &self.items[self.id_index[&id]]
    }

    pub fn id_of(&self, name: &str) -> Option<SymbolId> {
        self.name_index.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = SymbolRegistry::new();
        reg.register(SymbolSpec::new("A", SymbolType::Filter), None).unwrap();
        let err = reg.register(SymbolSpec::new("A", SymbolType::Filter), None).unwrap_err();
        assert_eq!(err, RegistrationError::DuplicateName("A".into()));
    }

    #[test]
    fn virtual_extension_allowed_for_scoreless_callback() {
        let mut reg = SymbolRegistry::new();
        let mut first = SymbolSpec::new("CB", SymbolType::Callback);
        first.weight = 0.0;
        let id1 = reg.register(first, None).unwrap();
        let second = SymbolSpec::new("CB", SymbolType::Callback).with_weight(3.0);
        let id2 = reg.register(second, None).unwrap();
        assert_eq!(id1, id2);
    }

    #[test]
    fn virtual_requires_registered_callback_parent() {
        let mut reg = SymbolRegistry::new();
        let err = reg
            .register(SymbolSpec::new("V", SymbolType::Virtual).with_parent("CB"), None)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidParent { .. }));

        reg.register(SymbolSpec::new("CB", SymbolType::Callback), None).unwrap();
        reg.register(SymbolSpec::new("V", SymbolType::Virtual).with_parent("CB"), None)
            .unwrap();
    }

    #[test]
    fn freeze_partitions_into_phases() {
        let mut reg = SymbolRegistry::new();
        reg.register(SymbolSpec::new("A", SymbolType::Filter), None).unwrap();
        reg.register(SymbolSpec::new("B", SymbolType::Postfilter), None).unwrap();
        let (frozen, warnings) = reg.freeze();
        assert!(warnings.is_empty());
        assert_eq!(frozen.phases[&Phase::Filter].order.len(), 1);
        assert_eq!(frozen.phases[&Phase::Postfilter].order.len(), 1);
    }
}
