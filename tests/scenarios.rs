//! End-to-end scenario tests (spec §8 "Testable properties").

use sievecore::accumulator::{Accumulator, Passthrough};
use sievecore::actions::Action;
use sievecore::composite::{CompositeRegistry, Policy};
use sievecore::config::Config;
use sievecore::scheduler::callback::{CallbackOutcome, Emitter, FnCallback, TaskView};
use sievecore::scheduler::{SymbolRegistry, SymbolSpec};
use sievecore::symbol::{Dependency, SymbolType};
use sievecore::task::{Envelope, MessageHandle, Settings, Task};
use sievecore::Engine;
use std::sync::Arc;
use std::time::Duration;

fn fires(multiplier: f64) -> Arc<dyn sievecore::scheduler::callback::SymbolCallback> {
    Arc::new(FnCallback(move |_: &TaskView<'_>, _: &mut Emitter<'_>| CallbackOutcome::fired(multiplier, Vec::<String>::new())))
}

fn pending() -> Arc<dyn sievecore::scheduler::callback::SymbolCallback> {
    Arc::new(FnCallback(|_: &TaskView<'_>, _: &mut Emitter<'_>| CallbackOutcome::Pending))
}

fn task() -> Task {
    Task::new(MessageHandle::new(b"hi".to_vec()), Envelope::default(), Settings::default(), Duration::from_secs(5))
}

fn config_with_reject(threshold: f64) -> Config {
    let mut config = Config::default();
    config.actions.insert("reject".to_string(), threshold);
    config
}

/// S1 — simple composite with `remove_all`.
#[test]
fn s1_simple_composite_remove_all() {
    let mut symbols = SymbolRegistry::new();
    symbols.register(SymbolSpec::new("A", SymbolType::Filter).with_weight(1.0), Some(fires(1.0))).unwrap();
    symbols.register(SymbolSpec::new("B", SymbolType::Filter).with_weight(2.0), Some(fires(1.0))).unwrap();

    let mut composites = CompositeRegistry::new();
    composites.register("C", "A & B", 5.0, Policy::RemoveAll, None, 0).unwrap();

    let (engine, warnings) = Engine::build(symbols, composites, config_with_reject(4.0), Duration::from_secs(1));
    assert!(warnings.is_empty());

    let (result, errors) = engine.run_task(task());
    assert!(errors.is_empty());
    assert_eq!(result.symbols.len(), 1);
    assert_eq!(result.symbols[0].name, "C");
    assert!((result.score - 5.0).abs() < 1e-9);
}

/// S2 — `remove_weight` policy keeps the records but zeroes their score.
#[test]
fn s2_remove_weight_keeps_records_zeroes_score() {
    let mut symbols = SymbolRegistry::new();
    symbols.register(SymbolSpec::new("A", SymbolType::Filter).with_weight(1.0), Some(fires(1.0))).unwrap();
    symbols.register(SymbolSpec::new("B", SymbolType::Filter).with_weight(2.0), Some(fires(1.0))).unwrap();

    let mut composites = CompositeRegistry::new();
    composites.register("C", "A & B", 5.0, Policy::RemoveWeight, None, 0).unwrap();

    let (engine, _) = Engine::build(symbols, composites, Config::default(), Duration::from_secs(1));
    let (result, _) = engine.run_task(task());

    let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"A"));
    assert!(names.contains(&"B"));
    assert!(names.contains(&"C"));

    let a = result.symbols.iter().find(|s| s.name == "A").unwrap();
    let b = result.symbols.iter().find(|s| s.name == "B").unwrap();
    assert_eq!(a.score, 0.0);
    assert_eq!(b.score, 0.0);
    assert!((result.score - 5.0).abs() < 1e-9);
}

/// S3 — `~` protects a contributing atom from the removal policy.
#[test]
fn s3_tilde_protects_atom() {
    let mut symbols = SymbolRegistry::new();
    symbols.register(SymbolSpec::new("A", SymbolType::Filter).with_weight(1.0), Some(fires(1.0))).unwrap();
    symbols.register(SymbolSpec::new("B", SymbolType::Filter).with_weight(2.0), Some(fires(1.0))).unwrap();

    let mut composites = CompositeRegistry::new();
    composites.register("C", "~A & B", 5.0, Policy::RemoveAll, None, 0).unwrap();

    let (engine, _) = Engine::build(symbols, composites, Config::default(), Duration::from_secs(1));
    let (result, _) = engine.run_task(task());

    let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
    assert!(names.contains(&"A"));
    assert!(!names.contains(&"B"));
    assert!(names.contains(&"C"));
    assert!((result.score - 6.0).abs() < 1e-9);
}

/// S4 — a composite referencing a postfilter symbol is deferred to
/// composite-phase-2.
#[test]
fn s4_two_phase_composite_waits_for_postfilter() {
    let mut symbols = SymbolRegistry::new();
    symbols.register(SymbolSpec::new("F", SymbolType::Filter).with_weight(1.0), Some(fires(1.0))).unwrap();
    symbols.register(SymbolSpec::new("PF", SymbolType::Postfilter).with_weight(1.0), Some(fires(1.0))).unwrap();

    let mut composites = CompositeRegistry::new();
    composites.register("X", "F & PF", 3.0, Policy::Leave, None, 0).unwrap();

    let (engine, _) = Engine::build(symbols, composites, Config::default(), Duration::from_secs(1));
    let (result, _) = engine.run_task(task());

    assert!(result.symbols.iter().any(|s| s.name == "X" && s.score == 3.0));
    assert!(result.symbols.iter().any(|s| s.name == "F"));
    assert!(result.symbols.iter().any(|s| s.name == "PF"));
}

/// S5 — an async item that never resolves times out, and its hard dependent
/// is transitively skipped; neither lands in the result.
#[test]
fn s5_dependency_timeout_skips_dependent() {
    let mut symbols = SymbolRegistry::new();
    symbols
        .register(SymbolSpec::new("SLOW", SymbolType::Filter).with_timeout(Duration::from_millis(50)), Some(pending()))
        .unwrap();
    symbols
        .register(
            SymbolSpec::new("DEP", SymbolType::Filter).with_dependency(Dependency::hard("SLOW")),
            Some(fires(1.0)),
        )
        .unwrap();

    let (engine, warnings) = Engine::build(symbols, CompositeRegistry::new(), Config::default(), Duration::from_secs(5));
    assert!(warnings.is_empty());

    let (result, _errors) = engine.run_task(task());
    assert!(!result.symbols.iter().any(|s| s.name == "SLOW" || s.name == "DEP"));
}

/// S6 — a passthrough wins regardless of score, and previously recorded
/// symbols stay in the accumulator even though they no longer drive the
/// final action.
#[test]
fn s6_passthrough_overrides_action_but_keeps_records() {
    let mut acc = Accumulator::new();
    acc.action_map.set(Action::Reject, 15.0);
    acc.insert(sievecore::accumulator::InsertRequest {
        symbol: "LOW",
        multiplier: 1.0,
        options: Vec::new(),
        registered_weight: Some(1.0),
        group: None,
        one_shot: false,
        is_composite: false,
    })
    .unwrap();
    acc.add_passthrough(Passthrough {
        priority: 10,
        action: Action::Reject,
        message: Some("blocked".to_string()),
        module: None,
    });

    let result = acc.action();
    assert_eq!(result.action, Action::Reject);
    assert_eq!(result.message.as_deref(), Some("blocked"));
    assert!(acc.contains("LOW"));
}

/// S7 — grow-factor normalization above the reject threshold.
#[test]
fn s7_grow_factor_normalizes_score() {
    let mut acc = Accumulator::new();
    acc.action_map.set(Action::Reject, 15.0);
    acc.grow_factor = Some(1.1);
    acc.insert(sievecore::accumulator::InsertRequest {
        symbol: "A",
        multiplier: 1.0,
        options: Vec::new(),
        registered_weight: Some(25.0),
        group: None,
        one_shot: false,
        is_composite: false,
    })
    .unwrap();

    let result = acc.action();
    assert!((result.score - 26.0).abs() < 1e-9);
    assert_eq!(result.action, Action::Reject);
}
