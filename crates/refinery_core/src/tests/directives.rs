use super::*;

fn active_of(engine: &Engine<ScriptedRandom>, kind: DirectiveKind) -> Option<Directive> {
    engine.active_directives().into_iter().find(|d| d.kind == kind)
}

#[test]
fn test_fresh_plant_fills_every_slot_with_distinct_kinds() {
    let engine = quiet_engine();
    let active = engine.active_directives();
    assert_eq!(active.len(), crate::directives::DIRECTIVE_SLOTS);
    for kind in DirectiveKind::ALL {
        assert!(active.iter().any(|d| d.kind == kind), "missing {kind:?}");
    }
}

#[test]
fn test_losing_units_fails_the_reliability_directive() {
    let mut engine = quiet_engine();
    let directive = active_of(&engine, DirectiveKind::Reliability).unwrap();

    for unit in [UnitId::Reformer, UnitId::Fcc, UnitId::Hydrocracker] {
        engine.schedule_turnaround(unit).unwrap();
    }
    engine.advance_ticks(1);

    let stored = engine
        .directives()
        .directives
        .into_iter()
        .find(|d| d.id == directive.id)
        .unwrap();
    assert_eq!(stored.status, DirectiveStatus::Failed);
    assert!(engine.directives().stats.failed >= 1);
    assert!(engine
        .logs()
        .iter()
        .any(|e| e.message == "Directive failed: Hold reliability"));
    assert!(engine.metrics().directive_reliability < 1.0);
}

#[test]
fn test_resolved_slot_is_refilled_after_cooldown() {
    let mut engine = quiet_engine();
    let directive = active_of(&engine, DirectiveKind::Reliability).unwrap();
    engine
        .state
        .directives
        .directives
        .iter_mut()
        .find(|d| d.id == directive.id)
        .unwrap()
        .time_remaining = 1.0;

    engine.advance_ticks(1);
    assert_eq!(engine.directives().stats.completed, 1);
    assert_eq!(engine.active_directives().len(), crate::directives::DIRECTIVE_SLOTS - 1);

    run_hours(&mut engine, 1);
    assert_eq!(engine.active_directives().len(), crate::directives::DIRECTIVE_SLOTS);
    assert!(engine
        .logs()
        .iter()
        .any(|e| e.message.starts_with("New directive:")));
}

#[test]
fn test_completed_shipments_count_toward_delivery() {
    let mut engine = quiet_engine();
    let directive = active_of(&engine, DirectiveKind::Delivery).unwrap();
    let product = directive.product.unwrap();
    fill_tank(&mut engine, product, 0.9);
    engine
        .state
        .logistics
        .create(product, directive.target, 4.0, 0.0, 0, false);

    engine.advance_ticks(1);
    assert_eq!(engine.directives().stats.completed, 1);
    assert!(engine
        .logs()
        .iter()
        .any(|e| e.message == format!("Directive complete: {}", directive.title)));
}
