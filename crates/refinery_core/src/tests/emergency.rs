use super::*;

#[test]
fn test_shutdown_zeroes_every_unit_immediately() {
    let mut engine = quiet_engine();
    engine.advance_ticks(5);
    assert!(engine.units().iter().any(|u| u.throughput > 0.0));

    engine.trigger_emergency_shutdown();
    for unit in engine.units() {
        assert!(unit.throughput.abs() < f64::EPSILON, "{} still flowing", unit.id);
        assert_eq!(unit.mode, UnitMode::Emergency);
    }

    engine.advance_ticks(1);
    for unit in engine.units() {
        assert!(unit.throughput.abs() < f64::EPSILON, "{} restarted", unit.id);
        assert_eq!(unit.status, UnitStatus::Standby);
    }
    assert!(engine.state().production.crude.abs() < f64::EPSILON);
    assert!(engine.active_alerts().iter().any(|a| matches!(
        &a.source,
        AlertSource::Plant { rule } if rule == "EMERGENCY_SHUTDOWN"
    )));
}

#[test]
fn test_release_resumes_within_one_tick() {
    let mut engine = quiet_engine();
    engine.trigger_emergency_shutdown();
    engine.advance_ticks(3);
    engine.release_emergency_shutdown();
    engine.advance_ticks(1);
    for unit in engine.units() {
        assert_eq!(unit.status, UnitStatus::Online, "{}", unit.id);
    }
    assert!(engine.unit(UnitId::Distillation).throughput > 0.0);
    assert!(engine.unit(UnitId::Fcc).throughput > 0.0);
}

#[test]
fn test_turnaround_refused_while_shut_down() {
    let mut engine = quiet_engine();
    engine.trigger_emergency_shutdown();
    engine.advance_ticks(1);
    let spend = engine.state().ledger.action_spend;

    assert_eq!(
        engine.schedule_turnaround(UnitId::Fcc),
        Err(ActionError::UnitUnavailable(UnitId::Fcc))
    );
    let fcc = engine.unit(UnitId::Fcc);
    assert_eq!(fcc.status, UnitStatus::Standby);
    assert!(!fcc.turnaround);
    assert!((engine.state().ledger.action_spend - spend).abs() < f64::EPSILON);
    assert_eq!(
        last_message(&engine),
        "Action skipped: Fluid Catalytic Cracker is not online"
    );

    engine.release_emergency_shutdown();
    engine.advance_ticks(1);
    assert_eq!(engine.unit(UnitId::Fcc).status, UnitStatus::Online);
}

#[test]
fn test_release_keeps_units_in_downtime_offline() {
    let mut engine = quiet_engine();
    engine.schedule_turnaround(UnitId::Reformer).unwrap();
    engine.trigger_emergency_shutdown();
    assert_eq!(engine.unit(UnitId::Reformer).mode, UnitMode::Turnaround);
    engine.release_emergency_shutdown();
    engine.advance_ticks(1);
    assert_eq!(engine.unit(UnitId::Reformer).status, UnitStatus::Offline);
    assert!(engine.unit(UnitId::Distillation).throughput > 0.0);
}

#[test]
fn test_repeat_trigger_is_a_no_op() {
    let mut engine = quiet_engine();
    engine.trigger_emergency_shutdown();
    let entries = engine.logs().len();
    engine.trigger_emergency_shutdown();
    assert_eq!(engine.logs().len(), entries);
    engine.release_emergency_shutdown();
    engine.release_emergency_shutdown();
    assert_eq!(engine.logs().len(), entries + 1);
}

#[test]
fn test_critical_unit_trips_when_rolls_go_against_it() {
    let mut engine = unlucky_engine();
    engine.state.units.get_mut(UnitId::Fcc).integrity = 0.2;
    engine.advance_ticks(1);

    let fcc = engine.unit(UnitId::Fcc);
    assert_eq!(fcc.status, UnitStatus::Offline);
    assert_eq!(fcc.mode, UnitMode::Tripped);
    assert_eq!(fcc.incidents, 1);
    assert!(fcc.downtime > 0.0);
    assert_eq!(engine.state().total_incidents, 1);
    assert!(engine.state().incident_pressure > 0.0);
    assert!(engine
        .active_alerts()
        .iter()
        .any(|a| a.source == AlertSource::Unit { unit: UnitId::Fcc }));
}
