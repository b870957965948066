use super::*;

#[test]
fn test_set_param_clamps_and_ignores_nan() {
    let mut engine = quiet_engine();
    engine.set_param(Param::CrudeIntake, 500.0);
    assert!((engine.params().crude_intake - 220.0).abs() < f64::EPSILON);
    engine.set_param(Param::Safety, f64::NAN);
    assert!((engine.params().safety - Parameters::default().safety).abs() < f64::EPSILON);
}

#[test]
fn test_unknown_param_is_rejected_and_logged() {
    let mut engine = quiet_engine();
    let result = engine.set_param_by_name("octane", 0.4);
    assert_eq!(result, Err(ActionError::UnknownParam("octane".to_string())));
    assert!(last_message(&engine).starts_with("Action skipped"));
}

#[test]
fn test_apply_scenario_updates_carbon_limit() {
    let mut engine = quiet_engine();
    let before = engine.state().environment.limit;
    engine.apply_scenario(ScenarioId::RegulatoryCrackdown);
    assert_eq!(engine.state().scenario, ScenarioId::RegulatoryCrackdown);
    assert!(engine.state().environment.limit < before);
    assert!(engine.apply_scenario_by_key("monsoon").is_err());
}

#[test]
fn test_throttle_override_applies_without_a_tick() {
    let mut engine = quiet_engine();
    engine.set_unit_throttle(UnitId::Fcc, 0.5, OverrideOptions::default());
    assert_eq!(engine.unit(UnitId::Fcc).override_throttle, Some(0.5));
    assert!(last_message(&engine).contains("throttle set to 50%"));

    engine.set_unit_throttle(UnitId::Fcc, 3.0, OverrideOptions { quiet: true });
    assert_eq!(
        engine.unit(UnitId::Fcc).override_throttle,
        Some(flow::MAX_THROTTLE)
    );
}

#[test]
fn test_offline_override_holds_across_ticks_until_cleared() {
    let mut engine = quiet_engine();
    engine.set_unit_offline(UnitId::Reformer, true, OverrideOptions::default());
    assert_eq!(engine.unit(UnitId::Reformer).status, UnitStatus::Standby);

    engine.advance_ticks(10);
    let reformer = engine.unit(UnitId::Reformer);
    assert_eq!(reformer.status, UnitStatus::Standby);
    assert!(reformer.throughput.abs() < f64::EPSILON);

    engine.clear_unit_override(UnitId::Reformer);
    assert!(engine.state().overrides.is_empty());
    engine.advance_ticks(1);
    assert!(engine.unit(UnitId::Reformer).throughput > 0.0);
}

#[test]
fn test_convoy_rushes_fullest_product_then_cools_down() {
    let mut engine = quiet_engine();
    fill_tank(&mut engine, Product::Diesel, 0.97);
    engine.advance_ticks(1);
    assert!(engine.state().storage.pressure.active);
    let throttle = engine.state().storage.pressure.throttle;

    let id = engine.dispatch_logistics_convoy().unwrap();
    let shipment = engine
        .logistics()
        .shipments
        .into_iter()
        .find(|s| s.id == id)
        .unwrap();
    assert_eq!(shipment.product, Product::Diesel);
    assert!(shipment.rush);
    assert!((shipment.due_in - 1.0).abs() < f64::EPSILON);
    assert!(engine.state().storage.pressure.throttle > throttle);
    assert!((engine.state().ledger.action_spend - 65_000.0).abs() < 1e-6);

    let again = engine.dispatch_logistics_convoy();
    assert!(matches!(again, Err(ActionError::Cooldown { .. })));
    assert!(last_message(&engine).contains("on cooldown"));
}

#[test]
fn test_convoy_needs_inventory() {
    let mut engine = quiet_engine();
    for product in Product::ALL {
        fill_tank(&mut engine, product, 0.0);
    }
    assert_eq!(
        engine.dispatch_logistics_convoy(),
        Err(ActionError::NoEligibleProduct { required: 8.0 })
    );
    assert!(engine.logistics().cooldowns.convoy.abs() < f64::EPSILON);
}

#[test]
fn test_delay_pushes_earliest_shipment_and_consumes_window() {
    let mut engine = quiet_engine();
    let earliest = engine
        .logistics()
        .pending()
        .min_by(|a, b| a.due_in.total_cmp(&b.due_in))
        .cloned()
        .unwrap();

    let id = engine
        .delay_next_shipment(DelayOptions { hours: Some(3.0) })
        .unwrap();
    assert_eq!(id, earliest.id);
    let delayed = engine
        .logistics()
        .shipments
        .into_iter()
        .find(|s| s.id == id)
        .unwrap();
    assert!((delayed.due_in - (earliest.due_in + 3.0)).abs() < 1e-9);
    assert!((delayed.window - (earliest.window - 3.0).max(0.0)).abs() < 1e-9);
}

#[test]
fn test_delay_without_pending_shipments_is_rejected() {
    let mut engine = quiet_engine();
    engine.state.logistics.shipments.clear();
    assert_eq!(
        engine.delay_next_shipment(DelayOptions::default()),
        Err(ActionError::NoPendingShipment)
    );
    assert_eq!(last_message(&engine), "Action skipped: no pending shipment");
    assert!(engine.state().ledger.action_spend.abs() < f64::EPSILON);
}

#[test]
fn test_turnaround_refused_on_standby_override() {
    let mut engine = quiet_engine();
    engine.set_unit_offline(UnitId::Reformer, true, OverrideOptions::default());
    assert_eq!(
        engine.schedule_turnaround(UnitId::Reformer),
        Err(ActionError::UnitUnavailable(UnitId::Reformer))
    );
    let reformer = engine.unit(UnitId::Reformer);
    assert_eq!(reformer.status, UnitStatus::Standby);
    assert!(!reformer.turnaround);
    assert!(last_message(&engine).ends_with("is not online"));
}

#[test]
fn test_extra_shipment_is_charged_and_scheduled() {
    let mut engine = quiet_engine();
    let before = engine.logistics().pending_count();
    engine.request_extra_shipment().unwrap();
    assert_eq!(engine.logistics().pending_count(), before + 1);
    assert!(engine.request_extra_shipment().is_err());
}

#[test]
fn test_storage_expansion_is_capped() {
    let mut engine = quiet_engine();
    let capacity = engine.state().storage.tanks.gasoline.capacity;
    assert_eq!(engine.expand_storage_capacity(), Ok(1));
    assert!(engine.state().storage.tanks.gasoline.capacity > capacity);
    assert!(matches!(
        engine.expand_storage_capacity(),
        Err(ActionError::Cooldown { .. })
    ));

    engine.state.storage.upgrades = storage::MAX_UPGRADES;
    assert_eq!(
        engine.expand_storage_capacity(),
        Err(ActionError::UpgradeLimit(storage::MAX_UPGRADES))
    );
}

#[test]
fn test_bypass_boosts_feed_stream_until_expiry() {
    let mut engine = quiet_engine();
    assert_eq!(engine.deploy_pipeline_bypass(UnitId::Fcc), Ok(Stream::HeavyFcc));
    assert_eq!(
        engine.deploy_pipeline_bypass(UnitId::Fcc),
        Err(ActionError::BoostActive(Stream::HeavyFcc))
    );
    assert_eq!(
        engine.deploy_pipeline_bypass(UnitId::Distillation),
        Err(ActionError::NoFeedStream(UnitId::Distillation))
    );

    run_hours(&mut engine, 6);
    assert!(engine.state().boosts.contains_key(&Stream::HeavyFcc));
    engine.advance_ticks(1);
    assert!(engine.state().boosts.is_empty());
}

#[test]
fn test_turnaround_restores_integrity() {
    let mut engine = quiet_engine();
    engine.state.units.get_mut(UnitId::Hydrocracker).integrity = 0.4;
    engine.schedule_turnaround(UnitId::Hydrocracker).unwrap();
    assert_eq!(
        engine.schedule_turnaround(UnitId::Hydrocracker),
        Err(ActionError::UnitUnavailable(UnitId::Hydrocracker))
    );
    assert_eq!(engine.unit(UnitId::Hydrocracker).mode, UnitMode::Turnaround);

    run_hours(&mut engine, 3);
    let unit = engine.unit(UnitId::Hydrocracker);
    assert_eq!(unit.status, UnitStatus::Online);
    assert!(unit.integrity > 0.9);
    assert!(engine
        .logs()
        .iter()
        .any(|e| e.message.contains("completed its turnaround")));
}

#[test]
fn test_inspection_adds_integrity_once_per_cooldown() {
    let mut engine = quiet_engine();
    engine.state.units.get_mut(UnitId::Sulfur).integrity = 0.5;
    let after = engine.perform_inspection(UnitId::Sulfur).unwrap();
    assert!((after - 0.56).abs() < 1e-9);
    assert!(last_message(&engine).starts_with("Inspection of"));
    assert!(engine.perform_inspection(UnitId::Sulfur).is_err());
}

#[test]
fn test_recording_summarizes_the_window() {
    let mut engine = quiet_engine();
    assert!(engine.toggle_performance_recording().is_none());
    run_hours(&mut engine, 2);
    let summary = engine.toggle_performance_recording().unwrap();
    assert!((summary.hours - 2.0).abs() < 1e-9);
    assert!(summary.production > 0.0);
    assert!(!engine.state().recorder.active);
}

#[test]
fn test_scripted_commands_deserialize() {
    let script = r#"[
        {"at_minute": 0, "command": {"type": "set_param", "param": "crude_intake", "value": 150.0}},
        {"at_minute": 30, "command": {"type": "delay_next_shipment"}},
        {"at_minute": 60, "command": {"type": "deploy_pipeline_bypass", "unit": "reformer"}}
    ]"#;
    let envelopes: Vec<CommandEnvelope> = serde_json::from_str(script).unwrap();
    assert_eq!(envelopes.len(), 3);
    assert_eq!(
        envelopes[1].command,
        Command::DelayNextShipment { hours: None }
    );

    let mut engine = quiet_engine();
    engine.execute(&envelopes[0].command).unwrap();
    assert!((engine.params().crude_intake - 150.0).abs() < f64::EPSILON);
}
