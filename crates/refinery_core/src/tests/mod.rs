use super::*;
use crate::test_fixtures::{quiet_engine, quiet_engine_with, run_hours, unlucky_engine, ScriptedRandom};

mod commands;
mod directives;
mod emergency;

// --- Shared test helpers ------------------------------------------------

/// Set one tank to `ratio` of its capacity.
fn fill_tank(engine: &mut Engine<ScriptedRandom>, product: Product, ratio: f64) {
    let tank = &mut engine.state.storage.tanks[product];
    tank.level = tank.capacity * ratio;
}

fn last_message(engine: &Engine<ScriptedRandom>) -> String {
    engine
        .state
        .log
        .last()
        .map(|entry| entry.message.clone())
        .unwrap_or_default()
}

fn assert_bounded(engine: &Engine<ScriptedRandom>) {
    let state = engine.state();
    for (product, tank) in state.storage.tanks.iter() {
        assert!(
            tank.level >= 0.0 && tank.level <= tank.capacity + 1e-9,
            "{product} level {} outside [0, {}]",
            tank.level,
            tank.capacity
        );
    }
    for unit in state.units.iter() {
        assert!((0.0..=1.0).contains(&unit.integrity), "{} integrity", unit.id);
        assert!(
            (0.0..=flow::MAX_UTILIZATION).contains(&unit.utilization),
            "{} utilization {}",
            unit.id,
            unit.utilization
        );
    }
}
