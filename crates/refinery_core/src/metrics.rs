//! Flat metrics projection computed from `PlantState`.
//!
//! `compute_metrics(&PlantState) -> Metrics` is pure and derived entirely from
//! authoritative state, so it is never stored or trusted from a snapshot.
//! The struct is flat so hosts can write it straight to CSV.

use serde::Serialize;

use crate::reliability::plant_reliability;
use crate::storage::RACK_SHARE;
use crate::strain::strain_factor;
use crate::{PlantState, UnitId, UnitStatus};

/// Bump when fields are added, removed or reordered.
pub const METRICS_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub minute: u64,
    pub metrics_version: u32,
    pub day: u64,
    pub hour: u64,
    pub running: bool,
    pub speed: f64,
    pub scenario: String,

    // Flow
    pub crude_target: f64,
    pub crude_throughput: f64,
    pub gasoline: f64,
    pub diesel: f64,
    pub jet: f64,
    pub lpg: f64,
    pub waste: f64,
    pub hydrogen: f64,
    pub flare: f64,
    pub sulfur: f64,
    pub distillation_utilization: f64,

    // Reliability
    pub reliability: f64,
    pub strain: f64,
    pub strain_factor: f64,
    pub incidents_total: u32,
    pub incident_pressure: f64,
    pub units_offline: u32,
    pub units_standby: u32,
    pub emergency_shutdown: bool,

    // Storage
    pub storage_gasoline: f64,
    pub storage_diesel: f64,
    pub storage_jet: f64,
    pub storage_lpg: f64,
    pub storage_max_ratio: f64,
    pub storage_pressure_active: bool,
    pub storage_throttle: f64,
    pub storage_upgrades: u32,
    pub demand_shortage: f64,

    // Logistics
    pub shipments_pending: u32,
    pub shipments_completed: u32,
    pub shipments_missed: u32,
    pub shipment_reliability: f64,

    // Market
    pub price_gasoline: f64,
    pub price_diesel: f64,
    pub price_jet: f64,
    pub price_lpg: f64,
    pub crude_cost: f64,
    pub market_stress: f64,
    pub revenue_multiplier: f64,

    // Economy
    pub revenue_per_day: f64,
    pub cost_per_day: f64,
    pub penalty_per_day: f64,
    pub profit_per_day: f64,
    pub cumulative_profit: f64,
    pub cumulative_penalty: f64,

    // Environment
    pub carbon: f64,
    pub carbon_limit: f64,
    pub carbon_over_limit: bool,

    // Directives & score
    pub directives_active: u32,
    pub directives_completed: u32,
    pub directives_failed: u32,
    pub directive_reliability: f64,
    pub score: f64,
    pub grade: String,
    pub trend: f64,
    pub recording: bool,
}

#[allow(clippy::cast_possible_truncation)]
fn count(n: usize) -> u32 {
    n.min(u32::MAX as usize) as u32
}

pub fn compute_metrics(state: &PlantState) -> Metrics {
    let production = &state.production;
    let storage = &state.storage;
    let tanks = &storage.tanks;
    let futures = state.market.futures();
    let rack_demand: f64 = crate::storage::demand_rates(&state.scenario_def())
        .iter()
        .map(|(_, d)| d * RACK_SHARE / 1440.0)
        .sum();
    let shortage: f64 = state.tank_activity.shortage.iter().map(|(_, v)| *v).sum();
    let directives = &state.directives;

    Metrics {
        minute: state.clock.minute,
        metrics_version: METRICS_VERSION,
        day: state.clock.day(),
        hour: state.clock.hour_of_day(),
        running: state.clock.running,
        speed: state.clock.speed,
        scenario: state.scenario.as_str().to_string(),

        crude_target: state.crude_target,
        crude_throughput: production.crude,
        gasoline: production.gasoline,
        diesel: production.diesel,
        jet: production.jet,
        lpg: production.lpg,
        waste: production.waste,
        hydrogen: production.hydrogen,
        flare: production.flare,
        sulfur: production.sulfur,
        distillation_utilization: state.units.get(UnitId::Distillation).utilization,

        reliability: plant_reliability(&state.units),
        strain: state.strain,
        strain_factor: strain_factor(state.strain),
        incidents_total: state.total_incidents,
        incident_pressure: state.incident_pressure,
        units_offline: count(
            state
                .units
                .iter()
                .filter(|u| u.status == UnitStatus::Offline)
                .count(),
        ),
        units_standby: count(
            state
                .units
                .iter()
                .filter(|u| u.status == UnitStatus::Standby)
                .count(),
        ),
        emergency_shutdown: state.emergency_shutdown,

        storage_gasoline: tanks.gasoline.ratio(),
        storage_diesel: tanks.diesel.ratio(),
        storage_jet: tanks.jet.ratio(),
        storage_lpg: tanks.lpg.ratio(),
        storage_max_ratio: storage.max_ratio(),
        storage_pressure_active: storage.pressure.active,
        storage_throttle: storage.pressure.throttle,
        storage_upgrades: storage.upgrades,
        demand_shortage: if rack_demand > 0.0 {
            (shortage / rack_demand).clamp(0.0, 1.0)
        } else {
            0.0
        },

        shipments_pending: count(state.logistics.pending_count()),
        shipments_completed: state.logistics.stats.completed,
        shipments_missed: state.logistics.stats.missed,
        shipment_reliability: state.logistics.stats.reliability(),

        price_gasoline: futures.gasoline,
        price_diesel: futures.diesel,
        price_jet: futures.jet,
        price_lpg: futures.lpg,
        crude_cost: state.market.crude_cost,
        market_stress: state.market.stress,
        revenue_multiplier: state.market.revenue_multiplier(),

        revenue_per_day: state.ledger.revenue_per_day,
        cost_per_day: state.ledger.cost_per_day,
        penalty_per_day: state.ledger.penalty_per_day,
        profit_per_day: state.ledger.profit_per_day(),
        cumulative_profit: state.ledger.cumulative_profit(),
        cumulative_penalty: state.ledger.cumulative_penalty,

        carbon: state.environment.carbon,
        carbon_limit: state.environment.limit,
        carbon_over_limit: state.environment.over_limit,

        directives_active: count(
            directives
                .directives
                .iter()
                .filter(|d| d.status == crate::DirectiveStatus::Active)
                .count(),
        ),
        directives_completed: directives.stats.completed,
        directives_failed: directives.stats.failed,
        directive_reliability: directives.reliability(),
        score: state.scorecard.score,
        grade: state.scorecard.grade.as_str().to_string(),
        trend: state.scorecard.trend,
        recording: state.recorder.active,
    }
}
