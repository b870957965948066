//! The engine: owns the plant aggregate, host constants and the random source,
//! and drives the per-minute tick.

use crate::alerts::{active_alerts, ActiveAlert};
use crate::directives::{Directive, DirectiveSignals, DirectiveState, DirectiveStatus};
use crate::economy::{tick_cashflow, CashflowInputs, TickCashflow};
use crate::flow::{run_network, FlowInput};
use crate::log::LogEntry;
use crate::logistics::{LogisticsState, ShipmentOutcome, ShipmentStatus};
use crate::market::{carrying_cost_per_day, step_market, MarketInputs, MarketState};
use crate::metrics::{compute_metrics, Metrics};
use crate::recorder::{RecorderTick, RecordingSummary};
use crate::reliability::{
    apply_wear, downtime_share, plant_reliability, refresh_mode_and_alert, update_statuses,
    ReliabilityInputs,
};
use crate::rng::{RandomSource, SeededRandom};
use crate::scenario::scenario_catalog;
use crate::score::{evaluate, HistorySample, ScoreInputs, Scorecard};
use crate::storage::{demand_rates, PressureChange, StorageTick, MINUTES_PER_DAY, RACK_SHARE};
use crate::strain::{step_strain, strain_cost_per_day, strain_factor, strain_target, StrainInputs};
use crate::topology::{process_topology, ProcessTopology};
use crate::{
    Clock, Constants, LogLevel, Parameters, PerProduct, PlantState, Product, ScenarioDef,
    StreamFlows, Unit, UnitId,
};

/// Incident pressure kept per tick.
const INCIDENT_PRESSURE_DECAY: f64 = 0.995;
/// Incident pressure added per trip.
const INCIDENT_PRESSURE_STEP: f64 = 0.2;

/// A running refinery simulation.
///
/// All state lives in one [`PlantState`]; every random draw goes through `R`.
/// Read accessors return owned copies.
#[derive(Debug, Clone)]
pub struct Engine<R: RandomSource = SeededRandom> {
    pub(crate) state: PlantState,
    pub(crate) constants: Constants,
    pub(crate) rng: R,
}

impl Engine<SeededRandom> {
    pub fn new(seed: u64) -> Self {
        Self::with_constants(seed, Constants::default())
    }

    pub fn with_constants(seed: u64, constants: Constants) -> Self {
        Engine::with_random(constants, SeededRandom::new(seed))
    }
}

impl<R: RandomSource> Engine<R> {
    pub fn with_random(constants: Constants, rng: R) -> Self {
        let mut engine = Self {
            state: PlantState::default(),
            constants,
            rng,
        };
        prime(&mut engine.state, &engine.constants, &mut engine.rng);
        engine
    }

    /// Feed wall-clock seconds; runs as many whole ticks as the clock allows.
    /// Returns the number of ticks run.
    pub fn update(&mut self, delta_seconds: f64) -> u32 {
        let ticks = self.state.clock.plan(delta_seconds, &self.constants);
        for _ in 0..ticks {
            tick(&mut self.state, &self.constants, &mut self.rng);
        }
        ticks
    }

    /// Run `ticks` ticks directly, regardless of pause or speed.
    pub fn advance_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            tick(&mut self.state, &self.constants, &mut self.rng);
        }
    }

    /// Back to a fresh plant under the active scenario. The random stream
    /// continues where it was.
    pub fn reset(&mut self) {
        let scenario = self.state.scenario;
        self.state = PlantState::new(scenario);
        prime(&mut self.state, &self.constants, &mut self.rng);
        self.state.log(
            self.constants.log_capacity,
            LogLevel::Info,
            format!("Simulation reset under {}", scenario.def().name),
        );
    }

    // -- read surface -------------------------------------------------------

    pub fn state(&self) -> &PlantState {
        &self.state
    }

    pub fn constants(&self) -> &Constants {
        &self.constants
    }

    pub fn rng(&self) -> &R {
        &self.rng
    }

    pub fn clock(&self) -> Clock {
        self.state.clock.clone()
    }

    pub fn params(&self) -> Parameters {
        self.state.params
    }

    pub fn units(&self) -> Vec<Unit> {
        self.state.units.to_vec()
    }

    pub fn unit(&self, id: UnitId) -> Unit {
        self.state.units.get(id).clone()
    }

    pub fn flows(&self) -> StreamFlows {
        self.state.flows
    }

    pub fn metrics(&self) -> Metrics {
        compute_metrics(&self.state)
    }

    pub fn logistics(&self) -> LogisticsState {
        self.state.logistics.clone()
    }

    pub fn market(&self) -> MarketState {
        self.state.market.clone()
    }

    pub fn directives(&self) -> DirectiveState {
        self.state.directives.clone()
    }

    pub fn active_directives(&self) -> Vec<Directive> {
        self.state
            .directives
            .directives
            .iter()
            .filter(|d| d.status == DirectiveStatus::Active)
            .cloned()
            .collect()
    }

    pub fn active_alerts(&self) -> Vec<ActiveAlert> {
        active_alerts(&self.state)
    }

    pub fn scenario_list(&self) -> Vec<ScenarioDef> {
        scenario_catalog()
    }

    pub fn performance_history(&self) -> Vec<HistorySample> {
        self.state.history.samples()
    }

    pub fn process_topology(&self) -> ProcessTopology {
        process_topology(&self.state.boosts, &self.state.flows)
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state.log.entries()
    }

    pub fn scorecard(&self) -> Scorecard {
        self.state.scorecard.clone()
    }

    pub fn recording_summary(&self) -> RecordingSummary {
        self.state.recorder.summary()
    }
}

/// Populate what a fresh plant needs before its first tick: the shipment
/// horizon, the directive slots, unit modes and an opening scorecard.
pub(crate) fn prime(state: &mut PlantState, constants: &Constants, rng: &mut impl RandomSource) {
    let demand = demand_rates(&state.scenario_def());
    let minute = state.clock.minute;
    state
        .logistics
        .plan(&state.storage, &demand, constants, minute, rng);
    let signals = DirectiveSignals {
        reliability: plant_reliability(&state.units),
        carbon: state.environment.carbon,
        shipments: &[],
    };
    state.directives.replenish(&signals, rng);
    refresh_modes(state);
    state.scorecard = evaluate(&score_inputs(state), &state.history);
}

/// Advance the plant by one simulated minute.
///
/// Order of operations:
/// 1. Expire pipeline boosts.
/// 2. Count down downtime, recover units, apply overrides and the emergency flag.
/// 3. Run the flow network and write throughputs back to units.
/// 4. Wear online units and roll trips.
/// 5. Step operational strain.
/// 6. Fill tanks, draw rack demand, update storage pressure.
/// 7. Resolve due shipments, then top up the planning horizon.
/// 8. Update carbon.
/// 9. Step the market.
/// 10. Book the tick's cashflow.
/// 11. Judge and replenish directives.
/// 12. Score, sample history, feed the recorder.
/// 13. Refresh unit modes and alerts; increment the minute.
pub(crate) fn tick(state: &mut PlantState, constants: &Constants, rng: &mut impl RandomSource) {
    let def = state.scenario_def();
    let demand = demand_rates(&def);

    expire_boosts(state);
    update_units(state, constants, rng);
    run_flow(state, &def);
    let incidents = wear_units(state, constants, &def, rng);
    step_plant_strain(state, &def);
    let storage = update_storage(state, constants, &demand);
    let shipments = update_logistics(state, constants, &demand, rng);
    update_environment(state, constants, &def);
    update_market(state, &def, &demand, &storage);
    let cashflow = book_cashflow(state, &def, &storage, &shipments);
    update_directives(state, constants, &shipments, rng);
    update_score(state, constants, &cashflow, incidents, &shipments);
    refresh_modes(state);

    state.clock.minute += 1;
}

fn expire_boosts(state: &mut PlantState) {
    let minute = state.clock.minute;
    let expired: Vec<_> = state
        .boosts
        .iter()
        .filter(|(_, boost)| boost.expires_at <= minute)
        .map(|(stream, _)| *stream)
        .collect();
    for stream in expired {
        state.boosts.remove(&stream);
        tracing::debug!(minute, stream = stream.as_str(), "pipeline bypass expired");
    }
}

fn update_units(state: &mut PlantState, constants: &Constants, rng: &mut impl RandomSource) {
    let recoveries = update_statuses(
        &mut state.units,
        &state.overrides,
        state.emergency_shutdown,
        rng,
    );
    for recovery in recoveries {
        let name = recovery.unit.display_name();
        let message = if recovery.planned {
            format!(
                "{name} completed its turnaround at {:.0}% integrity",
                recovery.integrity * 100.0
            )
        } else {
            format!(
                "{name} is back online at {:.0}% integrity",
                recovery.integrity * 100.0
            )
        };
        state.log(constants.log_capacity, LogLevel::Info, message);
    }
}

fn run_flow(state: &mut PlantState, def: &ScenarioDef) {
    let outcome = run_network(&FlowInput {
        params: &state.params,
        scenario: def,
        storage_throttle: state.storage.pressure.throttle,
        units: &state.units,
        boosts: &state.boosts,
        strain: state.strain,
    });
    let loads: Vec<(f64, f64)> = UnitId::ALL
        .into_iter()
        .map(|id| (outcome.throughput(id), outcome.utilization(&state.units, id)))
        .collect();
    for (unit, (throughput, utilization)) in state.units.iter_mut().zip(loads) {
        unit.throughput = throughput;
        unit.utilization = utilization;
    }
    state.crude_target = outcome.crude_target;
    state.flows = outcome.flows;
    state.production = outcome.production;
}

/// Returns the number of trips this tick.
fn wear_units(
    state: &mut PlantState,
    constants: &Constants,
    def: &ScenarioDef,
    rng: &mut impl RandomSource,
) -> u32 {
    state.incident_pressure *= INCIDENT_PRESSURE_DECAY;
    let production = &state.production;
    let inputs = ReliabilityInputs {
        maintenance: (state.params.maintenance - def.maintenance_penalty).clamp(0.0, 1.0),
        safety: state.params.safety,
        environment: state.params.environment,
        risk_multiplier: def.risk_multiplier,
        strain_factor: strain_factor(state.strain),
        flare_level: if production.crude > 0.0 {
            production.flare / production.crude
        } else {
            0.0
        },
    };
    let incidents = apply_wear(&mut state.units, &inputs, rng);
    let mut count = 0;
    for incident in incidents {
        count += 1;
        state.total_incidents += 1;
        state.incident_pressure = (state.incident_pressure + INCIDENT_PRESSURE_STEP).min(1.0);
        state.log(constants.log_capacity, incident.level, incident.message());
    }
    count
}

fn step_plant_strain(state: &mut PlantState, def: &ScenarioDef) {
    let target = strain_target(
        &StrainInputs {
            load: state.production.crude / UnitId::Distillation.capacity(),
            maintenance_penalty: def.maintenance_penalty,
            market_stress: state.market.stress,
        },
        &state.params,
    );
    state.strain = step_strain(state.strain, target, &state.params);
}

fn update_storage(
    state: &mut PlantState,
    constants: &Constants,
    demand: &PerProduct<f64>,
) -> StorageTick {
    let report = state.storage.apply_tick(&state.production, demand);
    state.tank_activity.rack_sales = report.rack_sales;
    state.tank_activity.shortage = report.shortage;
    state.tank_activity.overflow = report.overflow;
    match state.storage.update_pressure() {
        Some(PressureChange::Engaged) => {
            let (product, _) = state.storage.fullest();
            let message = format!(
                "Storage pressure: {} tanks at {:.0}%, crude intake throttled to {:.0}%",
                product.label(),
                state.storage.tanks[product].ratio() * 100.0,
                state.storage.pressure.throttle * 100.0
            );
            state.log(constants.log_capacity, LogLevel::Warning, message);
        }
        Some(PressureChange::Relieved) => state.log(
            constants.log_capacity,
            LogLevel::Info,
            "Storage pressure relieved, crude intake back to 100%".to_string(),
        ),
        None => {}
    }
    report
}

fn update_logistics(
    state: &mut PlantState,
    constants: &Constants,
    demand: &PerProduct<f64>,
    rng: &mut impl RandomSource,
) -> Vec<ShipmentOutcome> {
    let futures = state.market.futures();
    let outcomes = state
        .logistics
        .advance(&mut state.storage, &futures, constants);
    let mut shipped = PerProduct::<f64>::default();
    for outcome in &outcomes {
        shipped[outcome.product] += outcome.delivered;
        let (level, message) = match outcome.status {
            ShipmentStatus::Completed => (
                LogLevel::Info,
                format!(
                    "Shipment {} delivered {:.1} kbbl of {}",
                    outcome.id,
                    outcome.delivered,
                    outcome.product.label()
                ),
            ),
            _ => (
                LogLevel::Warning,
                format!(
                    "Shipment {} missed: {:.1} of {:.1} kbbl {} loaded, penalty ${:.0}",
                    outcome.id,
                    outcome.delivered,
                    outcome.volume,
                    outcome.product.label(),
                    outcome.penalty
                ),
            ),
        };
        state.log(constants.log_capacity, level, message);
    }
    state.tank_activity.shipped = shipped;

    let minute = state.clock.minute;
    let created = state
        .logistics
        .plan(&state.storage, demand, constants, minute, rng);
    if !created.is_empty() {
        tracing::debug!(minute, count = created.len(), "shipments scheduled");
    }
    outcomes
}

fn update_environment(state: &mut PlantState, constants: &Constants, def: &ScenarioDef) {
    let crossed = state.environment.update(
        &state.production,
        state.params.environment,
        def.environment_pressure,
    );
    if crossed {
        let message = format!(
            "Carbon output {:.2} kt/day exceeds the {:.2} kt/day limit",
            state.environment.carbon, state.environment.limit
        );
        state.log(constants.log_capacity, LogLevel::Warning, message);
    }
}

fn rack_demand_per_tick(demand: &PerProduct<f64>) -> f64 {
    demand
        .iter()
        .map(|(_, d)| d.max(0.0) * RACK_SHARE / MINUTES_PER_DAY)
        .sum()
}

fn update_market(
    state: &mut PlantState,
    def: &ScenarioDef,
    demand: &PerProduct<f64>,
    storage: &StorageTick,
) {
    let rack = rack_demand_per_tick(demand);
    let shortage_ratio = if rack > 0.0 {
        storage.total_shortage() / rack
    } else {
        0.0
    };
    let inputs = MarketInputs {
        scenario: def,
        production: &state.production,
        demand,
        inventory_ratio: state.storage.tanks.map(|_, t| t.ratio()),
        product_focus: state.params.product_focus,
        reliability: plant_reliability(&state.units),
        downtime_share: downtime_share(&state.units),
        shipment_reliability: state.logistics.stats.reliability(),
        directive_reliability: state.directives.reliability(),
        strain_factor: strain_factor(state.strain),
        pressure_active: state.storage.pressure.active,
        pressure_throttle: state.storage.pressure.throttle,
        shortage_ratio,
        incident_pressure: state.incident_pressure,
    };
    step_market(&mut state.market, &inputs);
}

fn book_cashflow(
    state: &mut PlantState,
    def: &ScenarioDef,
    storage: &StorageTick,
    shipments: &[ShipmentOutcome],
) -> TickCashflow {
    let sold = PerProduct::from_fn(|p: Product| {
        storage.rack_sales[p] + state.tank_activity.shipped[p]
    });
    let futures = state.market.futures();
    let levels = state.storage.tanks.map(|_, t| (t.level, t.ratio()));
    let flow = tick_cashflow(&CashflowInputs {
        sold: &sold,
        shortage: &storage.shortage,
        futures: &futures,
        revenue_multiplier: state.market.revenue_multiplier(),
        crude_rate: state.production.crude,
        crude_cost: state.market.crude_cost,
        processed_rate: state.units.iter().map(|u| u.throughput).sum(),
        maintenance: state.params.maintenance,
        safety: state.params.safety,
        environment: state.params.environment,
        strain_cost_per_day: strain_cost_per_day(state.strain),
        carrying_cost_per_day: carrying_cost_per_day(&levels),
        carbon_fine_per_day: state.environment.fine_per_day(def.environment_pressure),
        shipment_penalty: shipments.iter().map(|s| s.penalty).sum(),
    });
    state.ledger.book(&flow);
    flow
}

fn update_directives(
    state: &mut PlantState,
    constants: &Constants,
    shipments: &[ShipmentOutcome],
    rng: &mut impl RandomSource,
) {
    let signals = DirectiveSignals {
        reliability: plant_reliability(&state.units),
        carbon: state.environment.carbon,
        shipments,
    };
    let resolved = state.directives.advance(&signals, constants);
    let created = state.directives.replenish(&signals, rng);
    for resolution in resolved {
        let (level, message) = match resolution.status {
            DirectiveStatus::Completed => (
                LogLevel::Info,
                format!("Directive complete: {}", resolution.title),
            ),
            _ => (
                LogLevel::Warning,
                format!("Directive failed: {}", resolution.title),
            ),
        };
        state.log(constants.log_capacity, level, message);
    }
    for title in created {
        state.log(
            constants.log_capacity,
            LogLevel::Info,
            format!("New directive: {title}"),
        );
    }
}

fn score_inputs(state: &PlantState) -> ScoreInputs {
    ScoreInputs {
        output: state.production.liquids() + state.production.lpg,
        profit_per_day: state.ledger.profit_per_day(),
        reliability: plant_reliability(&state.units),
        carbon: state.environment.carbon,
        carbon_limit: state.environment.limit,
        incident_pressure: state.incident_pressure,
        shipment_reliability: state.logistics.stats.reliability(),
        directive_reliability: state.directives.reliability(),
        strain_factor: strain_factor(state.strain),
        emergency: state.emergency_shutdown,
    }
}

fn update_score(
    state: &mut PlantState,
    constants: &Constants,
    cashflow: &TickCashflow,
    incidents: u32,
    shipments: &[ShipmentOutcome],
) {
    let inputs = score_inputs(state);
    state.scorecard = evaluate(&inputs, &state.history);

    let next_minute = state.clock.minute + 1;
    if constants.history_sample_minutes > 0 && next_minute % constants.history_sample_minutes == 0
    {
        state.history.push(
            constants.history_capacity,
            HistorySample {
                minute: next_minute,
                score: state.scorecard.score,
                profit_per_day: inputs.profit_per_day,
                reliability: inputs.reliability,
                carbon: inputs.carbon,
                output: inputs.output,
            },
        );
    }

    let count = |status| {
        let n = shipments.iter().filter(|s| s.status == status).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    };
    state.recorder.record(&RecorderTick {
        output_rate: inputs.output,
        profit: cashflow.profit(),
        penalty: cashflow.penalty,
        incidents,
        reliability: inputs.reliability,
        carbon_rate: inputs.carbon,
        completed: count(ShipmentStatus::Completed),
        missed: count(ShipmentStatus::Missed),
    });
}

pub(crate) fn refresh_modes(state: &mut PlantState) {
    let emergency = state.emergency_shutdown;
    for unit in state.units.iter_mut() {
        refresh_mode_and_alert(unit, emergency);
    }
}
