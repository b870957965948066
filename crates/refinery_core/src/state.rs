//! The single owned aggregate every tick function reads and writes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::directives::DirectiveState;
use crate::economy::Ledger;
use crate::environment::EnvironmentState;
use crate::log::EventLog;
use crate::logistics::LogisticsState;
use crate::market::MarketState;
use crate::recorder::Recorder;
use crate::score::{PerformanceHistory, Scorecard};
use crate::storage::StorageState;
use crate::{
    Clock, LogLevel, Parameters, PerProduct, PipelineBoost, ProductionRates, ScenarioDef,
    ScenarioId, Stream, StreamFlows, UnitId, UnitOverride, UnitRegistry,
};

/// Volumes moved through the tank farm last tick, kbbl.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TankActivity {
    pub rack_sales: PerProduct<f64>,
    pub shipped: PerProduct<f64>,
    pub shortage: PerProduct<f64>,
    pub overflow: PerProduct<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlantState {
    pub clock: Clock,
    pub params: Parameters,
    pub scenario: ScenarioId,
    pub units: UnitRegistry,
    pub overrides: BTreeMap<UnitId, UnitOverride>,
    pub boosts: BTreeMap<Stream, PipelineBoost>,
    pub emergency_shutdown: bool,
    /// Crude the plant asked for last tick, before distillation limits.
    pub crude_target: f64,
    pub flows: StreamFlows,
    pub production: ProductionRates,
    pub strain: f64,
    /// Decaying measure of recent trips, `[0, 1]`.
    pub incident_pressure: f64,
    pub total_incidents: u32,
    pub storage: StorageState,
    pub tank_activity: TankActivity,
    pub logistics: LogisticsState,
    pub market: MarketState,
    pub environment: EnvironmentState,
    pub ledger: Ledger,
    pub directives: DirectiveState,
    pub scorecard: Scorecard,
    pub history: PerformanceHistory,
    pub recorder: Recorder,
    pub log: EventLog,
}

impl PlantState {
    pub fn new(scenario: ScenarioId) -> Self {
        let def = scenario.def();
        Self {
            clock: Clock::default(),
            params: Parameters::default(),
            scenario,
            units: UnitRegistry::new(),
            overrides: BTreeMap::new(),
            boosts: BTreeMap::new(),
            emergency_shutdown: false,
            crude_target: 0.0,
            flows: StreamFlows::default(),
            production: ProductionRates::default(),
            strain: 0.0,
            incident_pressure: 0.0,
            total_incidents: 0,
            storage: StorageState::default(),
            tank_activity: TankActivity::default(),
            logistics: LogisticsState::default(),
            market: MarketState::new(&def),
            environment: EnvironmentState {
                limit: crate::environment::carbon_limit(def.environment_pressure),
                ..EnvironmentState::default()
            },
            ledger: Ledger::default(),
            directives: DirectiveState::default(),
            scorecard: Scorecard::default(),
            history: PerformanceHistory::default(),
            recorder: Recorder::default(),
            log: EventLog::default(),
        }
    }

    pub fn scenario_def(&self) -> ScenarioDef {
        self.scenario.def()
    }

    pub(crate) fn log(&mut self, capacity: usize, level: LogLevel, message: String) {
        self.log.push(capacity, self.clock.minute, level, message);
    }
}

impl Default for PlantState {
    fn default() -> Self {
        Self::new(ScenarioId::Baseline)
    }
}
