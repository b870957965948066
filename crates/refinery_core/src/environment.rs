//! Carbon intensity and the scenario-adjusted compliance limit.

use serde::{Deserialize, Serialize};

use crate::types::clamp_finite;
use crate::ProductionRates;

const CRUDE_CARBON: f64 = 0.045;
const FLARE_CARBON: f64 = 0.6;
const WASTE_CARBON: f64 = 0.05;
const CONTROL_EFFECT: f64 = 0.3;
pub const BASE_CARBON_LIMIT: f64 = 7.2;
/// Non-compliance fine, dollars per day per kt over the limit.
const FINE_PER_KT_DAY: f64 = 25_000.0;

/// kt CO2e per day.
pub fn carbon_rate(production: &ProductionRates, environment_spend: f64) -> f64 {
    let gross = production.crude.max(0.0) * CRUDE_CARBON
        + production.flare.max(0.0) * FLARE_CARBON
        + production.waste.max(0.0) * WASTE_CARBON;
    gross * (1.0 - clamp_finite(environment_spend, 0.0, 1.0) * CONTROL_EFFECT)
}

pub fn carbon_limit(environment_pressure: f64) -> f64 {
    BASE_CARBON_LIMIT * (1.0 - clamp_finite(environment_pressure, 0.0, 1.0) * 0.25)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub carbon: f64,
    pub limit: f64,
    pub over_limit: bool,
    /// Cumulative kt emitted since reset.
    pub total_emitted: f64,
}

impl EnvironmentState {
    /// Record this tick's carbon; returns true when the plant just crossed the limit.
    pub fn update(
        &mut self,
        production: &ProductionRates,
        environment_spend: f64,
        environment_pressure: f64,
    ) -> bool {
        self.carbon = carbon_rate(production, environment_spend);
        self.limit = carbon_limit(environment_pressure);
        self.total_emitted += self.carbon / 1440.0;
        let was_over = self.over_limit;
        self.over_limit = self.carbon > self.limit;
        self.over_limit && !was_over
    }

    /// Fine for the current excess, dollars per day.
    pub fn fine_per_day(&self, environment_pressure: f64) -> f64 {
        (self.carbon - self.limit).max(0.0) * FINE_PER_KT_DAY * (1.0 + environment_pressure.max(0.0))
    }
}
