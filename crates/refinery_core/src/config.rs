//! Host-tunable engine constants.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    /// Simulated minutes per real second at speed 1.0.
    pub base_minutes_per_second: f64,
    /// Upper bound on ticks drained by one `update` call.
    pub max_ticks_per_update: u32,
    /// Rolling window the shipment planner keeps populated.
    pub shipment_horizon_hours: f64,
    pub max_pending_shipments: usize,
    /// Minutes a resolved shipment stays visible.
    pub shipment_cooldown_minutes: f64,
    /// Hours since the last shipment of a product that forces a new one.
    pub shipment_staleness_hours: f64,
    pub log_capacity: usize,
    pub history_capacity: usize,
    pub history_sample_minutes: u64,
    /// Minutes a resolved directive lingers before replacement.
    pub directive_cooldown_minutes: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            base_minutes_per_second: 6.0,
            max_ticks_per_update: 1440,
            shipment_horizon_hours: 48.0,
            max_pending_shipments: 16,
            shipment_cooldown_minutes: 90.0,
            shipment_staleness_hours: 10.0,
            log_capacity: 120,
            history_capacity: 240,
            history_sample_minutes: 60,
            directive_cooldown_minutes: 30.0,
        }
    }
}
