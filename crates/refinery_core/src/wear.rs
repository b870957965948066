//! Wear math: integrity decay and the conversion penalty of a worn unit.
//! Pure functions, no mutation.

/// Below this integrity a unit converts feed less efficiently.
pub const DEGRADED_INTEGRITY: f64 = 0.5;
/// Below this integrity a unit becomes eligible to trip.
pub const CRITICAL_INTEGRITY: f64 = 0.35;
const DEGRADED_EFFICIENCY: f64 = 0.92;
const CRITICAL_EFFICIENCY: f64 = 0.80;

const BASE_WEAR: f64 = 0.000_04;
const LOAD_WEAR: f64 = 0.000_08;
const OVERLOAD_WEAR: f64 = 0.000_9;

/// Fraction of feed a unit converts at the given integrity. The rest spills.
pub fn integrity_efficiency(integrity: f64) -> f64 {
    if integrity < CRITICAL_INTEGRITY {
        CRITICAL_EFFICIENCY
    } else if integrity < DEGRADED_INTEGRITY {
        DEGRADED_EFFICIENCY
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WearInputs {
    pub utilization: f64,
    pub maintenance: f64,
    pub environment: f64,
    pub risk_multiplier: f64,
    pub strain_factor: f64,
}

/// Integrity lost by one online unit in one tick.
///
/// `(baseWear + stressWear) × maintenanceFactor × scenarioRisk × strainWear × envRelief`,
/// where stress wear only applies above 100% utilization.
pub fn wear_per_tick(inputs: &WearInputs) -> f64 {
    let base = BASE_WEAR + inputs.utilization.clamp(0.0, 1.0) * LOAD_WEAR;
    let stress = if inputs.utilization > 1.0 {
        (inputs.utilization - 1.0) * OVERLOAD_WEAR
    } else {
        0.0
    };
    let maintenance_factor = 1.35 - inputs.maintenance.clamp(0.0, 1.0) * 0.85;
    let strain_wear = 1.0 + inputs.strain_factor.clamp(0.0, 1.0) * 0.8;
    let env_relief = 1.0 - inputs.environment.clamp(0.0, 1.0) * 0.12;
    (base + stress) * maintenance_factor * inputs.risk_multiplier.max(0.0) * strain_wear * env_relief
}
