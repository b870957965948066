//! Operational strain: a smoothed 0–12 measure of how hard the plant is run.

use crate::types::clamp_finite;
use crate::Parameters;

pub const STRAIN_MAX: f64 = 12.0;
const STRAIN_COST_PER_DAY: f64 = 220_000.0;

#[derive(Debug, Clone, Copy)]
pub struct StrainInputs {
    /// Crude throughput over distillation nameplate.
    pub load: f64,
    pub maintenance_penalty: f64,
    pub market_stress: f64,
}

fn mitigation(params: &Parameters) -> f64 {
    params.maintenance * 0.35 + params.safety * 0.3 + params.environment * 0.15
}

/// Level strain eases toward this tick.
pub fn strain_target(inputs: &StrainInputs, params: &Parameters) -> f64 {
    let pressure = 1.0 + inputs.maintenance_penalty * 0.9 + inputs.market_stress * 0.45;
    let raw = (inputs.load.max(0.0) * pressure - mitigation(params) + 0.08) * 5.2;
    clamp_finite(raw, 0.0, STRAIN_MAX)
}

/// One tick of easing toward `target`, then the spend-driven relief.
pub fn step_strain(current: f64, target: f64, params: &Parameters) -> f64 {
    let current = clamp_finite(current, 0.0, STRAIN_MAX);
    let rate = 0.02 + params.maintenance * 0.015 + params.safety * 0.015;
    let eased = current + (target - current) * rate;
    let relief = params.environment * 0.004 + params.maintenance * 0.003 + params.safety * 0.003;
    clamp_finite(eased - relief, 0.0, STRAIN_MAX)
}

/// Strain normalized to `[0, 1]`.
pub fn strain_factor(strain: f64) -> f64 {
    clamp_finite(strain / STRAIN_MAX, 0.0, 1.0)
}

/// Direct operating-cost penalty, dollars per day.
pub fn strain_cost_per_day(strain: f64) -> f64 {
    let factor = strain_factor(strain);
    factor * factor * STRAIN_COST_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(load: f64) -> StrainInputs {
        StrainInputs {
            load,
            maintenance_penalty: 0.0,
            market_stress: 0.04,
        }
    }

    #[test]
    fn default_operation_sits_low() {
        let params = Parameters::default();
        let target = strain_target(&inputs(140.0 / 180.0), &params);
        assert!(target > 0.5 && target < 4.0, "target {target}");
    }

    #[test]
    fn overdrive_with_no_spend_saturates() {
        let params = Parameters {
            maintenance: 0.0,
            safety: 0.0,
            environment: 0.0,
            ..Parameters::default()
        };
        let target = strain_target(&inputs(1.2), &params);
        assert!(target > 6.0, "target {target}");
        assert!(target <= STRAIN_MAX);
    }

    #[test]
    fn step_moves_toward_target_and_stays_bounded() {
        let params = Parameters::default();
        let mut strain = 0.0;
        for _ in 0..2000 {
            strain = step_strain(strain, 8.0, &params);
            assert!((0.0..=STRAIN_MAX).contains(&strain));
        }
        assert!(strain > 5.0 && strain < 8.0, "strain {strain}");
    }

    #[test]
    fn cost_is_quadratic_in_factor() {
        assert!(strain_cost_per_day(0.0).abs() < 1e-9);
        assert!((strain_cost_per_day(STRAIN_MAX) - STRAIN_COST_PER_DAY).abs() < 1e-6);
        assert!((strain_cost_per_day(6.0) - STRAIN_COST_PER_DAY / 4.0).abs() < 1e-6);
    }
}
