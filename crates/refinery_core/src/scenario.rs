//! Static catalog of operating conditions, selected by key.

use serde::{Deserialize, Serialize};

use crate::PerProduct;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    Baseline,
    SummerPeak,
    WinterDiesel,
    Hurricane,
    TightCrude,
    RegulatoryCrackdown,
    SourCrude,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 7] = [
        ScenarioId::Baseline,
        ScenarioId::SummerPeak,
        ScenarioId::WinterDiesel,
        ScenarioId::Hurricane,
        ScenarioId::TightCrude,
        ScenarioId::RegulatoryCrackdown,
        ScenarioId::SourCrude,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioId::Baseline => "baseline",
            ScenarioId::SummerPeak => "summer_peak",
            ScenarioId::WinterDiesel => "winter_diesel",
            ScenarioId::Hurricane => "hurricane",
            ScenarioId::TightCrude => "tight_crude",
            ScenarioId::RegulatoryCrackdown => "regulatory_crackdown",
            ScenarioId::SourCrude => "sour_crude",
        }
    }

    pub fn parse(key: &str) -> Option<ScenarioId> {
        ScenarioId::ALL.into_iter().find(|s| s.as_str() == key)
    }

    pub fn def(self) -> ScenarioDef {
        scenario_def(self)
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable operating conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDef {
    pub key: ScenarioId,
    pub name: String,
    pub description: String,
    /// Scales available crude.
    pub crude_multiplier: f64,
    /// Scales crude cost and product price targets.
    pub price_modifier: f64,
    pub demand_bias: PerProduct<f64>,
    pub risk_multiplier: f64,
    pub maintenance_penalty: f64,
    pub environment_pressure: f64,
    /// Positive = lighter crude slate (more naphtha/gas, less resid).
    pub quality_shift: f64,
}

fn scenario_def(id: ScenarioId) -> ScenarioDef {
    let (name, description) = describe(id);
    let base = ScenarioDef {
        key: id,
        name: name.to_string(),
        description: description.to_string(),
        crude_multiplier: 1.0,
        price_modifier: 1.0,
        demand_bias: PerProduct {
            gasoline: 1.0,
            diesel: 1.0,
            jet: 1.0,
            lpg: 1.0,
        },
        risk_multiplier: 1.0,
        maintenance_penalty: 0.0,
        environment_pressure: 0.0,
        quality_shift: 0.0,
    };
    match id {
        ScenarioId::Baseline => base,
        ScenarioId::SummerPeak => ScenarioDef {
            price_modifier: 1.06,
            demand_bias: PerProduct {
                gasoline: 1.22,
                diesel: 0.95,
                jet: 1.12,
                lpg: 0.9,
            },
            risk_multiplier: 1.1,
            maintenance_penalty: 0.08,
            environment_pressure: 0.1,
            ..base
        },
        ScenarioId::WinterDiesel => ScenarioDef {
            price_modifier: 1.04,
            demand_bias: PerProduct {
                gasoline: 0.88,
                diesel: 1.25,
                jet: 0.95,
                lpg: 1.3,
            },
            risk_multiplier: 1.08,
            maintenance_penalty: 0.1,
            ..base
        },
        ScenarioId::Hurricane => ScenarioDef {
            crude_multiplier: 0.78,
            price_modifier: 1.15,
            demand_bias: PerProduct {
                gasoline: 1.1,
                diesel: 1.15,
                jet: 0.7,
                lpg: 1.0,
            },
            risk_multiplier: 1.45,
            maintenance_penalty: 0.22,
            environment_pressure: 0.05,
            ..base
        },
        ScenarioId::TightCrude => ScenarioDef {
            crude_multiplier: 0.82,
            price_modifier: 1.12,
            risk_multiplier: 1.05,
            maintenance_penalty: 0.05,
            quality_shift: -0.03,
            ..base
        },
        ScenarioId::RegulatoryCrackdown => ScenarioDef {
            price_modifier: 0.98,
            risk_multiplier: 1.0,
            maintenance_penalty: 0.06,
            environment_pressure: 0.45,
            ..base
        },
        ScenarioId::SourCrude => ScenarioDef {
            crude_multiplier: 1.05,
            price_modifier: 0.94,
            risk_multiplier: 1.22,
            maintenance_penalty: 0.15,
            environment_pressure: 0.2,
            quality_shift: -0.08,
            ..base
        },
    }
}

fn describe(id: ScenarioId) -> (&'static str, &'static str) {
    match id {
        ScenarioId::Baseline => ("Baseline Operations", "Balanced crude supply and demand."),
        ScenarioId::SummerPeak => (
            "Summer Driving Peak",
            "Gasoline and jet demand surge; heat stresses equipment.",
        ),
        ScenarioId::WinterDiesel => (
            "Winter Heating Demand",
            "Diesel and LPG pull hard; cold snaps add maintenance load.",
        ),
        ScenarioId::Hurricane => (
            "Gulf Hurricane",
            "Crude deliveries disrupted, prices spike, storm damage risk is high.",
        ),
        ScenarioId::TightCrude => (
            "Tight Crude Market",
            "Feedstock is scarce and expensive with a slightly heavier slate.",
        ),
        ScenarioId::RegulatoryCrackdown => (
            "Regulatory Crackdown",
            "Emission limits tighten and compliance penalties climb.",
        ),
        ScenarioId::SourCrude => (
            "Sour Crude Slate",
            "Cheap heavy, high-sulfur crude that fouls units and loads sulfur recovery.",
        ),
    }
}

/// Every scenario, in catalog order.
pub fn scenario_catalog() -> Vec<ScenarioDef> {
    ScenarioId::ALL.into_iter().map(scenario_def).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_keys_round_trip() {
        for def in scenario_catalog() {
            assert_eq!(ScenarioId::parse(def.key.as_str()), Some(def.key));
        }
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert_eq!(ScenarioId::parse("volcano"), None);
    }

    #[test]
    fn baseline_is_neutral() {
        let def = ScenarioId::Baseline.def();
        assert!((def.crude_multiplier - 1.0).abs() < 1e-12);
        assert!((def.risk_multiplier - 1.0).abs() < 1e-12);
        assert!(def.maintenance_penalty.abs() < 1e-12);
    }

    #[test]
    fn disruptive_scenarios_raise_risk() {
        assert!(ScenarioId::Hurricane.def().risk_multiplier > 1.3);
        assert!(ScenarioId::Hurricane.def().crude_multiplier < 1.0);
    }
}
