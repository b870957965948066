//! Active alerts: per-unit alerts plus a table of plant-wide rules.

use serde::{Deserialize, Serialize};

use crate::storage::PRESSURE_ENGAGE_RATIO;
use crate::strain::strain_factor;
use crate::{AlertLevel, PlantState, UnitId};

/// Fill ratio at which a tank is flagged as near full.
const NEAR_FULL_RATIO: f64 = 0.9;
const HIGH_STRAIN_FACTOR: f64 = 0.7;
const SHIPMENT_BACKLOG_HOURS: f64 = 2.0;
const SHIPMENT_BACKLOG_COUNT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertSource {
    Unit { unit: UnitId },
    Plant { rule: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAlert {
    pub source: AlertSource,
    pub level: AlertLevel,
    pub message: String,
    pub suggested_action: String,
}

type RuleFn = fn(&PlantState) -> bool;

struct AlertRule {
    id: &'static str,
    level: AlertLevel,
    check: RuleFn,
    message: &'static str,
    suggested_action: &'static str,
}

const RULES: &[AlertRule] = &[
    AlertRule {
        id: "EMERGENCY_SHUTDOWN",
        level: AlertLevel::Danger,
        check: |s| s.emergency_shutdown,
        message: "Emergency shutdown engaged. All units are on standby",
        suggested_action: "Release the shutdown once the plant is safe",
    },
    AlertRule {
        id: "STORAGE_PRESSURE",
        level: AlertLevel::Warning,
        check: |s| s.storage.pressure.active,
        message: "Storage pressure is throttling crude intake",
        suggested_action: "Dispatch a convoy or expand storage",
    },
    AlertRule {
        id: "TANK_NEAR_FULL",
        level: AlertLevel::Warning,
        check: |s| {
            let ratio = s.storage.max_ratio();
            ratio >= NEAR_FULL_RATIO && ratio < PRESSURE_ENGAGE_RATIO && !s.storage.pressure.active
        },
        message: "A product tank is above 90% fill",
        suggested_action: "Shift product focus or move inventory before intake is throttled",
    },
    AlertRule {
        id: "CARBON_OVER_LIMIT",
        level: AlertLevel::Danger,
        check: |s| s.environment.over_limit,
        message: "Carbon output is over the permitted limit",
        suggested_action: "Raise environment spend or cut crude intake",
    },
    AlertRule {
        id: "HIGH_STRAIN",
        level: AlertLevel::Warning,
        check: |s| strain_factor(s.strain) >= HIGH_STRAIN_FACTOR,
        message: "Operational strain is high",
        suggested_action: "Ease crude intake or fund maintenance and safety",
    },
    AlertRule {
        id: "SHIPMENT_BACKLOG",
        level: AlertLevel::Warning,
        check: |s| {
            s.logistics
                .pending()
                .filter(|sh| {
                    sh.due_in <= SHIPMENT_BACKLOG_HOURS
                        && s.storage.tanks[sh.product].level < sh.volume
                })
                .count()
                >= SHIPMENT_BACKLOG_COUNT
        },
        message: "Several shipments are due soon without inventory to cover them",
        suggested_action: "Delay the next shipment or shift product focus",
    },
    AlertRule {
        id: "NEGATIVE_PROFIT",
        level: AlertLevel::Warning,
        check: |s| s.clock.minute > 0 && s.ledger.profit_per_day() < 0.0,
        message: "The plant is losing money",
        suggested_action: "Review crude intake, spend levels and penalties",
    },
];

/// Unit alerts first in registry order, then plant rules in table order.
pub fn active_alerts(state: &PlantState) -> Vec<ActiveAlert> {
    let mut alerts: Vec<ActiveAlert> = state
        .units
        .iter()
        .filter_map(|unit| {
            let level = unit.alert?;
            Some(ActiveAlert {
                source: AlertSource::Unit { unit: unit.id },
                level,
                message: format!(
                    "{}: {}",
                    unit.name,
                    unit.alert_detail.as_deref().unwrap_or(unit.mode.label())
                ),
                suggested_action: unit_action(level).to_string(),
            })
        })
        .collect();
    alerts.extend(RULES.iter().filter(|rule| (rule.check)(state)).map(|rule| {
        ActiveAlert {
            source: AlertSource::Plant {
                rule: rule.id.to_string(),
            },
            level: rule.level,
            message: rule.message.to_string(),
            suggested_action: rule.suggested_action.to_string(),
        }
    }));
    alerts
}

fn unit_action(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Danger => "Schedule a turnaround or take the unit to standby",
        AlertLevel::Warning => "Inspect the unit or ease its throttle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant_ids(alerts: &[ActiveAlert]) -> Vec<String> {
        alerts
            .iter()
            .filter_map(|a| match &a.source {
                AlertSource::Plant { rule } => Some(rule.clone()),
                AlertSource::Unit { .. } => None,
            })
            .collect()
    }

    #[test]
    fn fresh_plant_has_no_alerts() {
        assert!(active_alerts(&PlantState::default()).is_empty());
    }

    #[test]
    fn plant_rules_fire_from_state() {
        let mut state = PlantState::default();
        state.emergency_shutdown = true;
        state.storage.pressure.active = true;
        state.environment.over_limit = true;
        let ids = plant_ids(&active_alerts(&state));
        assert_eq!(
            ids,
            vec!["EMERGENCY_SHUTDOWN", "STORAGE_PRESSURE", "CARBON_OVER_LIMIT"]
        );
    }

    #[test]
    fn near_full_only_below_pressure_threshold() {
        let mut state = PlantState::default();
        state.storage.tanks.diesel.level = state.storage.tanks.diesel.capacity * 0.92;
        assert_eq!(plant_ids(&active_alerts(&state)), vec!["TANK_NEAR_FULL"]);
        state.storage.pressure.active = true;
        assert_eq!(plant_ids(&active_alerts(&state)), vec!["STORAGE_PRESSURE"]);
    }

    #[test]
    fn unit_alerts_come_first() {
        let mut state = PlantState::default();
        state.emergency_shutdown = true;
        let fcc = state.units.get_mut(UnitId::Fcc);
        fcc.alert = Some(AlertLevel::Danger);
        fcc.alert_detail = Some("Tripped, restart in 40 min".to_string());
        let alerts = active_alerts(&state);
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].source, AlertSource::Unit { unit: UnitId::Fcc });
        assert!(alerts[0].message.contains("Tripped"));
    }
}
