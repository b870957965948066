//! Unit state machine: wear, random trips, timed recovery, derived mode and alert.
//!
//! `online ⇄ standby` follows operator overrides and the emergency flag.
//! `online → offline` only fires from a trip or a turnaround; `offline → online`
//! only on downtime expiry.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rng::{roll, RandomSource, RollSite};
use crate::types::clamp_finite;
use crate::wear::{wear_per_tick, WearInputs, CRITICAL_INTEGRITY, DEGRADED_INTEGRITY};
use crate::{AlertLevel, LogLevel, Unit, UnitId, UnitMode, UnitOverride, UnitRegistry, UnitStatus};

pub const MAX_TRIP_PROBABILITY: f64 = 0.85;
const BASE_TRIP_PROBABILITY: f64 = 0.002;
const MIN_DOWNTIME_MINUTES: f64 = 30.0;
const DOWNTIME_SPREAD_MINUTES: f64 = 180.0;
const OVERLOAD_DOWNTIME_MINUTES: f64 = 240.0;
const RECOVERY_INTEGRITY_FLOOR: f64 = 0.65;
const RECOVERY_INTEGRITY_SPREAD: f64 = 0.25;
pub const TURNAROUND_INTEGRITY: f64 = 0.97;

/// Plant-wide drivers of wear and trip risk for one tick.
#[derive(Debug, Clone, Copy)]
pub struct ReliabilityInputs {
    /// Maintenance spend net of the scenario's maintenance penalty.
    pub maintenance: f64,
    pub safety: f64,
    pub environment: f64,
    pub risk_multiplier: f64,
    pub strain_factor: f64,
    /// Flare over crude throughput.
    pub flare_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCause {
    Overload,
    DeferredMaintenance,
    ScenarioStress,
    OperationalStrain,
    FlareInstability,
}

impl IncidentCause {
    pub fn describe(self) -> &'static str {
        match self {
            IncidentCause::Overload => "sustained operation above nameplate",
            IncidentCause::DeferredMaintenance => "worn internals after deferred maintenance",
            IncidentCause::ScenarioStress => "harsh operating conditions",
            IncidentCause::OperationalStrain => "accumulated operational strain",
            IncidentCause::FlareInstability => "flare system instability",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            IncidentCause::Overload => "Ease the unit throttle or crude intake.",
            IncidentCause::DeferredMaintenance => {
                "Raise maintenance spend or schedule a turnaround."
            }
            IncidentCause::ScenarioStress => "Run with extra margin until conditions ease.",
            IncidentCause::OperationalStrain => "Lower intake and fund safety to shed strain.",
            IncidentCause::FlareInstability => "Invest in environmental controls to cut flaring.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub unit: UnitId,
    pub cause: IncidentCause,
    pub level: LogLevel,
    pub downtime: f64,
}

impl Incident {
    pub fn message(&self) -> String {
        format!(
            "{} tripped offline: {}. {} Estimated downtime {:.0} min.",
            self.unit.display_name(),
            self.cause.describe(),
            self.cause.guidance(),
            self.downtime
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recovery {
    pub unit: UnitId,
    pub integrity: f64,
    pub planned: bool,
}

/// Trip probability for one critical-band unit, capped at 0.85.
pub fn trip_probability(inputs: &ReliabilityInputs, utilization: f64, integrity: f64) -> f64 {
    let overload = (utilization - 0.95).max(0.0);
    let deficit = (0.6 - inputs.maintenance).max(0.0);
    let wear = (CRITICAL_INTEGRITY - integrity).max(0.0);
    let base = BASE_TRIP_PROBABILITY + overload * 0.03 + deficit * 0.006 + wear * 0.02;
    let p = base
        * inputs.risk_multiplier.max(0.0)
        * (1.0 + inputs.strain_factor * 0.9)
        * (1.0 + inputs.flare_level.max(0.0) * 2.0)
        * (1.0 - clamp_finite(inputs.safety, 0.0, 1.0) * 0.35);
    clamp_finite(p, 0.0, MAX_TRIP_PROBABILITY)
}

fn dominant_cause(inputs: &ReliabilityInputs, utilization: f64, integrity: f64) -> IncidentCause {
    let overload = (utilization - 0.95).max(0.0);
    let deficit = (0.6 - inputs.maintenance).max(0.0);
    let wear = (CRITICAL_INTEGRITY - integrity).max(0.0);
    [
        (IncidentCause::DeferredMaintenance, deficit * 0.006 + wear * 0.02),
        (IncidentCause::Overload, overload * 0.03),
        (IncidentCause::ScenarioStress, (inputs.risk_multiplier - 1.0).max(0.0) * 0.01),
        (IncidentCause::OperationalStrain, inputs.strain_factor * 0.005),
        (IncidentCause::FlareInstability, inputs.flare_level * 0.01),
    ]
    .into_iter()
    .fold((IncidentCause::DeferredMaintenance, f64::MIN), |best, next| {
        if next.1 > best.1 {
            next
        } else {
            best
        }
    })
    .0
}

/// Start-of-tick status pass: count down downtime, recover expired units,
/// then apply standby from overrides or the emergency flag.
pub(crate) fn update_statuses(
    units: &mut UnitRegistry,
    overrides: &BTreeMap<UnitId, UnitOverride>,
    emergency: bool,
    rng: &mut impl RandomSource,
) -> Vec<Recovery> {
    let mut recoveries = Vec::new();
    for unit in units.iter_mut() {
        unit.inspection_cooldown = (unit.inspection_cooldown - 1.0).max(0.0);
        if unit.status == UnitStatus::Offline {
            unit.downtime = (unit.downtime - 1.0).max(0.0);
            if unit.downtime <= 0.0 {
                let planned = unit.turnaround;
                unit.integrity = if planned {
                    TURNAROUND_INTEGRITY
                } else {
                    RECOVERY_INTEGRITY_FLOOR
                        + roll(rng, RollSite::RecoveryIntegrity) * RECOVERY_INTEGRITY_SPREAD
                };
                unit.turnaround = false;
                unit.status = UnitStatus::Online;
                recoveries.push(Recovery {
                    unit: unit.id,
                    integrity: unit.integrity,
                    planned,
                });
            }
        }
        let manual = overrides.get(&unit.id).copied().unwrap_or_default();
        if unit.status != UnitStatus::Offline {
            unit.status = if emergency || manual.offline {
                UnitStatus::Standby
            } else {
                UnitStatus::Online
            };
        }
        unit.override_throttle = manual.throttle;
    }
    recoveries
}

/// Wear every online unit and roll trips for those in the critical band.
pub(crate) fn apply_wear(
    units: &mut UnitRegistry,
    inputs: &ReliabilityInputs,
    rng: &mut impl RandomSource,
) -> Vec<Incident> {
    let mut incidents = Vec::new();
    for unit in units.iter_mut() {
        if unit.status != UnitStatus::Online {
            continue;
        }
        let wear = wear_per_tick(&WearInputs {
            utilization: unit.utilization,
            maintenance: inputs.maintenance,
            environment: inputs.environment,
            risk_multiplier: inputs.risk_multiplier,
            strain_factor: inputs.strain_factor,
        });
        unit.integrity = clamp_finite(unit.integrity - wear, 0.0, 1.0);
        if unit.integrity >= CRITICAL_INTEGRITY {
            continue;
        }
        let p = trip_probability(inputs, unit.utilization, unit.integrity);
        if roll(rng, RollSite::IncidentTrip) >= p {
            continue;
        }
        let overload = (unit.utilization - 0.95).max(0.0);
        let downtime = MIN_DOWNTIME_MINUTES
            + roll(rng, RollSite::IncidentDowntime) * DOWNTIME_SPREAD_MINUTES
            + overload * OVERLOAD_DOWNTIME_MINUTES;
        let cause = dominant_cause(inputs, unit.utilization, unit.integrity);
        let level = if overload > 0.1 || unit.integrity < 0.2 {
            LogLevel::Danger
        } else {
            LogLevel::Warning
        };
        unit.status = UnitStatus::Offline;
        unit.downtime = downtime;
        unit.throughput = 0.0;
        unit.utilization = 0.0;
        unit.incidents += 1;
        incidents.push(Incident {
            unit: unit.id,
            cause,
            level,
            downtime,
        });
    }
    incidents
}

/// Mean integrity with offline units counted as zero.
pub fn plant_reliability(units: &UnitRegistry) -> f64 {
    let (sum, count) = units.iter().fold((0.0, 0.0), |(sum, count), unit| {
        let available = if unit.status == UnitStatus::Offline {
            0.0
        } else {
            unit.integrity
        };
        (sum + available, count + 1.0)
    });
    if count > 0.0 {
        clamp_finite(sum / count, 0.0, 1.0)
    } else {
        0.0
    }
}

/// Share of units currently offline.
pub fn downtime_share(units: &UnitRegistry) -> f64 {
    let total = units.iter().count();
    if total == 0 {
        return 0.0;
    }
    let offline = units
        .iter()
        .filter(|u| u.status == UnitStatus::Offline)
        .count();
    offline as f64 / total as f64
}

/// Refresh the derived display mode and per-unit alert.
pub(crate) fn refresh_mode_and_alert(unit: &mut Unit, emergency: bool) {
    unit.mode = match unit.status {
        UnitStatus::Offline if unit.turnaround => UnitMode::Turnaround,
        UnitStatus::Offline => UnitMode::Tripped,
        UnitStatus::Standby if emergency => UnitMode::Emergency,
        UnitStatus::Standby => UnitMode::Standby,
        UnitStatus::Online if unit.throughput <= 0.0 => UnitMode::Idle,
        UnitStatus::Online if unit.integrity < DEGRADED_INTEGRITY => UnitMode::Degraded,
        UnitStatus::Online if unit.utilization > 1.0 => UnitMode::Overdrive,
        UnitStatus::Online if unit.override_throttle.is_some_and(|t| t < 1.0) => {
            UnitMode::Throttled
        }
        UnitStatus::Online => UnitMode::Nominal,
    };
    let (alert, detail) = match unit.mode {
        UnitMode::Tripped => (
            Some(AlertLevel::Danger),
            Some(format!("Tripped, restart in {:.0} min", unit.downtime)),
        ),
        UnitMode::Turnaround => (
            Some(AlertLevel::Warning),
            Some(format!("Turnaround, {:.0} min remaining", unit.downtime)),
        ),
        UnitMode::Emergency => (
            Some(AlertLevel::Danger),
            Some("Emergency shutdown".to_string()),
        ),
        _ if unit.status == UnitStatus::Online && unit.integrity < 0.3 => (
            Some(AlertLevel::Danger),
            Some(format!("Integrity critical at {:.0}%", unit.integrity * 100.0)),
        ),
        _ if unit.status == UnitStatus::Online && unit.integrity < DEGRADED_INTEGRITY => (
            Some(AlertLevel::Warning),
            Some(format!("Integrity degraded at {:.0}%", unit.integrity * 100.0)),
        ),
        UnitMode::Overdrive if unit.utilization > 1.05 => (
            Some(AlertLevel::Warning),
            Some(format!("Running at {:.0}% of nameplate", unit.utilization * 100.0)),
        ),
        _ => (None, None),
    };
    unit.alert = alert;
    unit.alert_detail = detail;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::ScriptedRandom;

    fn inputs() -> ReliabilityInputs {
        ReliabilityInputs {
            maintenance: 0.6,
            safety: 0.55,
            environment: 0.45,
            risk_multiplier: 1.0,
            strain_factor: 0.2,
            flare_level: 0.0,
        }
    }

    #[test]
    fn trip_probability_is_capped() {
        let extreme = ReliabilityInputs {
            maintenance: 0.0,
            safety: 0.0,
            risk_multiplier: 5.0,
            strain_factor: 1.0,
            flare_level: 2.0,
            ..inputs()
        };
        let p = trip_probability(&extreme, 1.5, 0.0);
        assert!((p - MAX_TRIP_PROBABILITY).abs() < 1e-12);
    }

    #[test]
    fn safety_lowers_trip_probability() {
        let careless = ReliabilityInputs {
            safety: 0.0,
            ..inputs()
        };
        let careful = ReliabilityInputs {
            safety: 1.0,
            ..inputs()
        };
        assert!(trip_probability(&careful, 1.0, 0.2) < trip_probability(&careless, 1.0, 0.2));
    }

    #[test]
    fn healthy_units_never_roll() {
        let mut units = UnitRegistry::new();
        // A source that always trips would fire on any roll.
        let mut rng = ScriptedRandom::constant(0.0);
        let incidents = apply_wear(&mut units, &inputs(), &mut rng);
        assert!(incidents.is_empty());
        assert!(rng.calls() == 0);
    }

    #[test]
    fn critical_unit_trips_on_low_roll() {
        let mut units = UnitRegistry::new();
        {
            let fcc = units.get_mut(UnitId::Fcc);
            fcc.integrity = 0.2;
            fcc.utilization = 1.1;
        }
        let mut rng = ScriptedRandom::constant(0.0);
        let incidents = apply_wear(&mut units, &inputs(), &mut rng);
        assert_eq!(incidents.len(), 1);
        let incident = &incidents[0];
        assert_eq!(incident.unit, UnitId::Fcc);
        assert_eq!(incident.cause, IncidentCause::Overload);
        assert_eq!(incident.level, LogLevel::Danger);
        // 30 + 0 * 180 + 0.15 * 240
        assert!((incident.downtime - 66.0).abs() < 1e-9);
        let fcc = units.get(UnitId::Fcc);
        assert_eq!(fcc.status, UnitStatus::Offline);
        assert_eq!(fcc.incidents, 1);
        assert!(fcc.throughput.abs() < 1e-12);
    }

    #[test]
    fn high_roll_never_trips() {
        let mut units = UnitRegistry::new();
        units.get_mut(UnitId::Reformer).integrity = 0.1;
        let mut rng = ScriptedRandom::constant(0.99);
        let incidents = apply_wear(&mut units, &inputs(), &mut rng);
        assert!(incidents.is_empty());
        assert_eq!(units.get(UnitId::Reformer).status, UnitStatus::Online);
    }

    #[test]
    fn standby_units_do_not_wear() {
        let mut units = UnitRegistry::new();
        units.get_mut(UnitId::Sulfur).status = UnitStatus::Standby;
        let mut rng = ScriptedRandom::constant(0.5);
        apply_wear(&mut units, &inputs(), &mut rng);
        assert!((units.get(UnitId::Sulfur).integrity - 1.0).abs() < 1e-12);
        assert!(units.get(UnitId::Reformer).integrity < 1.0);
    }

    #[test]
    fn offline_unit_recovers_on_expiry() {
        let mut units = UnitRegistry::new();
        {
            let unit = units.get_mut(UnitId::Hydrocracker);
            unit.status = UnitStatus::Offline;
            unit.downtime = 2.0;
            unit.integrity = 0.1;
        }
        let mut rng = ScriptedRandom::constant(0.5);
        let overrides = BTreeMap::new();
        assert!(update_statuses(&mut units, &overrides, false, &mut rng).is_empty());
        assert_eq!(units.get(UnitId::Hydrocracker).status, UnitStatus::Offline);
        let recoveries = update_statuses(&mut units, &overrides, false, &mut rng);
        assert_eq!(recoveries.len(), 1);
        let unit = units.get(UnitId::Hydrocracker);
        assert_eq!(unit.status, UnitStatus::Online);
        assert!((unit.integrity - 0.775).abs() < 1e-9);
    }

    #[test]
    fn turnaround_recovers_to_fixed_integrity() {
        let mut units = UnitRegistry::new();
        {
            let unit = units.get_mut(UnitId::Alkylation);
            unit.status = UnitStatus::Offline;
            unit.turnaround = true;
            unit.downtime = 1.0;
        }
        let mut rng = ScriptedRandom::constant(0.0);
        let recoveries = update_statuses(&mut units, &BTreeMap::new(), false, &mut rng);
        assert!(recoveries[0].planned);
        assert!((units.get(UnitId::Alkylation).integrity - TURNAROUND_INTEGRITY).abs() < 1e-12);
        assert!(!units.get(UnitId::Alkylation).turnaround);
    }

    #[test]
    fn emergency_forces_standby_but_not_offline() {
        let mut units = UnitRegistry::new();
        {
            let unit = units.get_mut(UnitId::Fcc);
            unit.status = UnitStatus::Offline;
            unit.downtime = 50.0;
        }
        let mut rng = ScriptedRandom::constant(0.5);
        update_statuses(&mut units, &BTreeMap::new(), true, &mut rng);
        assert_eq!(units.get(UnitId::Fcc).status, UnitStatus::Offline);
        assert_eq!(units.get(UnitId::Reformer).status, UnitStatus::Standby);
        update_statuses(&mut units, &BTreeMap::new(), false, &mut rng);
        assert_eq!(units.get(UnitId::Reformer).status, UnitStatus::Online);
    }

    #[test]
    fn reliability_counts_offline_as_zero() {
        let mut units = UnitRegistry::new();
        assert!((plant_reliability(&units) - 1.0).abs() < 1e-12);
        units.get_mut(UnitId::Fcc).status = UnitStatus::Offline;
        assert!((plant_reliability(&units) - 5.0 / 6.0).abs() < 1e-12);
        assert!((downtime_share(&units) - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn mode_reflects_state() {
        let mut unit = Unit::new(UnitId::Reformer);
        unit.throughput = 30.0;
        unit.utilization = 1.1;
        refresh_mode_and_alert(&mut unit, false);
        assert_eq!(unit.mode, UnitMode::Overdrive);
        assert_eq!(unit.alert, Some(AlertLevel::Warning));
        unit.integrity = 0.25;
        refresh_mode_and_alert(&mut unit, false);
        assert_eq!(unit.mode, UnitMode::Degraded);
        assert_eq!(unit.alert, Some(AlertLevel::Danger));
        unit.status = UnitStatus::Standby;
        refresh_mode_and_alert(&mut unit, true);
        assert_eq!(unit.mode, UnitMode::Emergency);
    }
}
