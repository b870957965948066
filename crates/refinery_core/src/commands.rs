//! Operator commands. Each is applied instantly between ticks.
//!
//! Commands whose preconditions fail return an [`ActionError`] after logging
//! the reason; none of them panic or leave partial state behind.

use serde::{Deserialize, Serialize};

use crate::engine::refresh_modes;
use crate::error::ActionError;
use crate::flow::MAX_THROTTLE;
use crate::logistics::nominal_volume;
use crate::recorder::RecordingSummary;
use crate::rng::RandomSource;
use crate::storage::MAX_UPGRADES;
use crate::types::clamp_finite;
use crate::{
    Engine, LogLevel, Param, PipelineBoost, ScenarioId, ShipmentId, Stream, UnitId, UnitOverride,
    UnitStatus,
};

const CONVOY_COOLDOWN_MINUTES: f64 = 180.0;
const CONVOY_COST: f64 = 65_000.0;
const CONVOY_MIN_VOLUME: f64 = 8.0;
const CONVOY_DUE_HOURS: f64 = 1.0;
const CONVOY_RELIEF: f64 = 0.15;

const DELAY_COOLDOWN_MINUTES: f64 = 120.0;
const DELAY_COST: f64 = 35_000.0;
const DEFAULT_DELAY_HOURS: f64 = 6.0;
const MAX_DELAY_HOURS: f64 = 24.0;

const CHARTER_COOLDOWN_MINUTES: f64 = 360.0;
const CHARTER_COST: f64 = 120_000.0;
const CHARTER_MIN_VOLUME: f64 = 10.0;
const CHARTER_DUE_HOURS: f64 = 2.0;

const EXPANSION_COOLDOWN_MINUTES: f64 = 1440.0;
const EXPANSION_COST: f64 = 1_800_000.0;

const BYPASS_COST: f64 = 140_000.0;
const BYPASS_MULTIPLIER: f64 = 1.35;
const BYPASS_MINUTES: u64 = 360;

const TURNAROUND_COST: f64 = 420_000.0;
const TURNAROUND_MINUTES: f64 = 180.0;

const INSPECTION_COST: f64 = 25_000.0;
const INSPECTION_GAIN: f64 = 0.06;
const INSPECTION_COOLDOWN_MINUTES: f64 = 120.0;

/// Options for unit override commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideOptions {
    /// Skip the event-log entry.
    #[serde(default)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DelayOptions {
    /// Hours to push the shipment back; defaults to 6.
    #[serde(default)]
    pub hours: Option<f64>,
}

/// A scriptable operator command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    SetParam { param: Param, value: f64 },
    ApplyScenario { scenario: ScenarioId },
    SetUnitThrottle { unit: UnitId, throttle: f64 },
    SetUnitOffline { unit: UnitId, offline: bool },
    ClearUnitOverride { unit: UnitId },
    TriggerEmergencyShutdown,
    ReleaseEmergencyShutdown,
    DispatchLogisticsConvoy,
    DelayNextShipment {
        #[serde(default)]
        hours: Option<f64>,
    },
    RequestExtraShipment,
    ExpandStorageCapacity,
    DeployPipelineBypass { unit: UnitId },
    ScheduleTurnaround { unit: UnitId },
    PerformInspection { unit: UnitId },
    TogglePerformanceRecording,
}

/// A command scheduled for a simulated minute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub at_minute: u64,
    pub command: Command,
}

impl<R: RandomSource> Engine<R> {
    /// Apply a scripted command.
    pub fn execute(&mut self, command: &Command) -> Result<(), ActionError> {
        let quiet = OverrideOptions::default();
        match *command {
            Command::SetParam { param, value } => self.set_param(param, value),
            Command::ApplyScenario { scenario } => self.apply_scenario(scenario),
            Command::SetUnitThrottle { unit, throttle } => {
                self.set_unit_throttle(unit, throttle, quiet);
            }
            Command::SetUnitOffline { unit, offline } => {
                self.set_unit_offline(unit, offline, quiet);
            }
            Command::ClearUnitOverride { unit } => self.clear_unit_override(unit),
            Command::TriggerEmergencyShutdown => self.trigger_emergency_shutdown(),
            Command::ReleaseEmergencyShutdown => self.release_emergency_shutdown(),
            Command::DispatchLogisticsConvoy => {
                self.dispatch_logistics_convoy()?;
            }
            Command::DelayNextShipment { hours } => {
                self.delay_next_shipment(DelayOptions { hours })?;
            }
            Command::RequestExtraShipment => {
                self.request_extra_shipment()?;
            }
            Command::ExpandStorageCapacity => {
                self.expand_storage_capacity()?;
            }
            Command::DeployPipelineBypass { unit } => {
                self.deploy_pipeline_bypass(unit)?;
            }
            Command::ScheduleTurnaround { unit } => self.schedule_turnaround(unit)?,
            Command::PerformInspection { unit } => {
                self.perform_inspection(unit)?;
            }
            Command::TogglePerformanceRecording => {
                self.toggle_performance_recording();
            }
        }
        Ok(())
    }

    fn log(&mut self, level: LogLevel, message: String) {
        self.state.log(self.constants.log_capacity, level, message);
    }

    fn reject<T>(&mut self, error: ActionError) -> Result<T, ActionError> {
        self.log(LogLevel::Warning, format!("Action skipped: {error}"));
        Err(error)
    }

    // -- parameters and scenario ---------------------------------------------

    /// Non-finite values are ignored; finite ones are clamped to the range.
    pub fn set_param(&mut self, param: Param, value: f64) {
        if !value.is_finite() {
            tracing::debug!(param = param.as_str(), "ignored non-finite parameter value");
            return;
        }
        self.state.params.set(param, value);
        tracing::debug!(
            param = param.as_str(),
            value = self.state.params.get(param),
            "parameter set"
        );
    }

    pub fn set_param_by_name(&mut self, name: &str, value: f64) -> Result<(), ActionError> {
        match Param::parse(name) {
            Some(param) => {
                self.set_param(param, value);
                Ok(())
            }
            None => self.reject(ActionError::UnknownParam(name.to_string())),
        }
    }

    pub fn apply_scenario(&mut self, scenario: ScenarioId) {
        let def = scenario.def();
        self.state.scenario = scenario;
        self.state.environment.limit =
            crate::environment::carbon_limit(def.environment_pressure);
        self.log(LogLevel::Info, format!("Scenario changed to {}", def.name));
    }

    pub fn apply_scenario_by_key(&mut self, key: &str) -> Result<(), ActionError> {
        match ScenarioId::parse(key) {
            Some(scenario) => {
                self.apply_scenario(scenario);
                Ok(())
            }
            None => self.reject(ActionError::UnknownScenario(key.to_string())),
        }
    }

    // -- clock ----------------------------------------------------------------

    /// Returns whether the clock is now running.
    pub fn toggle_running(&mut self) -> bool {
        self.state.clock.toggle_running()
    }

    pub fn request_step(&mut self) {
        self.state.clock.request_step();
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.state.clock.set_speed(speed);
    }

    pub fn set_speed_preset(&mut self, index: usize) {
        self.state.clock.set_speed_preset(index);
    }

    pub fn faster(&mut self) {
        self.state.clock.faster();
    }

    pub fn slower(&mut self) {
        self.state.clock.slower();
    }

    // -- unit overrides -------------------------------------------------------

    pub fn set_unit_throttle(&mut self, unit: UnitId, throttle: f64, options: OverrideOptions) {
        if !throttle.is_finite() {
            return;
        }
        let throttle = clamp_finite(throttle, 0.0, MAX_THROTTLE);
        self.state.overrides.entry(unit).or_default().throttle = Some(throttle);
        self.sync_unit(unit);
        if !options.quiet {
            self.log(
                LogLevel::Info,
                format!(
                    "{} throttle set to {:.0}%",
                    unit.display_name(),
                    throttle * 100.0
                ),
            );
        }
    }

    pub fn set_unit_offline(&mut self, unit: UnitId, offline: bool, options: OverrideOptions) {
        self.state.overrides.entry(unit).or_default().offline = offline;
        self.prune_override(unit);
        self.sync_unit(unit);
        if !options.quiet {
            let message = if offline {
                format!("{} placed on manual standby", unit.display_name())
            } else {
                format!("{} released from manual standby", unit.display_name())
            };
            self.log(LogLevel::Info, message);
        }
    }

    pub fn clear_unit_override(&mut self, unit: UnitId) {
        if self.state.overrides.remove(&unit).is_some() {
            self.sync_unit(unit);
            self.log(
                LogLevel::Info,
                format!("{} returned to automatic control", unit.display_name()),
            );
        }
    }

    fn prune_override(&mut self, unit: UnitId) {
        if self
            .state
            .overrides
            .get(&unit)
            .is_some_and(UnitOverride::is_empty)
        {
            self.state.overrides.remove(&unit);
        }
    }

    /// Apply the override and emergency flag to one unit right away.
    fn sync_unit(&mut self, id: UnitId) {
        let manual = self.state.overrides.get(&id).copied().unwrap_or_default();
        let emergency = self.state.emergency_shutdown;
        let unit = self.state.units.get_mut(id);
        unit.override_throttle = manual.throttle;
        if unit.status != UnitStatus::Offline {
            unit.status = if emergency || manual.offline {
                UnitStatus::Standby
            } else {
                UnitStatus::Online
            };
        }
        if unit.status != UnitStatus::Online {
            unit.throughput = 0.0;
            unit.utilization = 0.0;
        }
        refresh_modes(&mut self.state);
    }

    pub fn trigger_emergency_shutdown(&mut self) {
        if self.state.emergency_shutdown {
            return;
        }
        self.state.emergency_shutdown = true;
        for id in UnitId::ALL {
            self.sync_unit(id);
        }
        self.log(
            LogLevel::Danger,
            "Emergency shutdown triggered. All units to standby".to_string(),
        );
    }

    pub fn release_emergency_shutdown(&mut self) {
        if !self.state.emergency_shutdown {
            return;
        }
        self.state.emergency_shutdown = false;
        for id in UnitId::ALL {
            self.sync_unit(id);
        }
        self.log(
            LogLevel::Info,
            "Emergency shutdown released. Units resuming".to_string(),
        );
    }

    // -- logistics actions ----------------------------------------------------

    /// Rush the fullest product out within the hour and ease storage pressure.
    pub fn dispatch_logistics_convoy(&mut self) -> Result<ShipmentId, ActionError> {
        let remaining = self.state.logistics.cooldowns.convoy;
        if remaining > 0.0 {
            return self.reject(ActionError::Cooldown {
                action: "Convoy dispatch",
                minutes: remaining,
            });
        }
        let (product, level) = self.state.storage.fullest();
        if level < CONVOY_MIN_VOLUME {
            return self.reject(ActionError::NoEligibleProduct {
                required: CONVOY_MIN_VOLUME,
            });
        }
        let volume = (nominal_volume(product) * 1.5)
            .max(CONVOY_MIN_VOLUME)
            .min(level);
        let minute = self.state.clock.minute;
        let id = self.state.logistics.create(
            product,
            volume,
            CONVOY_DUE_HOURS,
            CONVOY_DUE_HOURS,
            minute,
            true,
        );
        self.state.logistics.cooldowns.convoy = CONVOY_COOLDOWN_MINUTES;
        self.state.storage.relieve(CONVOY_RELIEF);
        self.state.ledger.charge(CONVOY_COST);
        self.log(
            LogLevel::Info,
            format!(
                "Convoy dispatched: {volume:.1} kbbl of {} due in {CONVOY_DUE_HOURS:.0} h ({id})",
                product.label()
            ),
        );
        Ok(id)
    }

    /// Push the earliest pending shipment back, using up its window.
    pub fn delay_next_shipment(&mut self, options: DelayOptions) -> Result<ShipmentId, ActionError> {
        let remaining = self.state.logistics.cooldowns.delay;
        if remaining > 0.0 {
            return self.reject(ActionError::Cooldown {
                action: "Shipment delay",
                minutes: remaining,
            });
        }
        let hours = options
            .hours
            .filter(|h| h.is_finite())
            .map_or(DEFAULT_DELAY_HOURS, |h| h.clamp(0.0, MAX_DELAY_HOURS));
        let Some(shipment) = self.state.logistics.next_pending_mut() else {
            return self.reject(ActionError::NoPendingShipment);
        };
        shipment.due_in += hours;
        shipment.window = (shipment.window - hours).max(0.0);
        let id = shipment.id.clone();
        let product = shipment.product;
        let due_in = shipment.due_in;
        self.state.logistics.cooldowns.delay = DELAY_COOLDOWN_MINUTES;
        self.state.ledger.charge(DELAY_COST);
        self.log(
            LogLevel::Info,
            format!(
                "Shipment {id} ({}) delayed by {hours:.1} h, now due in {due_in:.1} h",
                product.label()
            ),
        );
        Ok(id)
    }

    /// Charter an extra lift of the fullest product.
    pub fn request_extra_shipment(&mut self) -> Result<ShipmentId, ActionError> {
        let remaining = self.state.logistics.cooldowns.charter;
        if remaining > 0.0 {
            return self.reject(ActionError::Cooldown {
                action: "Emergency charter",
                minutes: remaining,
            });
        }
        let (product, level) = self.state.storage.fullest();
        if level < CHARTER_MIN_VOLUME {
            return self.reject(ActionError::NoEligibleProduct {
                required: CHARTER_MIN_VOLUME,
            });
        }
        let volume = (nominal_volume(product) * 2.0)
            .max(CHARTER_MIN_VOLUME)
            .min(level);
        let minute = self.state.clock.minute;
        let id = self.state.logistics.create(
            product,
            volume,
            CHARTER_DUE_HOURS,
            CHARTER_DUE_HOURS,
            minute,
            true,
        );
        self.state.logistics.cooldowns.charter = CHARTER_COOLDOWN_MINUTES;
        self.state.ledger.charge(CHARTER_COST);
        self.log(
            LogLevel::Info,
            format!(
                "Charter booked: {volume:.1} kbbl of {} due in {CHARTER_DUE_HOURS:.0} h ({id})",
                product.label()
            ),
        );
        Ok(id)
    }

    /// Returns the number of upgrades after this one.
    pub fn expand_storage_capacity(&mut self) -> Result<u32, ActionError> {
        if self.state.storage.upgrades >= MAX_UPGRADES {
            return self.reject(ActionError::UpgradeLimit(self.state.storage.upgrades));
        }
        let remaining = self.state.logistics.cooldowns.expansion;
        if remaining > 0.0 {
            return self.reject(ActionError::Cooldown {
                action: "Storage expansion",
                minutes: remaining,
            });
        }
        self.state.storage.expand();
        self.state.logistics.cooldowns.expansion = EXPANSION_COOLDOWN_MINUTES;
        self.state.ledger.charge(EXPANSION_COST);
        let upgrades = self.state.storage.upgrades;
        self.log(
            LogLevel::Info,
            format!("Tank farm expanded ({upgrades}/{MAX_UPGRADES})"),
        );
        Ok(upgrades)
    }

    // -- unit actions ---------------------------------------------------------

    /// Boost the stream feeding `unit` for six hours.
    pub fn deploy_pipeline_bypass(&mut self, unit: UnitId) -> Result<Stream, ActionError> {
        let Some(stream) = Stream::feeding(unit) else {
            return self.reject(ActionError::NoFeedStream(unit));
        };
        if self.state.boosts.contains_key(&stream) {
            return self.reject(ActionError::BoostActive(stream));
        }
        let expires_at = self.state.clock.minute + BYPASS_MINUTES;
        self.state.boosts.insert(
            stream,
            PipelineBoost {
                multiplier: BYPASS_MULTIPLIER,
                expires_at,
            },
        );
        self.state.ledger.charge(BYPASS_COST);
        self.log(
            LogLevel::Info,
            format!(
                "Pipeline bypass on {} to {}: capacity x{BYPASS_MULTIPLIER} for {} h",
                stream.as_str(),
                unit.display_name(),
                BYPASS_MINUTES / 60
            ),
        );
        Ok(stream)
    }

    /// Take `unit` offline for planned work; it returns near-new.
    pub fn schedule_turnaround(&mut self, id: UnitId) -> Result<(), ActionError> {
        if self.state.units.get(id).status != UnitStatus::Online {
            return self.reject(ActionError::UnitUnavailable(id));
        }
        let unit = self.state.units.get_mut(id);
        unit.status = UnitStatus::Offline;
        unit.turnaround = true;
        unit.downtime = TURNAROUND_MINUTES;
        unit.throughput = 0.0;
        unit.utilization = 0.0;
        refresh_modes(&mut self.state);
        self.state.ledger.charge(TURNAROUND_COST);
        self.log(
            LogLevel::Warning,
            format!(
                "Turnaround started on {} ({TURNAROUND_MINUTES:.0} min)",
                id.display_name()
            ),
        );
        Ok(())
    }

    /// Returns the unit's integrity after the inspection.
    pub fn perform_inspection(&mut self, id: UnitId) -> Result<f64, ActionError> {
        let remaining = self.state.units.get(id).inspection_cooldown;
        if remaining > 0.0 {
            return self.reject(ActionError::Cooldown {
                action: "Inspection",
                minutes: remaining,
            });
        }
        let unit = self.state.units.get_mut(id);
        let before = unit.integrity;
        unit.integrity = (unit.integrity + INSPECTION_GAIN).min(1.0);
        unit.inspection_cooldown = INSPECTION_COOLDOWN_MINUTES;
        let after = unit.integrity;
        let detail = format!(
            "Inspection of {}: integrity {:.0}% -> {:.0}%, load {:.0}%, {} incidents, mode {}",
            unit.name,
            before * 100.0,
            after * 100.0,
            unit.utilization * 100.0,
            unit.incidents,
            unit.mode.label()
        );
        refresh_modes(&mut self.state);
        self.state.ledger.charge(INSPECTION_COST);
        self.log(LogLevel::Info, detail);
        Ok(after)
    }

    // -- recorder -------------------------------------------------------------

    /// Start recording, or stop and return the summary.
    pub fn toggle_performance_recording(&mut self) -> Option<RecordingSummary> {
        if self.state.recorder.active {
            let summary = self.state.recorder.stop();
            self.log(
                LogLevel::Info,
                format!(
                    "Recording stopped after {:.1} h: profit ${:.0}, {} incidents, {} shipments missed",
                    summary.hours, summary.profit, summary.incidents, summary.shipments_missed
                ),
            );
            Some(summary)
        } else {
            let minute = self.state.clock.minute;
            self.state.recorder.start(minute);
            self.log(LogLevel::Info, "Recording started".to_string());
            None
        }
    }
}
