//! Save and restore the full plant state.
//!
//! `create_snapshot` captures every mutable entity as a serde value.
//! `load_snapshot` reads a `serde_json::Value` field by field: anything
//! missing, mistyped or out of range falls back to a fresh plant's value, and
//! only a non-object top level is rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::directives::{
    Directive, DirectiveKind, DirectiveState, DirectiveStats, DirectiveStatus,
};
use crate::economy::{CashTotals, Ledger, RateWindow, RATE_WINDOW_HOURS};
use crate::engine::refresh_modes;
use crate::environment::{carbon_limit, EnvironmentState};
use crate::error::SnapshotError;
use crate::flow::{MAX_THROTTLE, MAX_UTILIZATION};
use crate::log::LogEntry;
use crate::logistics::{LogisticsCooldowns, LogisticsState, Shipment, ShipmentStats, ShipmentStatus};
use crate::market::{MarketState, ProductMarket, MAX_STRESS, MIN_STRESS};
use crate::recorder::Recorder;
use crate::rng::RandomSource;
use crate::score::{Grade, HistorySample, Scorecard, SubScores};
use crate::state::TankActivity;
use crate::storage::{StoragePressure, StorageState, Tank, MAX_UPGRADES, MIN_PRESSURE_THROTTLE};
use crate::strain::STRAIN_MAX;
use crate::{
    DirectiveId, Engine, LogLevel, Param, Parameters, PerProduct, PipelineBoost, PlantState,
    Product, ProductionRates, ScenarioId, ShipmentId, Stream, StreamFlows, Unit, UnitId,
    UnitOverride, UnitRegistry, UnitStatus,
};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything needed to resume a plant. Serializes to a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub minute: u64,
    pub running: bool,
    pub speed: f64,
    pub scenario: ScenarioId,
    pub params: Parameters,
    pub units: Vec<Unit>,
    pub overrides: BTreeMap<UnitId, UnitOverride>,
    pub boosts: BTreeMap<Stream, PipelineBoost>,
    pub emergency_shutdown: bool,
    pub crude_target: f64,
    pub flows: StreamFlows,
    pub production: ProductionRates,
    pub strain: f64,
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
    pub history: Vec<HistorySample>,
    pub recorder: Recorder,
    pub logs: Vec<LogEntry>,
}

impl Snapshot {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl<R: RandomSource> Engine<R> {
    pub fn create_snapshot(&self) -> Snapshot {
        let s = &self.state;
        Snapshot {
            version: SNAPSHOT_VERSION,
            minute: s.clock.minute,
            running: s.clock.running,
            speed: s.clock.speed,
            scenario: s.scenario,
            params: s.params,
            units: s.units.to_vec(),
            overrides: s.overrides.clone(),
            boosts: s.boosts.clone(),
            emergency_shutdown: s.emergency_shutdown,
            crude_target: s.crude_target,
            flows: s.flows,
            production: s.production,
            strain: s.strain,
            incident_pressure: s.incident_pressure,
            total_incidents: s.total_incidents,
            storage: s.storage.clone(),
            tank_activity: s.tank_activity,
            logistics: s.logistics.clone(),
            market: s.market.clone(),
            environment: s.environment,
            ledger: s.ledger.clone(),
            directives: s.directives.clone(),
            scorecard: s.scorecard.clone(),
            history: s.history.samples(),
            recorder: s.recorder,
            logs: s.log.entries(),
        }
    }

    /// Replace the plant with the one described by `value`.
    pub fn load_snapshot(&mut self, value: &Value) -> Result<(), SnapshotError> {
        let Some(root) = value.as_object() else {
            return Err(SnapshotError::NotAnObject(json_type(value)));
        };
        let fields = Fields(Some(root));
        let version = fields.u32("version", SNAPSHOT_VERSION);
        if version != SNAPSHOT_VERSION {
            tracing::warn!(version, expected = SNAPSHOT_VERSION, "loading snapshot from another version");
        }
        self.state = read_state(&fields, &self.constants);
        refresh_modes(&mut self.state);
        tracing::info!(minute = self.state.clock.minute, "snapshot loaded");
        Ok(())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

/// Typed, defaulting view over an optional JSON object.
#[derive(Clone, Copy)]
struct Fields<'a>(Option<&'a Map<String, Value>>);

impl<'a> Fields<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        Self(value.and_then(Value::as_object))
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.0.and_then(|map| map.get(key))
    }

    fn obj(&self, key: &str) -> Fields<'a> {
        Fields::of(self.get(key))
    }

    fn list(&self, key: &str) -> &'a [Value] {
        self.get(key)
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    }

    fn opt_f64(&self, key: &str) -> Option<f64> {
        self.get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }

    fn f64(&self, key: &str, default: f64) -> f64 {
        self.opt_f64(key).unwrap_or(default)
    }

    fn f64_in(&self, key: &str, default: f64, lo: f64, hi: f64) -> f64 {
        self.opt_f64(key).map_or(default, |v| v.clamp(lo, hi))
    }

    fn non_negative(&self, key: &str, default: f64) -> f64 {
        self.opt_f64(key).map_or(default, |v| v.max(0.0))
    }

    fn ratio(&self, key: &str, default: f64) -> f64 {
        self.f64_in(key, default, 0.0, 1.0)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    fn u64(&self, key: &str, default: u64) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    fn u32(&self, key: &str, default: u32) -> u32 {
        self.get(key)
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(default)
    }

    fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.str(key).unwrap_or(default).to_string()
    }

    fn per_product(&self, key: &str, default: PerProduct<f64>, lo: f64, hi: f64) -> PerProduct<f64> {
        let section = self.obj(key);
        default.map(|p, d| section.f64_in(p.as_str(), *d, lo, hi))
    }
}

/// Numeric suffix of ids like `shp_0042`.
fn id_seq(id: &str) -> u64 {
    id.rsplit('_')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

fn read_state(f: &Fields<'_>, constants: &crate::Constants) -> PlantState {
    let scenario = f
        .str("scenario")
        .and_then(ScenarioId::parse)
        .unwrap_or(ScenarioId::Baseline);
    let mut state = PlantState::new(scenario);

    state.clock.minute = f.u64("minute", 0);
    state.clock.running = f.bool("running", true);
    state.clock.set_speed(f.f64("speed", 1.0));
    state.clock.accumulator = 0.0;
    state.clock.step_requested = false;

    state.params = read_params(&f.obj("params"));
    state.units = read_units(f.list("units"));
    state.overrides = read_overrides(&f.obj("overrides"));
    state.boosts = read_boosts(&f.obj("boosts"));
    state.emergency_shutdown = f.bool("emergency_shutdown", false);
    state.crude_target = f.non_negative("crude_target", 0.0);
    state.flows = read_flows(&f.obj("flows"));
    state.production = read_production(&f.obj("production"));
    state.strain = f.f64_in("strain", 0.0, 0.0, STRAIN_MAX);
    state.incident_pressure = f.ratio("incident_pressure", 0.0);
    state.total_incidents = f.u32("total_incidents", 0);
    state.storage = read_storage(&f.obj("storage"));
    state.tank_activity = read_tank_activity(&f.obj("tank_activity"));
    state.logistics = read_logistics(&f.obj("logistics"));
    state.market = read_market(&f.obj("market"), &state.market);
    state.environment = read_environment(&f.obj("environment"), &scenario.def());
    state.ledger = read_ledger(&f.obj("ledger"));
    state.directives = read_directives(&f.obj("directives"));
    state.scorecard = read_scorecard(&f.obj("scorecard"));
    state.recorder = read_recorder(&f.obj("recorder"));

    let history = f
        .list("history")
        .iter()
        .map(|v| read_history_sample(&Fields::of(Some(v))))
        .collect();
    state.history.restore(constants.history_capacity, history);
    let logs = f
        .list("logs")
        .iter()
        .filter_map(|v| read_log_entry(&Fields::of(Some(v))))
        .collect();
    state.log.restore(constants.log_capacity, logs);
    state
}

fn read_params(f: &Fields<'_>) -> Parameters {
    let mut params = Parameters::default();
    for param in Param::ALL {
        if let Some(value) = f.opt_f64(param.as_str()) {
            params.set(param, value);
        }
    }
    params
}

fn read_units(entries: &[Value]) -> UnitRegistry {
    let mut units = UnitRegistry::new();
    for entry in entries {
        let f = Fields::of(Some(entry));
        let Some(id) = f.str("id").and_then(UnitId::parse) else {
            continue;
        };
        let unit = units.get_mut(id);
        unit.throughput = f.non_negative("throughput", 0.0);
        unit.utilization = f.f64_in("utilization", 0.0, 0.0, MAX_UTILIZATION);
        unit.integrity = f.ratio("integrity", 1.0);
        unit.downtime = f.non_negative("downtime", 0.0);
        unit.status = f
            .str("status")
            .and_then(UnitStatus::parse)
            .unwrap_or(UnitStatus::Online);
        unit.incidents = f.u32("incidents", 0);
        unit.override_throttle = f
            .opt_f64("override_throttle")
            .map(|t| t.clamp(0.0, MAX_THROTTLE));
        unit.turnaround = f.bool("turnaround", false) && unit.status == UnitStatus::Offline;
        unit.inspection_cooldown = f.non_negative("inspection_cooldown", 0.0);
    }
    units
}

fn read_overrides(f: &Fields<'_>) -> BTreeMap<UnitId, UnitOverride> {
    let mut overrides = BTreeMap::new();
    for id in UnitId::ALL {
        let entry = f.obj(id.as_str());
        if entry.0.is_none() {
            continue;
        }
        let value = UnitOverride {
            throttle: entry.opt_f64("throttle").map(|t| t.clamp(0.0, MAX_THROTTLE)),
            offline: entry.bool("offline", false),
        };
        if !value.is_empty() {
            overrides.insert(id, value);
        }
    }
    overrides
}

fn read_boosts(f: &Fields<'_>) -> BTreeMap<Stream, PipelineBoost> {
    let mut boosts = BTreeMap::new();
    for stream in Stream::ALL {
        let entry = f.obj(stream.as_str());
        let (Some(multiplier), Some(expires_at)) = (
            entry.opt_f64("multiplier"),
            entry.get("expires_at").and_then(Value::as_u64),
        ) else {
            continue;
        };
        boosts.insert(
            stream,
            PipelineBoost {
                multiplier: multiplier.clamp(0.0, 3.0),
                expires_at,
            },
        );
    }
    boosts
}

fn read_flows(f: &Fields<'_>) -> StreamFlows {
    let mut flows = StreamFlows::default();
    for stream in Stream::ALL {
        flows.set(stream, f.non_negative(stream.as_str(), 0.0));
    }
    flows
}

fn read_production(f: &Fields<'_>) -> ProductionRates {
    ProductionRates {
        crude: f.non_negative("crude", 0.0),
        gasoline: f.non_negative("gasoline", 0.0),
        diesel: f.non_negative("diesel", 0.0),
        jet: f.non_negative("jet", 0.0),
        lpg: f.non_negative("lpg", 0.0),
        waste: f.non_negative("waste", 0.0),
        hydrogen: f.non_negative("hydrogen", 0.0),
        flare: f.non_negative("flare", 0.0),
        sulfur: f.non_negative("sulfur", 0.0),
    }
}

fn read_storage(f: &Fields<'_>) -> StorageState {
    let fresh = StorageState::default();
    let tanks_section = f.obj("tanks");
    let tanks = fresh.tanks.map(|p, default| {
        let t = tanks_section.obj(p.as_str());
        let capacity = t.f64("capacity", default.capacity).max(1.0);
        Tank {
            capacity,
            level: t.f64_in("level", default.level.min(capacity), 0.0, capacity),
        }
    });
    let p = f.obj("pressure");
    let default_pressure = StoragePressure::default();
    StorageState {
        tanks,
        pressure: StoragePressure {
            active: p.bool("active", false),
            throttle: p.f64_in(
                "throttle",
                default_pressure.throttle,
                MIN_PRESSURE_THROTTLE,
                1.0,
            ),
            timer: p.non_negative("timer", 0.0),
        },
        upgrades: f.u32("upgrades", 0).min(MAX_UPGRADES),
    }
}

fn read_tank_activity(f: &Fields<'_>) -> TankActivity {
    let zero = PerProduct::default();
    TankActivity {
        rack_sales: f.per_product("rack_sales", zero, 0.0, f64::MAX),
        shipped: f.per_product("shipped", zero, 0.0, f64::MAX),
        shortage: f.per_product("shortage", zero, 0.0, f64::MAX),
        overflow: f.per_product("overflow", zero, 0.0, f64::MAX),
    }
}

fn read_shipment(f: &Fields<'_>) -> Option<Shipment> {
    let id = f.str("id")?;
    let product = f.str("product").and_then(Product::parse)?;
    Some(Shipment {
        id: ShipmentId(id.to_string()),
        product,
        volume: f.non_negative("volume", 0.0),
        window: f.non_negative("window", 0.0),
        due_in: f.non_negative("due_in", 0.0),
        status: f
            .str("status")
            .and_then(ShipmentStatus::parse)
            .unwrap_or(ShipmentStatus::Pending),
        created_at: f.u64("created_at", 0),
        cooldown: f.non_negative("cooldown", 0.0),
        rush: f.bool("rush", false),
        delivered: f.non_negative("delivered", 0.0),
    })
}

fn read_logistics(f: &Fields<'_>) -> LogisticsState {
    let shipments: Vec<Shipment> = f
        .list("shipments")
        .iter()
        .filter_map(|v| read_shipment(&Fields::of(Some(v))))
        .collect();
    let highest = shipments.iter().map(|s| id_seq(&s.id.0)).max().unwrap_or(0);
    let stats = f.obj("stats");
    let cooldowns = f.obj("cooldowns");
    LogisticsState {
        stats: ShipmentStats {
            completed: stats.u32("completed", 0),
            missed: stats.u32("missed", 0),
            delivered_volume: stats.non_negative("delivered_volume", 0.0),
            missed_volume: stats.non_negative("missed_volume", 0.0),
            penalty_total: stats.non_negative("penalty_total", 0.0),
        },
        cooldowns: LogisticsCooldowns {
            convoy: cooldowns.non_negative("convoy", 0.0),
            delay: cooldowns.non_negative("delay", 0.0),
            charter: cooldowns.non_negative("charter", 0.0),
            expansion: cooldowns.non_negative("expansion", 0.0),
        },
        hours_since_last: f.per_product("hours_since_last", PerProduct::default(), 0.0, f64::MAX),
        next_shipment_seq: f.u64("next_shipment_seq", 0).max(highest),
        shipments,
    }
}

fn read_market(f: &Fields<'_>, fresh: &MarketState) -> MarketState {
    let products_section = f.obj("products");
    MarketState {
        products: fresh.products.map(|p, default| {
            let m = products_section.obj(p.as_str());
            let futures = m.non_negative("futures", default.futures);
            let production_cost = m.non_negative("production_cost", default.production_cost);
            ProductMarket {
                futures,
                production_cost,
                basis: m.f64("basis", futures - production_cost),
                drift: m.f64_in("drift", 0.0, -0.5, 0.5),
            }
        }),
        stress: f.f64_in("stress", fresh.stress, MIN_STRESS, MAX_STRESS),
        crude_cost: f.non_negative("crude_cost", fresh.crude_cost),
    }
}

fn read_environment(f: &Fields<'_>, def: &crate::ScenarioDef) -> EnvironmentState {
    EnvironmentState {
        carbon: f.non_negative("carbon", 0.0),
        limit: f.non_negative("limit", carbon_limit(def.environment_pressure)),
        over_limit: f.bool("over_limit", false),
        total_emitted: f.non_negative("total_emitted", 0.0),
    }
}

fn read_ledger(f: &Fields<'_>) -> Ledger {
    let mut ledger = Ledger {
        cumulative_revenue: f.f64("cumulative_revenue", 0.0),
        cumulative_cost: f.f64("cumulative_cost", 0.0),
        cumulative_penalty: f.f64("cumulative_penalty", 0.0),
        action_spend: f.non_negative("action_spend", 0.0),
        window: read_rate_window(&f.obj("window")),
        ..Ledger::default()
    };
    ledger.refresh_rates();
    ledger
}

fn read_rate_window(f: &Fields<'_>) -> RateWindow {
    let hours = f.list("hours");
    let skip = hours.len().saturating_sub(RATE_WINDOW_HOURS);
    let mut current = read_cash_totals(&f.obj("current"));
    current.minutes = current.minutes.min(59);
    RateWindow {
        hours: hours[skip..]
            .iter()
            .map(|hour| read_cash_totals(&Fields::of(Some(hour))))
            .filter(|hour| hour.minutes > 0)
            .collect(),
        current,
    }
}

fn read_cash_totals(f: &Fields<'_>) -> CashTotals {
    CashTotals {
        revenue: f.f64("revenue", 0.0),
        cost: f.f64("cost", 0.0),
        penalty: f.f64("penalty", 0.0),
        minutes: f.u32("minutes", 0).min(60),
    }
}

fn read_directive(f: &Fields<'_>) -> Option<Directive> {
    let id = f.str("id")?;
    let kind = f.str("kind").and_then(DirectiveKind::parse)?;
    let duration = f.non_negative("duration", 0.0);
    Some(Directive {
        id: DirectiveId(id.to_string()),
        kind,
        title: f.string("title", "Directive"),
        description: f.string("description", ""),
        threshold: f.non_negative("threshold", 0.0),
        target: f.non_negative("target", 0.0),
        product: f.str("product").and_then(Product::parse),
        allowance: f.non_negative("allowance", 0.0),
        duration,
        time_remaining: f.f64_in("time_remaining", duration, 0.0, duration),
        status: f
            .str("status")
            .and_then(DirectiveStatus::parse)
            .unwrap_or(DirectiveStatus::Active),
        progress: f.ratio("progress", 0.0),
        delivered: f.non_negative("delivered", 0.0),
        breach: f.non_negative("breach", 0.0),
        cooldown: f.non_negative("cooldown", 0.0),
    })
}

fn read_directives(f: &Fields<'_>) -> DirectiveState {
    let directives: Vec<Directive> = f
        .list("directives")
        .iter()
        .filter_map(|v| read_directive(&Fields::of(Some(v))))
        .collect();
    let highest = directives.iter().map(|d| id_seq(&d.id.0)).max().unwrap_or(0);
    let stats = f.obj("stats");
    DirectiveState {
        directives,
        stats: DirectiveStats {
            completed: stats.u32("completed", 0),
            failed: stats.u32("failed", 0),
        },
        next_directive_seq: f.u64("next_directive_seq", 0).max(highest),
    }
}

fn read_scorecard(f: &Fields<'_>) -> Scorecard {
    let fresh = Scorecard::default();
    let score = f.f64_in("score", fresh.score, 0.0, 100.0);
    let sub = f.obj("sub_scores");
    Scorecard {
        score,
        grade: Grade::from_score(score),
        note: f.string("note", &fresh.note),
        sub_scores: SubScores {
            throughput: sub.ratio("throughput", 0.0),
            profit: sub.ratio("profit", 0.0),
            reliability: sub.ratio("reliability", 0.0),
            carbon: sub.ratio("carbon", 0.0),
            incidents: sub.ratio("incidents", 0.0),
            shipments: sub.ratio("shipments", 0.0),
            directives: sub.ratio("directives", 0.0),
            strain: sub.ratio("strain", 0.0),
        },
        trend: f.f64("trend", 0.0),
    }
}

fn read_recorder(f: &Fields<'_>) -> Recorder {
    Recorder {
        active: f.bool("active", false),
        started_at: f.u64("started_at", 0),
        elapsed_hours: f.non_negative("elapsed_hours", 0.0),
        production: f.non_negative("production", 0.0),
        profit: f.f64("profit", 0.0),
        penalty: f.non_negative("penalty", 0.0),
        incidents: f.u32("incidents", 0),
        reliability_hours: f.non_negative("reliability_hours", 0.0),
        carbon: f.non_negative("carbon", 0.0),
        shipments_completed: f.u32("shipments_completed", 0),
        shipments_missed: f.u32("shipments_missed", 0),
    }
}

fn read_history_sample(f: &Fields<'_>) -> HistorySample {
    HistorySample {
        minute: f.u64("minute", 0),
        score: f.f64_in("score", 0.0, 0.0, 100.0),
        profit_per_day: f.f64("profit_per_day", 0.0),
        reliability: f.ratio("reliability", 0.0),
        carbon: f.non_negative("carbon", 0.0),
        output: f.non_negative("output", 0.0),
    }
}

fn read_log_entry(f: &Fields<'_>) -> Option<LogEntry> {
    Some(LogEntry {
        minute: f.u64("minute", 0),
        level: f
            .str("level")
            .and_then(LogLevel::parse)
            .unwrap_or(LogLevel::Info),
        message: f.str("message")?.to_string(),
    })
}
