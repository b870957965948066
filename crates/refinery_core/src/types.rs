//! Type definitions for `refinery_core`.
//!
//! Closed enums for every id the host can name (products, units, streams,
//! parameters) plus the plain records that make up plant state.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ShipmentId);
string_id!(DirectiveId);

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Gasoline,
    Diesel,
    Jet,
    Lpg,
}

impl Product {
    pub const ALL: [Product; 4] = [
        Product::Gasoline,
        Product::Diesel,
        Product::Jet,
        Product::Lpg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Product::Gasoline => "gasoline",
            Product::Diesel => "diesel",
            Product::Jet => "jet",
            Product::Lpg => "lpg",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Product::Gasoline => "Gasoline",
            Product::Diesel => "Diesel",
            Product::Jet => "Jet fuel",
            Product::Lpg => "LPG",
        }
    }

    pub fn parse(key: &str) -> Option<Product> {
        Product::ALL.into_iter().find(|p| p.as_str() == key)
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per product. Serializes as an object keyed by product name.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerProduct<T> {
    pub gasoline: T,
    pub diesel: T,
    pub jet: T,
    pub lpg: T,
}

impl<T> PerProduct<T> {
    pub fn from_fn(mut f: impl FnMut(Product) -> T) -> Self {
        Self {
            gasoline: f(Product::Gasoline),
            diesel: f(Product::Diesel),
            jet: f(Product::Jet),
            lpg: f(Product::Lpg),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Product, &T)> {
        Product::ALL.into_iter().map(move |p| (p, &self[p]))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Product, &T) -> U) -> PerProduct<U> {
        PerProduct::from_fn(|p| f(p, &self[p]))
    }
}

impl<T> Index<Product> for PerProduct<T> {
    type Output = T;

    fn index(&self, product: Product) -> &T {
        match product {
            Product::Gasoline => &self.gasoline,
            Product::Diesel => &self.diesel,
            Product::Jet => &self.jet,
            Product::Lpg => &self.lpg,
        }
    }
}

impl<T> IndexMut<Product> for PerProduct<T> {
    fn index_mut(&mut self, product: Product) -> &mut T {
        match product {
            Product::Gasoline => &mut self.gasoline,
            Product::Diesel => &mut self.diesel,
            Product::Jet => &mut self.jet,
            Product::Lpg => &mut self.lpg,
        }
    }
}

// ---------------------------------------------------------------------------
// Process units
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitId {
    Distillation,
    Reformer,
    Fcc,
    Hydrocracker,
    Alkylation,
    Sulfur,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Separation,
    Conversion,
    Upgrading,
    Treating,
}

impl UnitId {
    pub const ALL: [UnitId; 6] = [
        UnitId::Distillation,
        UnitId::Reformer,
        UnitId::Fcc,
        UnitId::Hydrocracker,
        UnitId::Alkylation,
        UnitId::Sulfur,
    ];

    pub fn index(self) -> usize {
        match self {
            UnitId::Distillation => 0,
            UnitId::Reformer => 1,
            UnitId::Fcc => 2,
            UnitId::Hydrocracker => 3,
            UnitId::Alkylation => 4,
            UnitId::Sulfur => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitId::Distillation => "distillation",
            UnitId::Reformer => "reformer",
            UnitId::Fcc => "fcc",
            UnitId::Hydrocracker => "hydrocracker",
            UnitId::Alkylation => "alkylation",
            UnitId::Sulfur => "sulfur",
        }
    }

    pub fn parse(key: &str) -> Option<UnitId> {
        UnitId::ALL.into_iter().find(|u| u.as_str() == key)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            UnitId::Distillation => "Crude Distillation",
            UnitId::Reformer => "Catalytic Reformer",
            UnitId::Fcc => "Fluid Catalytic Cracker",
            UnitId::Hydrocracker => "Hydrocracker",
            UnitId::Alkylation => "Alkylation Unit",
            UnitId::Sulfur => "Sulfur Recovery",
        }
    }

    /// Nameplate capacity in kbpd.
    pub fn capacity(self) -> f64 {
        match self {
            UnitId::Distillation => 180.0,
            UnitId::Reformer => 42.0,
            UnitId::Fcc => 58.0,
            UnitId::Hydrocracker => 40.0,
            UnitId::Alkylation => 10.0,
            UnitId::Sulfur => 34.0,
        }
    }

    pub fn category(self) -> UnitCategory {
        match self {
            UnitId::Distillation => UnitCategory::Separation,
            UnitId::Reformer | UnitId::Fcc | UnitId::Hydrocracker => UnitCategory::Conversion,
            UnitId::Alkylation => UnitCategory::Upgrading,
            UnitId::Sulfur => UnitCategory::Treating,
        }
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Online,
    Standby,
    Offline,
}

impl UnitStatus {
    pub fn parse(key: &str) -> Option<UnitStatus> {
        match key {
            "online" => Some(UnitStatus::Online),
            "standby" => Some(UnitStatus::Standby),
            "offline" => Some(UnitStatus::Offline),
            _ => None,
        }
    }
}

/// Display label derived from status, throttle, load and integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitMode {
    Nominal,
    Idle,
    Throttled,
    Overdrive,
    Degraded,
    Standby,
    Emergency,
    Turnaround,
    Tripped,
}

impl UnitMode {
    pub fn label(self) -> &'static str {
        match self {
            UnitMode::Nominal => "Nominal",
            UnitMode::Idle => "Idle",
            UnitMode::Throttled => "Throttled",
            UnitMode::Overdrive => "Overdrive",
            UnitMode::Degraded => "Degraded",
            UnitMode::Standby => "Manual standby",
            UnitMode::Emergency => "Emergency shutdown",
            UnitMode::Turnaround => "Turnaround",
            UnitMode::Tripped => "Tripped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub name: String,
    pub capacity: f64,
    pub category: UnitCategory,
    /// Current feed rate, kbpd.
    pub throughput: f64,
    pub utilization: f64,
    pub integrity: f64,
    /// Remaining downtime while offline, simulated minutes.
    pub downtime: f64,
    pub status: UnitStatus,
    pub mode: UnitMode,
    pub incidents: u32,
    pub alert: Option<AlertLevel>,
    pub alert_detail: Option<String>,
    pub override_throttle: Option<f64>,
    /// Set while a planned turnaround is running; recovery restores full integrity.
    pub turnaround: bool,
    /// Minutes until another inspection is allowed.
    pub inspection_cooldown: f64,
}

impl Unit {
    pub fn new(id: UnitId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            capacity: id.capacity(),
            category: id.category(),
            throughput: 0.0,
            utilization: 0.0,
            integrity: 1.0,
            downtime: 0.0,
            status: UnitStatus::Online,
            mode: UnitMode::Idle,
            incidents: 0,
            alert: None,
            alert_detail: None,
            override_throttle: None,
            turnaround: false,
            inspection_cooldown: 0.0,
        }
    }
}

/// Operator intent for one unit. Absence from the override map means automatic control.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UnitOverride {
    pub throttle: Option<f64>,
    pub offline: bool,
}

impl UnitOverride {
    pub fn is_empty(&self) -> bool {
        self.throttle.is_none() && !self.offline
    }
}

/// All six units in `UnitId::ALL` order. Only constructible complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UnitRegistry(Vec<Unit>);

impl UnitRegistry {
    pub fn new() -> Self {
        Self(UnitId::ALL.into_iter().map(Unit::new).collect())
    }

    pub fn get(&self, id: UnitId) -> &Unit {
        &self.0[id.index()]
    }

    pub fn get_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.0[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.0.iter_mut()
    }

    pub fn to_vec(&self) -> Vec<Unit> {
        self.0.clone()
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Streams
// ---------------------------------------------------------------------------

/// The five inter-unit pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    NaphthaReformer,
    HeavyFcc,
    GasoilHydrocracker,
    LpgAlkylation,
    ResidSulfur,
}

impl Stream {
    pub const ALL: [Stream; 5] = [
        Stream::NaphthaReformer,
        Stream::HeavyFcc,
        Stream::GasoilHydrocracker,
        Stream::LpgAlkylation,
        Stream::ResidSulfur,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stream::NaphthaReformer => "naphtha_reformer",
            Stream::HeavyFcc => "heavy_fcc",
            Stream::GasoilHydrocracker => "gasoil_hydrocracker",
            Stream::LpgAlkylation => "lpg_alkylation",
            Stream::ResidSulfur => "resid_sulfur",
        }
    }

    pub fn parse(key: &str) -> Option<Stream> {
        Stream::ALL.into_iter().find(|s| s.as_str() == key)
    }

    pub fn source(self) -> UnitId {
        match self {
            Stream::LpgAlkylation => UnitId::Fcc,
            Stream::NaphthaReformer
            | Stream::HeavyFcc
            | Stream::GasoilHydrocracker
            | Stream::ResidSulfur => UnitId::Distillation,
        }
    }

    pub fn target(self) -> UnitId {
        match self {
            Stream::NaphthaReformer => UnitId::Reformer,
            Stream::HeavyFcc => UnitId::Fcc,
            Stream::GasoilHydrocracker => UnitId::Hydrocracker,
            Stream::LpgAlkylation => UnitId::Alkylation,
            Stream::ResidSulfur => UnitId::Sulfur,
        }
    }

    /// Nominal pipeline capacity in kbpd, before any bypass boost.
    pub fn nominal_capacity(self) -> f64 {
        match self {
            Stream::NaphthaReformer => 48.0,
            Stream::HeavyFcc => 64.0,
            Stream::GasoilHydrocracker => 46.0,
            Stream::LpgAlkylation => 12.0,
            Stream::ResidSulfur => 38.0,
        }
    }

    /// The stream that feeds `unit`, if any. Distillation takes crude directly.
    pub fn feeding(unit: UnitId) -> Option<Stream> {
        Stream::ALL.into_iter().find(|s| s.target() == unit)
    }
}

/// Temporary capacity multiplier on one stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineBoost {
    pub multiplier: f64,
    /// Simulated minute at which the boost lapses.
    pub expires_at: u64,
}

/// Rate on each pipeline, kbpd.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamFlows {
    pub naphtha_reformer: f64,
    pub heavy_fcc: f64,
    pub gasoil_hydrocracker: f64,
    pub lpg_alkylation: f64,
    pub resid_sulfur: f64,
}

impl StreamFlows {
    pub fn get(&self, stream: Stream) -> f64 {
        match stream {
            Stream::NaphthaReformer => self.naphtha_reformer,
            Stream::HeavyFcc => self.heavy_fcc,
            Stream::GasoilHydrocracker => self.gasoil_hydrocracker,
            Stream::LpgAlkylation => self.lpg_alkylation,
            Stream::ResidSulfur => self.resid_sulfur,
        }
    }

    pub fn set(&mut self, stream: Stream, value: f64) {
        let slot = match stream {
            Stream::NaphthaReformer => &mut self.naphtha_reformer,
            Stream::HeavyFcc => &mut self.heavy_fcc,
            Stream::GasoilHydrocracker => &mut self.gasoil_hydrocracker,
            Stream::LpgAlkylation => &mut self.lpg_alkylation,
            Stream::ResidSulfur => &mut self.resid_sulfur,
        };
        *slot = value;
    }
}

/// Plant output of the last tick, kbpd.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductionRates {
    pub crude: f64,
    pub gasoline: f64,
    pub diesel: f64,
    pub jet: f64,
    pub lpg: f64,
    pub waste: f64,
    pub hydrogen: f64,
    /// Portion of `waste` flared because of strain or degraded units.
    pub flare: f64,
    pub sulfur: f64,
}

impl ProductionRates {
    pub fn product(&self, product: Product) -> f64 {
        match product {
            Product::Gasoline => self.gasoline,
            Product::Diesel => self.diesel,
            Product::Jet => self.jet,
            Product::Lpg => self.lpg,
        }
    }

    pub fn liquids(&self) -> f64 {
        self.gasoline + self.diesel + self.jet
    }
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    CrudeIntake,
    ProductFocus,
    Maintenance,
    Safety,
    Environment,
}

impl Param {
    pub const ALL: [Param; 5] = [
        Param::CrudeIntake,
        Param::ProductFocus,
        Param::Maintenance,
        Param::Safety,
        Param::Environment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Param::CrudeIntake => "crude_intake",
            Param::ProductFocus => "product_focus",
            Param::Maintenance => "maintenance",
            Param::Safety => "safety",
            Param::Environment => "environment",
        }
    }

    /// Accepts snake_case and the camelCase spellings hosts tend to send.
    pub fn parse(key: &str) -> Option<Param> {
        match key {
            "crude_intake" | "crudeIntake" => Some(Param::CrudeIntake),
            "product_focus" | "productFocus" => Some(Param::ProductFocus),
            "maintenance" => Some(Param::Maintenance),
            "safety" => Some(Param::Safety),
            "environment" => Some(Param::Environment),
            _ => None,
        }
    }

    pub fn range(self) -> (f64, f64) {
        match self {
            Param::CrudeIntake => (40.0, 220.0),
            Param::ProductFocus | Param::Maintenance | Param::Safety | Param::Environment => {
                (0.0, 1.0)
            }
        }
    }

    pub fn clamp(self, value: f64) -> f64 {
        let (lo, hi) = self.range();
        value.clamp(lo, hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// kbpd.
    pub crude_intake: f64,
    /// 0 = diesel-heavy, 1 = gasoline-heavy.
    pub product_focus: f64,
    pub maintenance: f64,
    pub safety: f64,
    pub environment: f64,
}

impl Parameters {
    pub fn get(&self, param: Param) -> f64 {
        match param {
            Param::CrudeIntake => self.crude_intake,
            Param::ProductFocus => self.product_focus,
            Param::Maintenance => self.maintenance,
            Param::Safety => self.safety,
            Param::Environment => self.environment,
        }
    }

    pub fn set(&mut self, param: Param, value: f64) {
        let value = param.clamp(value);
        match param {
            Param::CrudeIntake => self.crude_intake = value,
            Param::ProductFocus => self.product_focus = value,
            Param::Maintenance => self.maintenance = value,
            Param::Safety => self.safety = value,
            Param::Environment => self.environment = value,
        }
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            crude_intake: 140.0,
            product_focus: 0.5,
            maintenance: 0.6,
            safety: 0.55,
            environment: 0.45,
        }
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Danger,
}

impl LogLevel {
    pub fn parse(key: &str) -> Option<LogLevel> {
        match key {
            "info" => Some(LogLevel::Info),
            "warning" => Some(LogLevel::Warning),
            "danger" => Some(LogLevel::Danger),
            _ => None,
        }
    }
}

/// Clamp helper that also maps NaN to the lower bound.
pub(crate) fn clamp_finite(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}
