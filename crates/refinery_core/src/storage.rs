//! Product tanks, rack demand draw, and the storage-pressure intake controller.

use serde::{Deserialize, Serialize};

use crate::types::clamp_finite;
use crate::{PerProduct, Product, ProductionRates, ScenarioDef};

pub const MINUTES_PER_DAY: f64 = 1440.0;
/// Share of modeled demand drawn by the truck rack; the rest leaves by shipment.
pub const RACK_SHARE: f64 = 0.62;
pub const INITIAL_FILL: f64 = 0.45;
pub const PRESSURE_ENGAGE_RATIO: f64 = 0.95;
pub const PRESSURE_RELIEF_RATIO: f64 = 0.86;
pub const MIN_PRESSURE_THROTTLE: f64 = 0.45;
const PRESSURE_HOLD_MINUTES: f64 = 120.0;
const PRESSURE_RECOVERY_STEP: f64 = 0.05;
pub const EXPANSION_FACTOR: f64 = 1.12;
pub const MAX_UPGRADES: u32 = 3;

/// Tank capacity, kbbl.
pub fn base_capacity(product: Product) -> f64 {
    match product {
        Product::Gasoline => 320.0,
        Product::Diesel => 280.0,
        Product::Jet => 160.0,
        Product::Lpg => 60.0,
    }
}

/// Baseline downstream demand, kbpd.
pub fn base_demand(product: Product) -> f64 {
    match product {
        Product::Gasoline => 62.0,
        Product::Diesel => 44.0,
        Product::Jet => 21.0,
        Product::Lpg => 4.0,
    }
}

/// Scenario-biased demand, kbpd.
pub fn demand_rates(scenario: &ScenarioDef) -> PerProduct<f64> {
    PerProduct::from_fn(|p| base_demand(p) * scenario.demand_bias[p].max(0.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub capacity: f64,
    pub level: f64,
}

impl Tank {
    pub fn ratio(&self) -> f64 {
        if self.capacity <= 0.0 {
            0.0
        } else {
            clamp_finite(self.level / self.capacity, 0.0, 1.0)
        }
    }

    /// Add volume; returns the overflow that did not fit.
    pub fn fill(&mut self, volume: f64) -> f64 {
        let room = (self.capacity - self.level).max(0.0);
        let accepted = volume.max(0.0).min(room);
        self.level = clamp_finite(self.level + accepted, 0.0, self.capacity);
        volume.max(0.0) - accepted
    }

    /// Draw up to `volume`; returns what was actually drawn.
    pub fn draw(&mut self, volume: f64) -> f64 {
        let drawn = volume.max(0.0).min(self.level);
        self.level = clamp_finite(self.level - drawn, 0.0, self.capacity);
        drawn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoragePressure {
    pub active: bool,
    /// Multiplier on crude intake, `[0.45, 1]`.
    pub throttle: f64,
    /// Minutes before self-relief may begin.
    pub timer: f64,
}

impl Default for StoragePressure {
    fn default() -> Self {
        Self {
            active: false,
            throttle: 1.0,
            timer: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressureChange {
    Engaged,
    Relieved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    pub tanks: PerProduct<Tank>,
    pub pressure: StoragePressure,
    pub upgrades: u32,
}

impl Default for StorageState {
    fn default() -> Self {
        Self {
            tanks: PerProduct::from_fn(|p| Tank {
                capacity: base_capacity(p),
                level: base_capacity(p) * INITIAL_FILL,
            }),
            pressure: StoragePressure::default(),
            upgrades: 0,
        }
    }
}

/// Volumes moved in one tick, kbbl.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StorageTick {
    pub produced: PerProduct<f64>,
    pub overflow: PerProduct<f64>,
    pub rack_sales: PerProduct<f64>,
    pub shortage: PerProduct<f64>,
}

impl StorageTick {
    pub fn total_shortage(&self) -> f64 {
        self.shortage.iter().map(|(_, v)| *v).sum()
    }
}

impl StorageState {
    pub fn max_ratio(&self) -> f64 {
        self.tanks
            .iter()
            .map(|(_, t)| t.ratio())
            .fold(0.0, f64::max)
    }

    /// Total level over total capacity.
    pub fn overall_ratio(&self) -> f64 {
        let (level, capacity) = self
            .tanks
            .iter()
            .fold((0.0, 0.0), |(l, c), (_, t)| (l + t.level, c + t.capacity));
        if capacity <= 0.0 {
            0.0
        } else {
            clamp_finite(level / capacity, 0.0, 1.0)
        }
    }

    /// Product with the most inventory on hand.
    pub fn fullest(&self) -> (Product, f64) {
        self.tanks
            .iter()
            .map(|(p, t)| (p, t.level))
            .fold((Product::Gasoline, f64::MIN), |best, next| {
                if next.1 > best.1 {
                    next
                } else {
                    best
                }
            })
    }

    /// Add one tick of production, then draw the rack share of demand.
    pub fn apply_tick(
        &mut self,
        production: &ProductionRates,
        demand: &PerProduct<f64>,
    ) -> StorageTick {
        let mut report = StorageTick::default();
        for product in Product::ALL {
            let produced = production.product(product).max(0.0) / MINUTES_PER_DAY;
            let wanted = demand[product].max(0.0) * RACK_SHARE / MINUTES_PER_DAY;
            let tank = &mut self.tanks[product];
            report.produced[product] = produced;
            report.overflow[product] = tank.fill(produced);
            let drawn = tank.draw(wanted);
            report.rack_sales[product] = drawn;
            report.shortage[product] = wanted - drawn;
        }
        report
    }

    /// Hysteretic intake throttle driven by the fullest tank.
    pub fn update_pressure(&mut self) -> Option<PressureChange> {
        let ratio = self.max_ratio();
        let pressure = &mut self.pressure;
        if ratio >= PRESSURE_ENGAGE_RATIO {
            let target = clamp_finite(1.0 - (ratio - 0.9) * 5.0, MIN_PRESSURE_THROTTLE, 1.0);
            let engaged = !pressure.active;
            pressure.active = true;
            pressure.timer = PRESSURE_HOLD_MINUTES;
            pressure.throttle = pressure.throttle.min(target);
            return engaged.then_some(PressureChange::Engaged);
        }
        if !pressure.active {
            return None;
        }
        pressure.timer = (pressure.timer - 1.0).max(0.0);
        if pressure.timer <= 0.0 && ratio < PRESSURE_RELIEF_RATIO {
            pressure.throttle = (pressure.throttle + PRESSURE_RECOVERY_STEP).min(1.0);
            if pressure.throttle >= 1.0 {
                *pressure = StoragePressure::default();
                return Some(PressureChange::Relieved);
            }
        }
        None
    }

    /// Immediate relief from a delivery action.
    pub fn relieve(&mut self, amount: f64) {
        let pressure = &mut self.pressure;
        pressure.timer = 0.0;
        pressure.throttle = clamp_finite(pressure.throttle + amount, MIN_PRESSURE_THROTTLE, 1.0);
        if pressure.throttle >= 1.0 {
            *pressure = StoragePressure::default();
        }
    }

    /// Grow every tank by the expansion factor.
    pub fn expand(&mut self) {
        for product in Product::ALL {
            let tank = &mut self.tanks[product];
            tank.capacity *= EXPANSION_FACTOR;
        }
        self.upgrades += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_and_draw_respect_bounds() {
        let mut tank = Tank {
            capacity: 10.0,
            level: 9.0,
        };
        assert!((tank.fill(3.0) - 2.0).abs() < 1e-12);
        assert!((tank.level - 10.0).abs() < 1e-12);
        assert!((tank.draw(15.0) - 10.0).abs() < 1e-12);
        assert!(tank.level.abs() < 1e-12);
    }

    #[test]
    fn shortage_tracked_when_empty() {
        let mut storage = StorageState::default();
        storage.tanks.jet.level = 0.0;
        let demand = PerProduct::from_fn(base_demand);
        let report = storage.apply_tick(&ProductionRates::default(), &demand);
        let expected = 21.0 * RACK_SHARE / MINUTES_PER_DAY;
        assert!((report.shortage.jet - expected).abs() < 1e-12);
        assert!(report.shortage.gasoline.abs() < 1e-12);
    }

    #[test]
    fn pressure_engages_at_ninety_five_percent() {
        let mut storage = StorageState::default();
        storage.tanks.lpg.level = storage.tanks.lpg.capacity;
        assert_eq!(storage.update_pressure(), Some(PressureChange::Engaged));
        assert!(storage.pressure.active);
        assert!((storage.pressure.throttle - 0.5).abs() < 1e-12);
        // Re-engaging while active is silent.
        assert_eq!(storage.update_pressure(), None);
    }

    #[test]
    fn pressure_relieves_after_hold_and_drain() {
        let mut storage = StorageState::default();
        storage.tanks.lpg.level = storage.tanks.lpg.capacity;
        storage.update_pressure();
        storage.tanks.lpg.level = storage.tanks.lpg.capacity * 0.5;
        let mut relieved_after = None;
        for tick in 0..400 {
            if storage.update_pressure() == Some(PressureChange::Relieved) {
                relieved_after = Some(tick);
                break;
            }
        }
        let ticks = relieved_after.unwrap();
        assert!(ticks >= 120 && ticks < 140, "relieved after {ticks}");
        assert!((storage.pressure.throttle - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pressure_holds_between_thresholds() {
        let mut storage = StorageState::default();
        storage.tanks.lpg.level = storage.tanks.lpg.capacity;
        storage.update_pressure();
        storage.tanks.lpg.level = storage.tanks.lpg.capacity * 0.9;
        for _ in 0..500 {
            storage.update_pressure();
        }
        assert!(storage.pressure.active);
        assert!(storage.pressure.throttle < 1.0);
    }

    #[test]
    fn relief_action_lifts_throttle() {
        let mut storage = StorageState::default();
        storage.pressure = StoragePressure {
            active: true,
            throttle: 0.6,
            timer: 100.0,
        };
        storage.relieve(0.15);
        assert!((storage.pressure.throttle - 0.75).abs() < 1e-12);
        assert!(storage.pressure.timer.abs() < 1e-12);
    }

    #[test]
    fn expansion_grows_capacity_only() {
        let mut storage = StorageState::default();
        let before = storage.tanks.diesel;
        storage.expand();
        assert!((storage.tanks.diesel.capacity - before.capacity * 1.12).abs() < 1e-9);
        assert!((storage.tanks.diesel.level - before.level).abs() < 1e-12);
        assert_eq!(storage.upgrades, 1);
    }

    #[test]
    fn fullest_picks_largest_level() {
        let storage = StorageState::default();
        assert_eq!(storage.fullest().0, Product::Gasoline);
    }
}
