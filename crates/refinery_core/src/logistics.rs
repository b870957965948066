//! Dock shipments: the autonomous planner, countdown, and resolution.
//!
//! A shipment is created pending, counts `due_in` down by one simulated
//! minute per tick, resolves exactly once to completed or missed, then
//! lingers for its cooldown before being pruned.

use serde::{Deserialize, Serialize};

use crate::rng::{roll, RandomSource, RollSite};
use crate::storage::{StorageState, RACK_SHARE};
use crate::{Constants, PerProduct, Product, ShipmentId};

const DUE_EPSILON: f64 = 1e-6;
pub const MISSED_PENALTY_SHARE: f64 = 0.6;
const EXPORT_SHARE: f64 = 1.0 - RACK_SHARE;
const MIN_INTERVAL_HOURS: f64 = 3.0;
const MAX_INTERVAL_HOURS: f64 = 18.0;
const MIN_PRODUCT_RATIO: f64 = 0.18;
const MIN_OVERALL_RATIO: f64 = 0.15;
const MIN_WINDOW_HOURS: f64 = 4.0;
const WINDOW_SPREAD_HOURS: f64 = 4.0;

/// Typical cargo per product, kbbl.
pub fn nominal_volume(product: Product) -> f64 {
    match product {
        Product::Gasoline => 16.0,
        Product::Diesel => 12.0,
        Product::Jet => 6.0,
        Product::Lpg => 1.5,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentStatus {
    Pending,
    Completed,
    Missed,
}

impl ShipmentStatus {
    pub fn parse(key: &str) -> Option<ShipmentStatus> {
        match key {
            "pending" => Some(ShipmentStatus::Pending),
            "completed" => Some(ShipmentStatus::Completed),
            "missed" => Some(ShipmentStatus::Missed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub product: Product,
    /// kbbl.
    pub volume: f64,
    /// Transit window, hours. Consumed by delays.
    pub window: f64,
    /// Hours until the ship sails.
    pub due_in: f64,
    pub status: ShipmentStatus,
    /// Simulated minute of creation.
    pub created_at: u64,
    /// Minutes the resolved shipment stays visible.
    pub cooldown: f64,
    /// Created by an operator action rather than the planner.
    pub rush: bool,
    /// Volume actually loaded on resolution.
    pub delivered: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ShipmentStats {
    pub completed: u32,
    pub missed: u32,
    pub delivered_volume: f64,
    pub missed_volume: f64,
    pub penalty_total: f64,
}

impl ShipmentStats {
    /// Completed over resolved; 1.0 before anything has resolved.
    pub fn reliability(&self) -> f64 {
        let resolved = self.completed + self.missed;
        if resolved == 0 {
            1.0
        } else {
            f64::from(self.completed) / f64::from(resolved)
        }
    }
}

/// Remaining minutes on each one-shot logistics action.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LogisticsCooldowns {
    pub convoy: f64,
    pub delay: f64,
    pub charter: f64,
    pub expansion: f64,
}

impl LogisticsCooldowns {
    fn tick(&mut self) {
        for value in [
            &mut self.convoy,
            &mut self.delay,
            &mut self.charter,
            &mut self.expansion,
        ] {
            *value = (*value - 1.0).max(0.0);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogisticsState {
    pub shipments: Vec<Shipment>,
    pub stats: ShipmentStats,
    pub cooldowns: LogisticsCooldowns,
    /// Hours since the planner last created a shipment of each product.
    pub hours_since_last: PerProduct<f64>,
    pub next_shipment_seq: u64,
}

/// One shipment resolving this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentOutcome {
    pub id: ShipmentId,
    pub product: Product,
    pub volume: f64,
    pub delivered: f64,
    pub status: ShipmentStatus,
    /// Dollars.
    pub penalty: f64,
}

impl LogisticsState {
    pub fn pending(&self) -> impl Iterator<Item = &Shipment> {
        self.shipments
            .iter()
            .filter(|s| s.status == ShipmentStatus::Pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Earliest pending shipment, by due time.
    pub fn next_pending_mut(&mut self) -> Option<&mut Shipment> {
        self.shipments
            .iter_mut()
            .filter(|s| s.status == ShipmentStatus::Pending)
            .min_by(|a, b| a.due_in.total_cmp(&b.due_in))
    }

    fn next_id(&mut self) -> ShipmentId {
        self.next_shipment_seq += 1;
        ShipmentId(format!("shp_{:04}", self.next_shipment_seq))
    }

    pub(crate) fn create(
        &mut self,
        product: Product,
        volume: f64,
        window: f64,
        due_in: f64,
        minute: u64,
        rush: bool,
    ) -> ShipmentId {
        let id = self.next_id();
        self.shipments.push(Shipment {
            id: id.clone(),
            product,
            volume: volume.max(0.0),
            window: window.max(0.0),
            due_in: due_in.max(0.0),
            status: ShipmentStatus::Pending,
            created_at: minute,
            cooldown: 0.0,
            rush,
            delivered: 0.0,
        });
        self.hours_since_last[product] = 0.0;
        id
    }

    /// Count down every pending shipment and resolve the ones that reach zero.
    /// Resolved shipments age out after their cooldown.
    pub(crate) fn advance(
        &mut self,
        storage: &mut StorageState,
        futures: &PerProduct<f64>,
        constants: &Constants,
    ) -> Vec<ShipmentOutcome> {
        self.cooldowns.tick();
        for hours in [
            &mut self.hours_since_last.gasoline,
            &mut self.hours_since_last.diesel,
            &mut self.hours_since_last.jet,
            &mut self.hours_since_last.lpg,
        ] {
            *hours += 1.0 / 60.0;
        }

        let mut outcomes = Vec::new();
        for shipment in &mut self.shipments {
            if shipment.status != ShipmentStatus::Pending {
                shipment.cooldown = (shipment.cooldown - 1.0).max(0.0);
                continue;
            }
            shipment.due_in = (shipment.due_in - 1.0 / 60.0).max(0.0);
            if shipment.due_in > DUE_EPSILON {
                continue;
            }
            let tank = &mut storage.tanks[shipment.product];
            let delivered = tank.draw(shipment.volume);
            let missing = shipment.volume - delivered;
            let (status, penalty) = if missing <= DUE_EPSILON {
                (ShipmentStatus::Completed, 0.0)
            } else {
                let spot = futures[shipment.product].max(0.0);
                (
                    ShipmentStatus::Missed,
                    missing * 1000.0 * spot * MISSED_PENALTY_SHARE,
                )
            };
            shipment.status = status;
            shipment.delivered = delivered;
            shipment.due_in = 0.0;
            shipment.cooldown = constants.shipment_cooldown_minutes.max(0.0);
            match status {
                ShipmentStatus::Completed => self.stats.completed += 1,
                _ => {
                    self.stats.missed += 1;
                    self.stats.missed_volume += missing;
                }
            }
            self.stats.delivered_volume += delivered;
            self.stats.penalty_total += penalty;
            outcomes.push(ShipmentOutcome {
                id: shipment.id.clone(),
                product: shipment.product,
                volume: shipment.volume,
                delivered,
                status,
                penalty,
            });
        }
        self.shipments
            .retain(|s| s.status == ShipmentStatus::Pending || s.cooldown > 0.0);
        outcomes
    }

    /// Keep the planning horizon populated. Returns the ids created.
    pub(crate) fn plan(
        &mut self,
        storage: &StorageState,
        demand: &PerProduct<f64>,
        constants: &Constants,
        minute: u64,
        rng: &mut impl RandomSource,
    ) -> Vec<ShipmentId> {
        let mut created = Vec::new();
        let overall = storage.overall_ratio();
        for product in Product::ALL {
            let interval = shipment_interval(product, demand[product]);
            loop {
                if self.pending_count() >= constants.max_pending_shipments {
                    return created;
                }
                let latest = self
                    .pending()
                    .filter(|s| s.product == product)
                    .map(|s| s.due_in)
                    .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))));
                let due_in = latest.map_or(interval * 0.5, |d| d + interval);
                if due_in > constants.shipment_horizon_hours {
                    break;
                }
                let stale =
                    self.hours_since_last[product] >= constants.shipment_staleness_hours;
                let too_empty = storage.tanks[product].ratio() < MIN_PRODUCT_RATIO
                    || overall < MIN_OVERALL_RATIO;
                if too_empty && !stale {
                    break;
                }
                let volume =
                    nominal_volume(product) * (0.85 + roll(rng, RollSite::ShipmentVolume) * 0.3);
                let window =
                    MIN_WINDOW_HOURS + roll(rng, RollSite::ShipmentWindow) * WINDOW_SPREAD_HOURS;
                created.push(self.create(product, volume, window, due_in, minute, false));
            }
        }
        created
    }
}

/// Hours between planned shipments of one product.
pub fn shipment_interval(product: Product, demand: f64) -> f64 {
    let per_hour = demand.max(0.0) * EXPORT_SHARE / 24.0;
    if per_hour <= 0.0 {
        return MAX_INTERVAL_HOURS;
    }
    (nominal_volume(product) / per_hour).clamp(MIN_INTERVAL_HOURS, MAX_INTERVAL_HOURS)
}
