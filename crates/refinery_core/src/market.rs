//! Smoothed per-product prices and the market-stress scalar.

use serde::{Deserialize, Serialize};

use crate::types::clamp_finite;
use crate::{PerProduct, Product, ProductionRates, ScenarioDef};

pub const BASE_CRUDE_COST: f64 = 72.0;
const DRIFT_SMOOTHING: f64 = 0.28;
const COST_SMOOTHING: f64 = 0.35;
const FUTURES_SMOOTHING: f64 = 0.25;
const STRESS_SMOOTHING: f64 = 0.05;
pub const MIN_STRESS: f64 = 0.04;
pub const MAX_STRESS: f64 = 0.65;
const CARRY_COST_PER_KBBL_DAY: f64 = 350.0;
const CARRY_KNEE: f64 = 0.55;

/// Reference product price, $/bbl.
pub fn base_price(product: Product) -> f64 {
    match product {
        Product::Gasoline => 96.0,
        Product::Diesel => 101.0,
        Product::Jet => 104.0,
        Product::Lpg => 52.0,
    }
}

/// Production cost relative to crude cost before adders.
fn cost_factor(product: Product) -> f64 {
    match product {
        Product::Gasoline => 1.12,
        Product::Diesel => 1.10,
        Product::Jet => 1.14,
        Product::Lpg => 0.62,
    }
}

/// Feed-cost share below which cost may never fall.
fn floor_factor(product: Product) -> f64 {
    match product {
        Product::Lpg => 0.5,
        Product::Gasoline | Product::Diesel | Product::Jet => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductMarket {
    /// $/bbl.
    pub futures: f64,
    pub production_cost: f64,
    pub basis: f64,
    pub drift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub products: PerProduct<ProductMarket>,
    /// `[0.04, 0.65]`.
    pub stress: f64,
    /// $/bbl.
    pub crude_cost: f64,
}

impl MarketState {
    pub fn new(scenario: &ScenarioDef) -> Self {
        let crude_cost = BASE_CRUDE_COST * scenario.price_modifier;
        Self {
            products: PerProduct::from_fn(|p| {
                let futures = base_price(p) * scenario.price_modifier;
                let production_cost = crude_cost * cost_factor(p);
                ProductMarket {
                    futures,
                    production_cost,
                    basis: futures - production_cost,
                    drift: 0.0,
                }
            }),
            stress: MIN_STRESS,
            crude_cost,
        }
    }

    pub fn futures(&self) -> PerProduct<f64> {
        self.products.map(|_, m| m.futures)
    }

    /// Revenue discount from stress, `[0.55, 1.05]`.
    pub fn revenue_multiplier(&self) -> f64 {
        clamp_finite(1.0 - self.stress * 0.7, 0.55, 1.05)
    }
}

/// Everything the price model reads in one tick.
pub struct MarketInputs<'a> {
    pub scenario: &'a ScenarioDef,
    pub production: &'a ProductionRates,
    pub demand: &'a PerProduct<f64>,
    pub inventory_ratio: PerProduct<f64>,
    pub product_focus: f64,
    pub reliability: f64,
    pub downtime_share: f64,
    pub shipment_reliability: f64,
    pub directive_reliability: f64,
    pub strain_factor: f64,
    pub pressure_active: bool,
    pub pressure_throttle: f64,
    /// Rack shortage over rack demand this tick, `[0, 1]`.
    pub shortage_ratio: f64,
    pub incident_pressure: f64,
}

/// Mix bias from focus: leaning toward a product cheapens it.
fn focus_bias(product: Product, focus: f64) -> f64 {
    match product {
        Product::Gasoline => (0.5 - focus) * 0.06,
        Product::Diesel | Product::Jet => (focus - 0.5) * 0.06,
        Product::Lpg => 0.0,
    }
}

fn stress_target(inputs: &MarketInputs<'_>) -> f64 {
    let engaged = if inputs.pressure_active { 0.08 } else { 0.0 };
    let pressure = engaged + (1.0 - inputs.pressure_throttle).max(0.0) * 0.2;
    let reliability_shortfall = (0.9 - inputs.reliability).max(0.0) * 0.6;
    let logistics_shortfall = (1.0 - inputs.shipment_reliability).max(0.0) * 0.2
        + (1.0 - inputs.directive_reliability).max(0.0) * 0.1;
    let demand_shortfall = clamp_finite(inputs.shortage_ratio, 0.0, 1.0) * 0.15;
    let incidents = clamp_finite(inputs.incident_pressure, 0.0, 1.0) * 0.15;
    clamp_finite(
        MIN_STRESS + pressure + reliability_shortfall + logistics_shortfall + demand_shortfall
            + incidents,
        MIN_STRESS,
        MAX_STRESS,
    )
}

/// One tick of price smoothing.
pub fn step_market(market: &mut MarketState, inputs: &MarketInputs<'_>) {
    market.crude_cost = BASE_CRUDE_COST * inputs.scenario.price_modifier;
    let crude_cost = market.crude_cost;
    let reliability_drag = (1.0 - inputs.shipment_reliability).max(0.0) * 0.5
        + inputs.downtime_share * 0.3
        + (1.0 - inputs.directive_reliability).max(0.0) * 0.2;
    let cost_adder = (1.0 - inputs.reliability).max(0.0) * 6.0
        + inputs.strain_factor * 4.0
        + inputs.downtime_share * 3.0;

    for product in Product::ALL {
        let demand = inputs.demand[product].max(0.0);
        let supply = inputs.production.product(product).max(0.0);
        let gap = clamp_finite((demand - supply) / demand.max(1.0), -1.0, 1.0);
        let inventory_pressure = inputs.inventory_ratio[product] - 0.5;
        let mix_bias = (inputs.scenario.demand_bias[product] - 1.0)
            + focus_bias(product, inputs.product_focus);
        let drift_target =
            gap * 0.12 - inventory_pressure * 0.10 + reliability_drag * 0.05 + mix_bias * 0.5;

        let floor = crude_cost * floor_factor(product);
        let entry = &mut market.products[product];
        entry.drift = clamp_finite(
            entry.drift + (drift_target - entry.drift) * DRIFT_SMOOTHING,
            -0.5,
            0.5,
        );
        let target_cost = (crude_cost * cost_factor(product) + cost_adder).max(floor);
        let target_futures = (base_price(product) * inputs.scenario.price_modifier
            * (1.0 + entry.drift))
            .max(floor * 1.02);
        entry.production_cost =
            (entry.production_cost + (target_cost - entry.production_cost) * COST_SMOOTHING)
                .max(floor);
        entry.futures =
            (entry.futures + (target_futures - entry.futures) * FUTURES_SMOOTHING).max(floor * 1.02);
        entry.basis = entry.futures - entry.production_cost;
    }

    let target = stress_target(inputs);
    market.stress = clamp_finite(
        market.stress + (target - market.stress) * STRESS_SMOOTHING,
        MIN_STRESS,
        MAX_STRESS,
    );
}

/// Inventory carrying cost, dollars per day. Superlinear above 55% fill.
pub fn carrying_cost_per_day(levels: &PerProduct<(f64, f64)>) -> f64 {
    levels
        .iter()
        .map(|(_, &(level, ratio))| {
            let excess = ((ratio - CARRY_KNEE) / (1.0 - CARRY_KNEE)).max(0.0);
            level.max(0.0) * CARRY_COST_PER_KBBL_DAY * (1.0 + excess * excess * 3.0)
        })
        .sum()
}
