//! Cash ledger: per-tick revenue, operating cost and penalties.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::storage::MINUTES_PER_DAY;
use crate::{PerProduct, Product};

/// Variable processing cost, dollars per bbl of unit feed.
pub const VARIABLE_OPEX_PER_BBL: f64 = 1.8;
pub const FIXED_OVERHEAD_PER_DAY: f64 = 180_000.0;
pub const MAINTENANCE_SPEND_PER_DAY: f64 = 140_000.0;
pub const SAFETY_SPEND_PER_DAY: f64 = 90_000.0;
pub const ENVIRONMENT_SPEND_PER_DAY: f64 = 110_000.0;
/// Rack shortage penalty as a share of spot value.
pub const SHORTAGE_PENALTY_SHARE: f64 = 0.35;

/// Dollars moved in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickCashflow {
    pub revenue: f64,
    pub cost: f64,
    pub penalty: f64,
}

impl TickCashflow {
    pub fn profit(&self) -> f64 {
        self.revenue - self.cost - self.penalty
    }
}

/// Everything priced in one tick. Volumes in kbbl for this tick, rates in kbpd.
pub struct CashflowInputs<'a> {
    pub sold: &'a PerProduct<f64>,
    pub shortage: &'a PerProduct<f64>,
    pub futures: &'a PerProduct<f64>,
    pub revenue_multiplier: f64,
    pub crude_rate: f64,
    pub crude_cost: f64,
    /// Sum of unit feed rates, kbpd.
    pub processed_rate: f64,
    pub maintenance: f64,
    pub safety: f64,
    pub environment: f64,
    pub strain_cost_per_day: f64,
    pub carrying_cost_per_day: f64,
    pub carbon_fine_per_day: f64,
    /// Missed-shipment penalties resolved this tick, dollars.
    pub shipment_penalty: f64,
}

pub fn tick_cashflow(inputs: &CashflowInputs<'_>) -> TickCashflow {
    let per_tick = 1.0 / MINUTES_PER_DAY;
    let revenue: f64 = Product::ALL
        .into_iter()
        .map(|p| inputs.sold[p].max(0.0) * 1000.0 * inputs.futures[p])
        .sum::<f64>()
        * inputs.revenue_multiplier;
    let crude = inputs.crude_rate.max(0.0) * 1000.0 * inputs.crude_cost * per_tick;
    let opex = inputs.processed_rate.max(0.0) * 1000.0 * VARIABLE_OPEX_PER_BBL * per_tick;
    let spend = (FIXED_OVERHEAD_PER_DAY
        + inputs.maintenance * MAINTENANCE_SPEND_PER_DAY
        + inputs.safety * SAFETY_SPEND_PER_DAY
        + inputs.environment * ENVIRONMENT_SPEND_PER_DAY
        + inputs.strain_cost_per_day
        + inputs.carrying_cost_per_day)
        * per_tick;
    let shortage: f64 = Product::ALL
        .into_iter()
        .map(|p| inputs.shortage[p].max(0.0) * 1000.0 * inputs.futures[p] * SHORTAGE_PENALTY_SHARE)
        .sum();
    TickCashflow {
        revenue,
        cost: crude + opex + spend,
        penalty: shortage + inputs.carbon_fine_per_day * per_tick + inputs.shipment_penalty,
    }
}

/// Hours of booked cashflow behind the per-day rates.
pub const RATE_WINDOW_HOURS: usize = 24;
const MINUTES_PER_HOUR: u32 = 60;

/// Cashflow summed over up to one hour of ticks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CashTotals {
    pub revenue: f64,
    pub cost: f64,
    pub penalty: f64,
    pub minutes: u32,
}

impl CashTotals {
    fn add(&mut self, other: &CashTotals) {
        self.revenue += other.revenue;
        self.cost += other.cost;
        self.penalty += other.penalty;
        self.minutes += other.minutes;
    }
}

/// Rolling window of completed hours plus the hour in progress.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RateWindow {
    pub hours: VecDeque<CashTotals>,
    pub current: CashTotals,
}

impl RateWindow {
    pub fn push(&mut self, flow: &TickCashflow) {
        self.current.add(&CashTotals {
            revenue: flow.revenue,
            cost: flow.cost,
            penalty: flow.penalty,
            minutes: 1,
        });
        if self.current.minutes >= MINUTES_PER_HOUR {
            self.hours.push_back(std::mem::take(&mut self.current));
            while self.hours.len() > RATE_WINDOW_HOURS {
                self.hours.pop_front();
            }
        }
    }

    pub fn totals(&self) -> CashTotals {
        let mut totals = self.current;
        for hour in &self.hours {
            totals.add(hour);
        }
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Ledger {
    /// Averaged over `window`, in dollars per day.
    pub revenue_per_day: f64,
    pub cost_per_day: f64,
    pub penalty_per_day: f64,
    pub cumulative_revenue: f64,
    pub cumulative_cost: f64,
    pub cumulative_penalty: f64,
    /// One-shot operator action costs, also included in `cumulative_cost`.
    pub action_spend: f64,
    pub window: RateWindow,
}

impl Ledger {
    pub fn book(&mut self, flow: &TickCashflow) {
        self.cumulative_revenue += flow.revenue;
        self.cumulative_cost += flow.cost;
        self.cumulative_penalty += flow.penalty;
        self.window.push(flow);
        self.refresh_rates();
    }

    /// Recompute the per-day rates from the window.
    pub fn refresh_rates(&mut self) {
        let totals = self.window.totals();
        if totals.minutes == 0 {
            self.revenue_per_day = 0.0;
            self.cost_per_day = 0.0;
            self.penalty_per_day = 0.0;
            return;
        }
        let scale = MINUTES_PER_DAY / f64::from(totals.minutes);
        self.revenue_per_day = totals.revenue * scale;
        self.cost_per_day = totals.cost * scale;
        self.penalty_per_day = totals.penalty * scale;
    }

    pub fn charge(&mut self, amount: f64) {
        let amount = amount.max(0.0);
        self.cumulative_cost += amount;
        self.action_spend += amount;
    }

    pub fn profit_per_day(&self) -> f64 {
        self.revenue_per_day - self.cost_per_day - self.penalty_per_day
    }

    pub fn cumulative_profit(&self) -> f64 {
        self.cumulative_revenue - self.cumulative_cost - self.cumulative_penalty
    }
}
