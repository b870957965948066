//! Per-tick material balance through the six process units.
//!
//! `run_network` is pure: it reads unit state, boosts and parameters and
//! returns throughputs, stream flows and product rates. Nothing is written
//! back until the engine applies the outcome.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::clamp_finite;
use crate::wear::integrity_efficiency;
use crate::{
    Parameters, PipelineBoost, ProductionRates, ScenarioDef, Stream, StreamFlows, UnitId,
    UnitRegistry, UnitStatus,
};

/// Distillation cut shares before focus and quality adjustments.
const BASE_SHARES: CrudeCuts = CrudeCuts {
    gas: 0.05,
    naphtha: 0.22,
    kerosene: 0.12,
    diesel: 0.24,
    heavy: 0.22,
    resid: 0.15,
};
const FOCUS_SWING: f64 = 0.16;
const MIN_SHARE: f64 = 0.01;

pub const MAX_THROTTLE: f64 = 1.2;
pub const MAX_UTILIZATION: f64 = 1.5;
/// Liquids (gasoline + diesel + jet) may not exceed crude × this.
pub const LIQUIDS_CAP: f64 = 1.02;
/// LPG may not exceed crude × this.
pub const LPG_CAP: f64 = 0.12;

const STRAIN_PENALTY_ONSET: f64 = 0.35;
const STRAIN_PENALTY_MAX: f64 = 0.18;

// Yields per unit of converted feed.
const REFORMER_GASOLINE: f64 = 0.92;
const REFORMER_HYDROGEN: f64 = 0.04;
const REFORMER_WASTE: f64 = 0.04;
const FCC_RESID_SHARE: f64 = 0.35;
const FCC_GASOLINE: f64 = 0.50;
const FCC_DIESEL: f64 = 0.20;
const FCC_LPG: f64 = 0.18;
const FCC_WASTE: f64 = 0.12;
const HYDROCRACKER_RESID_SHARE: f64 = 0.5;
const HYDROCRACKER_DIESEL_SHARE: f64 = 0.25;
const HYDROCRACKER_GASOLINE: f64 = 0.28;
const HYDROCRACKER_DIESEL: f64 = 0.42;
const HYDROCRACKER_JET: f64 = 0.22;
const HYDROCRACKER_HYDROGEN: f64 = 0.03;
const HYDROCRACKER_WASTE: f64 = 0.05;
const ALKYLATION_GASOLINE: f64 = 0.85;
const ALKYLATION_WASTE: f64 = 0.15;
const SULFUR_DIESEL: f64 = 0.35;
const SULFUR_WASTE: f64 = 0.65;
const SULFUR_ELEMENTAL: f64 = 0.12;

/// The six distillation cuts, kbpd (or shares when normalized).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CrudeCuts {
    pub gas: f64,
    pub naphtha: f64,
    pub kerosene: f64,
    pub diesel: f64,
    pub heavy: f64,
    pub resid: f64,
}

impl CrudeCuts {
    fn total(&self) -> f64 {
        self.gas + self.naphtha + self.kerosene + self.diesel + self.heavy + self.resid
    }

    fn scaled(&self, factor: f64) -> CrudeCuts {
        CrudeCuts {
            gas: self.gas * factor,
            naphtha: self.naphtha * factor,
            kerosene: self.kerosene * factor,
            diesel: self.diesel * factor,
            heavy: self.heavy * factor,
            resid: self.resid * factor,
        }
    }
}

/// Cut shares for a given product focus and crude quality shift, summing to 1.
pub fn fraction_shares(product_focus: f64, quality_shift: f64) -> CrudeCuts {
    let focus = clamp_finite(product_focus, 0.0, 1.0);
    let quality = if quality_shift.is_finite() {
        quality_shift
    } else {
        0.0
    };
    let swing = (focus - 0.5) * FOCUS_SWING;
    let mut shares = BASE_SHARES;
    shares.naphtha += swing + quality * 0.6;
    shares.diesel -= swing;
    shares.gas += quality * 0.2;
    shares.resid -= quality * 0.8;
    for share in [
        &mut shares.gas,
        &mut shares.naphtha,
        &mut shares.kerosene,
        &mut shares.diesel,
        &mut shares.heavy,
        &mut shares.resid,
    ] {
        *share = share.max(MIN_SHARE);
    }
    let total = shares.total();
    shares.scaled(1.0 / total)
}

pub struct FlowInput<'a> {
    pub params: &'a Parameters,
    pub scenario: &'a ScenarioDef,
    /// Storage-pressure throttle on crude intake, `[0.45, 1]`.
    pub storage_throttle: f64,
    pub units: &'a UnitRegistry,
    pub boosts: &'a BTreeMap<Stream, PipelineBoost>,
    /// Operational strain, `[0, 12]`.
    pub strain: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowOutcome {
    /// Crude the plant tried to take before distillation limits.
    pub crude_target: f64,
    /// Feed per unit in `UnitId::ALL` order, kbpd.
    pub throughput: [f64; 6],
    pub flows: StreamFlows,
    pub production: ProductionRates,
}

impl FlowOutcome {
    pub fn throughput(&self, unit: UnitId) -> f64 {
        self.throughput[unit.index()]
    }

    pub fn utilization(&self, units: &UnitRegistry, unit: UnitId) -> f64 {
        let capacity = units.get(unit).capacity;
        if capacity <= 0.0 {
            return 0.0;
        }
        clamp_finite(self.throughput(unit) / capacity, 0.0, MAX_UTILIZATION)
    }
}

/// Effective throttle from an operator override, `[0, 1.2]`.
pub fn effective_throttle(override_throttle: Option<f64>) -> f64 {
    override_throttle.map_or(1.0, |t| clamp_finite(t, 0.0, MAX_THROTTLE))
}

/// Feed ceiling for a unit: zero unless online, else the lower of
/// capacity × throttle and its inbound pipeline × boost.
pub fn feed_limit(
    units: &UnitRegistry,
    boosts: &BTreeMap<Stream, PipelineBoost>,
    unit: UnitId,
) -> f64 {
    let state = units.get(unit);
    if state.status != UnitStatus::Online {
        return 0.0;
    }
    let unit_cap = state.capacity.max(0.0) * effective_throttle(state.override_throttle);
    match Stream::feeding(unit) {
        Some(stream) => {
            let multiplier = boosts.get(&stream).map_or(1.0, |b| b.multiplier.max(0.0));
            unit_cap.min(stream.nominal_capacity() * multiplier)
        }
        None => unit_cap,
    }
}

/// Fraction of liquids diverted to flare at the given strain.
pub fn strain_yield_penalty(strain: f64) -> f64 {
    let factor = clamp_finite(strain / crate::strain::STRAIN_MAX, 0.0, 1.0);
    if factor <= STRAIN_PENALTY_ONSET {
        return 0.0;
    }
    ((factor - STRAIN_PENALTY_ONSET) / (1.0 - STRAIN_PENALTY_ONSET)).min(1.0) * STRAIN_PENALTY_MAX
}

struct Stage<'a> {
    input: &'a FlowInput<'a>,
    outcome: FlowOutcome,
}

impl Stage<'_> {
    /// Take up to the unit's limit from `pool`; returns (feed, converted).
    /// Unconverted feed from a worn unit spills to waste.
    fn take(&mut self, unit: UnitId, pool: f64) -> (f64, f64) {
        let limit = feed_limit(self.input.units, self.input.boosts, unit);
        let feed = pool.max(0.0).min(limit);
        self.outcome.throughput[unit.index()] = feed;
        if let Some(stream) = Stream::feeding(unit) {
            self.outcome.flows.set(stream, feed);
        }
        let efficiency = integrity_efficiency(self.input.units.get(unit).integrity);
        let converted = feed * efficiency;
        self.outcome.production.waste += feed - converted;
        (feed, converted)
    }
}

/// Run one tick of the flow network.
pub fn run_network(input: &FlowInput<'_>) -> FlowOutcome {
    let crude_target = (input.params.crude_intake
        * input.scenario.crude_multiplier
        * clamp_finite(input.storage_throttle, 0.0, 1.0))
    .max(0.0);
    let mut stage = Stage {
        input,
        outcome: FlowOutcome {
            crude_target,
            ..FlowOutcome::default()
        },
    };

    // Distillation.
    let (crude, distilled) = stage.take(UnitId::Distillation, crude_target);
    stage.outcome.production.crude = crude;
    let shares = fraction_shares(input.params.product_focus, input.scenario.quality_shift);
    let mut cuts = shares.scaled(distilled);

    // Reformer: naphtha -> gasoline.
    let (feed, converted) = stage.take(UnitId::Reformer, cuts.naphtha);
    cuts.naphtha -= feed;
    {
        let p = &mut stage.outcome.production;
        p.gasoline += converted * REFORMER_GASOLINE;
        p.hydrogen += converted * REFORMER_HYDROGEN;
        p.waste += converted * REFORMER_WASTE;
    }

    // FCC: heavy + part of resid.
    let resid_offer = cuts.resid * FCC_RESID_SHARE;
    let pool = cuts.heavy + resid_offer;
    let (feed, converted) = stage.take(UnitId::Fcc, pool);
    if pool > 0.0 {
        let taken = feed / pool;
        cuts.heavy -= cuts.heavy * taken;
        cuts.resid -= resid_offer * taken;
    }
    let mut lpg_pool = cuts.gas + converted * FCC_LPG;
    cuts.gas = 0.0;
    {
        let p = &mut stage.outcome.production;
        p.gasoline += converted * FCC_GASOLINE;
        p.diesel += converted * FCC_DIESEL;
        p.waste += converted * FCC_WASTE;
    }

    // Hydrocracker: remaining heavy, half the resid, a quarter of straight-run diesel.
    let resid_offer = cuts.resid * HYDROCRACKER_RESID_SHARE;
    let diesel_offer = cuts.diesel * HYDROCRACKER_DIESEL_SHARE;
    let pool = cuts.heavy + resid_offer + diesel_offer;
    let (feed, converted) = stage.take(UnitId::Hydrocracker, pool);
    if pool > 0.0 {
        let taken = feed / pool;
        cuts.heavy -= cuts.heavy * taken;
        cuts.resid -= resid_offer * taken;
        cuts.diesel -= diesel_offer * taken;
    }
    {
        let p = &mut stage.outcome.production;
        p.gasoline += converted * HYDROCRACKER_GASOLINE;
        p.diesel += converted * HYDROCRACKER_DIESEL;
        p.jet += converted * HYDROCRACKER_JET;
        p.hydrogen += converted * HYDROCRACKER_HYDROGEN;
        p.waste += converted * HYDROCRACKER_WASTE;
    }

    // Alkylation: light ends -> alkylate; leftovers sold as LPG.
    let (feed, converted) = stage.take(UnitId::Alkylation, lpg_pool);
    lpg_pool -= feed;
    {
        let p = &mut stage.outcome.production;
        p.gasoline += converted * ALKYLATION_GASOLINE;
        p.waste += converted * ALKYLATION_WASTE;
        p.lpg += lpg_pool;
    }

    // Sulfur recovery: whatever resid and heavy remain. Untreated bottoms are waste.
    let pool = cuts.resid + cuts.heavy;
    let (feed, converted) = stage.take(UnitId::Sulfur, pool);
    {
        let p = &mut stage.outcome.production;
        p.diesel += converted * SULFUR_DIESEL;
        p.waste += converted * SULFUR_WASTE + (pool - feed);
        p.sulfur += converted * SULFUR_ELEMENTAL;
    }

    // Straight-run pass-through.
    {
        let p = &mut stage.outcome.production;
        p.gasoline += cuts.naphtha;
        p.jet += cuts.kerosene;
        p.diesel += cuts.diesel;
    }

    let mut outcome = stage.outcome;
    apply_mass_balance(&mut outcome.production);
    apply_strain_penalty(&mut outcome.production, input.strain);
    outcome
}

/// Liquids over the cap are scaled down and the excess counted as waste.
/// LPG over its cap is dropped without a waste entry.
fn apply_mass_balance(p: &mut ProductionRates) {
    let liquids_cap = p.crude * LIQUIDS_CAP;
    let liquids = p.liquids();
    if liquids > liquids_cap && liquids > 0.0 {
        let scale = liquids_cap / liquids;
        p.gasoline *= scale;
        p.diesel *= scale;
        p.jet *= scale;
        p.waste += liquids - liquids_cap;
    }
    p.lpg = p.lpg.min(p.crude * LPG_CAP);
}

fn apply_strain_penalty(p: &mut ProductionRates, strain: f64) {
    let penalty = strain_yield_penalty(strain);
    if penalty <= 0.0 {
        return;
    }
    let mut diverted = 0.0;
    for value in [&mut p.gasoline, &mut p.diesel, &mut p.jet, &mut p.lpg] {
        let cut = *value * penalty;
        *value -= cut;
        diverted += cut;
    }
    p.waste += diverted;
    p.flare += diverted;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScenarioId;

    fn run(units: &UnitRegistry, params: &Parameters, strain: f64) -> FlowOutcome {
        let scenario = ScenarioId::Baseline.def();
        let boosts = BTreeMap::new();
        run_network(&FlowInput {
            params,
            scenario: &scenario,
            storage_throttle: 1.0,
            units,
            boosts: &boosts,
            strain,
        })
    }

    #[test]
    fn shares_sum_to_one() {
        for focus in [0.0, 0.5, 1.0] {
            for quality in [-0.08, 0.0, 0.05] {
                let s = fraction_shares(focus, quality);
                assert!((s.total() - 1.0).abs() < 1e-12);
                assert!(s.resid >= MIN_SHARE / 2.0);
            }
        }
    }

    #[test]
    fn focus_shifts_naphtha_against_diesel() {
        let gasoline_heavy = fraction_shares(1.0, 0.0);
        let diesel_heavy = fraction_shares(0.0, 0.0);
        assert!(gasoline_heavy.naphtha > diesel_heavy.naphtha);
        assert!(gasoline_heavy.diesel < diesel_heavy.diesel);
    }

    #[test]
    fn default_plant_produces_every_product() {
        let out = run(&UnitRegistry::new(), &Parameters::default(), 0.0);
        let p = out.production;
        assert!((p.crude - 140.0).abs() < 1e-9);
        assert!(p.gasoline > 40.0, "gasoline {}", p.gasoline);
        assert!(p.diesel > 25.0, "diesel {}", p.diesel);
        assert!(p.jet > 10.0, "jet {}", p.jet);
        assert!(p.lpg > 0.5, "lpg {}", p.lpg);
        assert!(p.liquids() <= p.crude * LIQUIDS_CAP + 1e-9);
    }

    #[test]
    fn mass_is_conserved_without_strain() {
        let out = run(&UnitRegistry::new(), &Parameters::default(), 0.0);
        let p = out.production;
        let accounted = p.liquids() + p.lpg + p.waste + p.hydrogen;
        assert!(
            (accounted - p.crude).abs() < 1e-6,
            "accounted {accounted} vs crude {}",
            p.crude
        );
    }

    #[test]
    fn offline_reformer_passes_naphtha_through() {
        let mut units = UnitRegistry::new();
        let online = run(&units, &Parameters::default(), 0.0);
        units.get_mut(UnitId::Reformer).status = UnitStatus::Offline;
        let offline = run(&units, &Parameters::default(), 0.0);
        assert!(offline.throughput(UnitId::Reformer).abs() < 1e-12);
        assert!(offline.flows.naphtha_reformer.abs() < 1e-12);
        // Straight-run naphtha still reaches the gasoline pool.
        assert!(offline.production.gasoline > online.production.gasoline * 0.6);
        let p = offline.production;
        let accounted = p.liquids() + p.lpg + p.waste + p.hydrogen;
        assert!((accounted - p.crude).abs() < 1e-6);
    }

    #[test]
    fn standby_distillation_stops_everything() {
        let mut units = UnitRegistry::new();
        units.get_mut(UnitId::Distillation).status = UnitStatus::Standby;
        let out = run(&units, &Parameters::default(), 0.0);
        assert!(out.production.crude.abs() < 1e-12);
        assert!(out.production.liquids().abs() < 1e-12);
        assert!(out.throughput.iter().all(|t| t.abs() < 1e-12));
    }

    #[test]
    fn throttle_caps_distillation() {
        let mut units = UnitRegistry::new();
        units.get_mut(UnitId::Distillation).override_throttle = Some(0.5);
        let out = run(&units, &Parameters::default(), 0.0);
        assert!((out.production.crude - 90.0).abs() < 1e-9);
    }

    #[test]
    fn boost_raises_pipeline_ceiling() {
        let mut params = Parameters::default();
        params.crude_intake = 220.0;
        params.product_focus = 1.0;
        let units = UnitRegistry::new();
        let scenario = ScenarioId::Baseline.def();
        let plain = BTreeMap::new();
        let mut boosted = BTreeMap::new();
        boosted.insert(
            Stream::NaphthaReformer,
            PipelineBoost {
                multiplier: 0.5,
                expires_at: 100,
            },
        );
        let a = run_network(&FlowInput {
            params: &params,
            scenario: &scenario,
            storage_throttle: 1.0,
            units: &units,
            boosts: &plain,
            strain: 0.0,
        });
        let b = run_network(&FlowInput {
            params: &params,
            scenario: &scenario,
            storage_throttle: 1.0,
            units: &units,
            boosts: &boosted,
            strain: 0.0,
        });
        assert!((b.flows.naphtha_reformer - 24.0).abs() < 1e-9);
        assert!(a.flows.naphtha_reformer > b.flows.naphtha_reformer);
    }

    #[test]
    fn worn_unit_spills_to_waste() {
        let mut units = UnitRegistry::new();
        let healthy = run(&units, &Parameters::default(), 0.0);
        units.get_mut(UnitId::Fcc).integrity = 0.3;
        let worn = run(&units, &Parameters::default(), 0.0);
        assert!(worn.production.waste > healthy.production.waste);
    }

    #[test]
    fn strain_penalty_flares_liquids() {
        let units = UnitRegistry::new();
        let calm = run(&units, &Parameters::default(), 0.0);
        let strained = run(&units, &Parameters::default(), 12.0);
        assert!(calm.production.flare.abs() < 1e-12);
        let expected = calm.production.gasoline * (1.0 - STRAIN_PENALTY_MAX);
        assert!((strained.production.gasoline - expected).abs() < 1e-9);
        assert!(strained.production.flare > 0.0);
    }

    #[test]
    fn lpg_cap_discards_without_waste() {
        let mut p = ProductionRates {
            crude: 10.0,
            lpg: 5.0,
            ..ProductionRates::default()
        };
        apply_mass_balance(&mut p);
        assert!((p.lpg - 1.2).abs() < 1e-12);
        assert!(p.waste.abs() < 1e-12);
    }

    #[test]
    fn liquids_cap_moves_excess_to_waste() {
        let mut p = ProductionRates {
            crude: 10.0,
            gasoline: 6.0,
            diesel: 4.0,
            jet: 2.0,
            ..ProductionRates::default()
        };
        apply_mass_balance(&mut p);
        assert!((p.liquids() - 10.2).abs() < 1e-9);
        assert!((p.waste - 1.8).abs() < 1e-9);
    }

    #[test]
    fn utilization_is_bounded() {
        let mut units = UnitRegistry::new();
        units.get_mut(UnitId::Distillation).override_throttle = Some(5.0);
        let mut params = Parameters::default();
        params.crude_intake = 220.0;
        let out = run(&units, &params, 0.0);
        let util = out.utilization(&units, UnitId::Distillation);
        assert!(util <= MAX_THROTTLE + 1e-9);
    }
}
