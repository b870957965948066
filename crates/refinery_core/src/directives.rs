//! Short-lived operating goals. Three slots are always filled; a resolved
//! directive lingers for its cooldown and is then replaced.

use serde::{Deserialize, Serialize};

use crate::logistics::{nominal_volume, ShipmentOutcome};
use crate::rng::{roll, RandomSource, RollSite};
use crate::types::clamp_finite;
use crate::{Constants, DirectiveId, Product};

pub const DIRECTIVE_SLOTS: usize = 3;
const RELIABILITY_MARGIN: f64 = 0.08;
const RELIABILITY_DURATION: f64 = 12.0 * 60.0;
const DELIVERY_DURATION: f64 = 24.0 * 60.0;
const CARBON_DURATION: f64 = 16.0 * 60.0;
const CARBON_HEADROOM: f64 = 1.05;
const CARBON_MIN_THRESHOLD: f64 = 4.0;
const CARBON_ALLOWANCE: f64 = 120.0;
/// Breach minutes forgiven per compliant minute.
const BREACH_DECAY: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Reliability,
    Delivery,
    Carbon,
}

impl DirectiveKind {
    pub const ALL: [DirectiveKind; 3] = [
        DirectiveKind::Reliability,
        DirectiveKind::Delivery,
        DirectiveKind::Carbon,
    ];

    pub fn parse(key: &str) -> Option<DirectiveKind> {
        match key {
            "reliability" => Some(DirectiveKind::Reliability),
            "delivery" => Some(DirectiveKind::Delivery),
            "carbon" => Some(DirectiveKind::Carbon),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveStatus {
    Active,
    Completed,
    Failed,
}

impl DirectiveStatus {
    pub fn parse(key: &str) -> Option<DirectiveStatus> {
        match key {
            "active" => Some(DirectiveStatus::Active),
            "completed" => Some(DirectiveStatus::Completed),
            "failed" => Some(DirectiveStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub id: DirectiveId,
    pub kind: DirectiveKind,
    pub title: String,
    pub description: String,
    /// Reliability floor or carbon ceiling (kt/day).
    pub threshold: f64,
    /// Delivery volume, kbbl.
    pub target: f64,
    pub product: Option<Product>,
    /// Carbon breach minutes tolerated.
    pub allowance: f64,
    /// Minutes.
    pub duration: f64,
    pub time_remaining: f64,
    pub status: DirectiveStatus,
    /// `[0, 1]`.
    pub progress: f64,
    pub delivered: f64,
    pub breach: f64,
    pub cooldown: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectiveStats {
    pub completed: u32,
    pub failed: u32,
}

impl DirectiveStats {
    pub fn reliability(&self) -> f64 {
        let resolved = self.completed + self.failed;
        if resolved == 0 {
            1.0
        } else {
            f64::from(self.completed) / f64::from(resolved)
        }
    }
}

/// Plant readings a directive is judged against.
#[derive(Debug, Clone, Copy)]
pub struct DirectiveSignals<'a> {
    pub reliability: f64,
    pub carbon: f64,
    pub shipments: &'a [ShipmentOutcome],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveResolution {
    pub id: DirectiveId,
    pub title: String,
    pub status: DirectiveStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DirectiveState {
    pub directives: Vec<Directive>,
    pub stats: DirectiveStats,
    pub next_directive_seq: u64,
}

impl DirectiveState {
    pub fn reliability(&self) -> f64 {
        self.stats.reliability()
    }

    /// Count down and judge every active directive; age out resolved ones.
    pub(crate) fn advance(
        &mut self,
        signals: &DirectiveSignals<'_>,
        constants: &Constants,
    ) -> Vec<DirectiveResolution> {
        let mut resolved = Vec::new();
        for directive in &mut self.directives {
            if directive.status != DirectiveStatus::Active {
                directive.cooldown = (directive.cooldown - 1.0).max(0.0);
                continue;
            }
            directive.time_remaining = (directive.time_remaining - 1.0).max(0.0);
            let outcome = judge(directive, signals);
            if let Some(status) = outcome {
                directive.status = status;
                directive.cooldown = constants.directive_cooldown_minutes.max(0.0);
                match status {
                    DirectiveStatus::Completed => self.stats.completed += 1,
                    _ => self.stats.failed += 1,
                }
                resolved.push(DirectiveResolution {
                    id: directive.id.clone(),
                    title: directive.title.clone(),
                    status,
                });
            }
        }
        self.directives
            .retain(|d| d.status == DirectiveStatus::Active || d.cooldown > 0.0);
        resolved
    }

    /// Fill empty slots. Returns the new directives' titles.
    pub(crate) fn replenish(
        &mut self,
        signals: &DirectiveSignals<'_>,
        rng: &mut impl RandomSource,
    ) -> Vec<String> {
        let mut created = Vec::new();
        while self.directives.len() < DIRECTIVE_SLOTS {
            let kind = self.pick_kind(rng);
            let directive = self.generate(kind, signals, rng);
            created.push(directive.title.clone());
            self.directives.push(directive);
        }
        created
    }

    /// Prefer a kind with no active directive.
    fn pick_kind(&self, rng: &mut impl RandomSource) -> DirectiveKind {
        let fresh: Vec<DirectiveKind> = DirectiveKind::ALL
            .into_iter()
            .filter(|k| {
                !self
                    .directives
                    .iter()
                    .any(|d| d.status == DirectiveStatus::Active && d.kind == *k)
            })
            .collect();
        let pool: &[DirectiveKind] = if fresh.is_empty() {
            &DirectiveKind::ALL
        } else {
            &fresh
        };
        pool[pick_index(roll(rng, RollSite::DirectiveKind), pool.len())]
    }

    fn generate(
        &mut self,
        kind: DirectiveKind,
        signals: &DirectiveSignals<'_>,
        rng: &mut impl RandomSource,
    ) -> Directive {
        self.next_directive_seq += 1;
        let id = DirectiveId(format!("dir_{:04}", self.next_directive_seq));
        let mut directive = Directive {
            id,
            kind,
            title: String::new(),
            description: String::new(),
            threshold: 0.0,
            target: 0.0,
            product: None,
            allowance: 0.0,
            duration: 0.0,
            time_remaining: 0.0,
            status: DirectiveStatus::Active,
            progress: 0.0,
            delivered: 0.0,
            breach: 0.0,
            cooldown: 0.0,
        };
        match kind {
            DirectiveKind::Reliability => {
                let threshold = clamp_finite(signals.reliability - RELIABILITY_MARGIN, 0.55, 0.9);
                directive.threshold = threshold;
                directive.duration = RELIABILITY_DURATION;
                directive.title = "Hold reliability".to_string();
                directive.description = format!(
                    "Keep plant reliability above {:.0}% for 12 h.",
                    threshold * 100.0
                );
            }
            DirectiveKind::Delivery => {
                let product = Product::ALL
                    [pick_index(roll(rng, RollSite::DirectiveProduct), Product::ALL.len())];
                let target = nominal_volume(product)
                    * (1.5 + roll(rng, RollSite::DirectiveMagnitude));
                directive.product = Some(product);
                directive.target = target;
                directive.duration = DELIVERY_DURATION;
                directive.title = format!("Deliver {}", product.label());
                directive.description = format!(
                    "Load {target:.1} kbbl of {} onto ships within 24 h.",
                    product.label()
                );
            }
            DirectiveKind::Carbon => {
                let threshold =
                    (signals.carbon.max(0.0) * CARBON_HEADROOM).max(CARBON_MIN_THRESHOLD);
                directive.threshold = threshold;
                directive.allowance = CARBON_ALLOWANCE;
                directive.duration = CARBON_DURATION;
                directive.title = "Cap emissions".to_string();
                directive.description = format!(
                    "Keep carbon under {threshold:.2} kt/day for 16 h, at most 2 h over."
                );
            }
        }
        directive.time_remaining = directive.duration;
        directive
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn pick_index(roll: f64, len: usize) -> usize {
    ((roll * len as f64).floor() as usize).min(len.saturating_sub(1))
}

fn elapsed_share(directive: &Directive) -> f64 {
    if directive.duration <= 0.0 {
        1.0
    } else {
        clamp_finite(1.0 - directive.time_remaining / directive.duration, 0.0, 1.0)
    }
}

/// Returns the terminal status if the directive resolves this tick.
fn judge(directive: &mut Directive, signals: &DirectiveSignals<'_>) -> Option<DirectiveStatus> {
    let expired = directive.time_remaining <= 0.0;
    match directive.kind {
        DirectiveKind::Reliability => {
            directive.progress = elapsed_share(directive);
            if signals.reliability < directive.threshold {
                Some(DirectiveStatus::Failed)
            } else if expired {
                Some(DirectiveStatus::Completed)
            } else {
                None
            }
        }
        DirectiveKind::Delivery => {
            let loaded: f64 = signals
                .shipments
                .iter()
                .filter(|s| Some(s.product) == directive.product)
                .map(|s| s.delivered)
                .sum();
            directive.delivered += loaded;
            directive.progress = if directive.target > 0.0 {
                clamp_finite(directive.delivered / directive.target, 0.0, 1.0)
            } else {
                1.0
            };
            if directive.delivered >= directive.target {
                Some(DirectiveStatus::Completed)
            } else if expired {
                Some(DirectiveStatus::Failed)
            } else {
                None
            }
        }
        DirectiveKind::Carbon => {
            if signals.carbon > directive.threshold {
                directive.breach += 1.0;
            } else {
                directive.breach = (directive.breach - BREACH_DECAY).max(0.0);
            }
            directive.progress = elapsed_share(directive);
            if directive.breach > directive.allowance {
                Some(DirectiveStatus::Failed)
            } else if expired {
                Some(DirectiveStatus::Completed)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logistics::ShipmentStatus;
    use crate::test_fixtures::ScriptedRandom;
    use crate::ShipmentId;

    fn signals(reliability: f64, carbon: f64) -> DirectiveSignals<'static> {
        DirectiveSignals {
            reliability,
            carbon,
            shipments: &[],
        }
    }

    #[test]
    fn replenish_fills_three_distinct_kinds() {
        let mut state = DirectiveState::default();
        let mut rng = ScriptedRandom::constant(0.0);
        let created = state.replenish(&signals(0.97, 6.0), &mut rng);
        assert_eq!(created.len(), DIRECTIVE_SLOTS);
        let kinds: Vec<_> = state.directives.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DirectiveKind::Reliability,
                DirectiveKind::Delivery,
                DirectiveKind::Carbon
            ]
        );
        assert_eq!(state.directives[0].id.0, "dir_0001");
        assert!((state.directives[0].threshold - 0.89).abs() < 1e-9);
        assert!((state.directives[2].threshold - 6.3).abs() < 1e-9);
    }

    #[test]
    fn reliability_directive_fails_on_dip() {
        let mut state = DirectiveState::default();
        let mut rng = ScriptedRandom::constant(0.0);
        state.replenish(&signals(0.97, 6.0), &mut rng);
        let resolved = state.advance(&signals(0.5, 6.0), &Constants::default());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].status, DirectiveStatus::Failed);
        assert_eq!(state.stats.failed, 1);
        assert!((state.reliability()).abs() < 1e-12);
    }

    #[test]
    fn delivery_completes_from_shipment_report() {
        let mut state = DirectiveState::default();
        let mut rng = ScriptedRandom::constant(0.0);
        state.replenish(&signals(0.97, 6.0), &mut rng);
        let target = state.directives[1].target;
        let outcomes = vec![ShipmentOutcome {
            id: ShipmentId("shp_0001".to_string()),
            product: Product::Gasoline,
            volume: target,
            delivered: target,
            status: ShipmentStatus::Completed,
            penalty: 0.0,
        }];
        let resolved = state.advance(
            &DirectiveSignals {
                reliability: 0.97,
                carbon: 6.0,
                shipments: &outcomes,
            },
            &Constants::default(),
        );
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].status, DirectiveStatus::Completed);
        assert_eq!(state.stats.completed, 1);
    }

    #[test]
    fn carbon_directive_tolerates_short_breach() {
        let mut state = DirectiveState::default();
        let mut rng = ScriptedRandom::constant(0.0);
        state.replenish(&signals(0.97, 6.0), &mut rng);
        let constants = Constants::default();
        for _ in 0..100 {
            state.advance(&signals(0.97, 9.0), &constants);
        }
        assert_eq!(state.directives[2].status, DirectiveStatus::Active);
        let mut failed = false;
        for _ in 0..30 {
            let resolved = state.advance(&signals(0.97, 9.0), &constants);
            failed |= resolved.iter().any(|r| r.title == "Cap emissions");
        }
        assert!(failed);
    }

    #[test]
    fn resolved_directive_is_replaced_after_cooldown() {
        let mut state = DirectiveState::default();
        let mut rng = ScriptedRandom::constant(0.0);
        let constants = Constants {
            directive_cooldown_minutes: 2.0,
            ..Constants::default()
        };
        state.replenish(&signals(0.97, 6.0), &mut rng);
        state.advance(&signals(0.1, 6.0), &constants);
        assert_eq!(state.directives.len(), DIRECTIVE_SLOTS);
        assert!(state.replenish(&signals(0.97, 6.0), &mut rng).is_empty());
        state.advance(&signals(0.97, 6.0), &constants);
        state.advance(&signals(0.97, 6.0), &constants);
        assert_eq!(state.directives.len(), DIRECTIVE_SLOTS - 1);
        state.replenish(&signals(0.97, 6.0), &mut rng);
        assert_eq!(state.directives.len(), DIRECTIVE_SLOTS);
        // The only kind without an active directive is reliability.
        assert_eq!(state.directives[2].kind, DirectiveKind::Reliability);
    }
}
