//! Error types for snapshot loading and operator commands.

use thiserror::Error;

use crate::{Stream, UnitId};

/// The snapshot loader's single hard failure. Nested fields never error;
/// they fall back to defaults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Why an operator command was skipped. The engine has already logged the
/// reason when one of these is returned.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    #[error("{action} is on cooldown for another {minutes:.0} min")]
    Cooldown { action: &'static str, minutes: f64 },
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),
    #[error("unknown parameter `{0}`")]
    UnknownParam(String),
    #[error("no product has {required:.1} kbbl on hand")]
    NoEligibleProduct { required: f64 },
    #[error("no pending shipment")]
    NoPendingShipment,
    #[error("{} is not online", .0.display_name())]
    UnitUnavailable(UnitId),
    #[error("{} has no inbound stream to bypass", .0.display_name())]
    NoFeedStream(UnitId),
    #[error("bypass on {} is already active", .0.as_str())]
    BoostActive(Stream),
    #[error("storage has already been expanded {0} times")]
    UpgradeLimit(u32),
}
