//! `refinery_core`: deterministic refinery simulation.
//!
//! No IO, no wall clock. The host passes elapsed seconds to
//! `Engine::update`, and every random draw goes through the engine's
//! `RandomSource`.

pub mod alerts;
mod clock;
mod commands;
mod config;
pub mod directives;
pub mod economy;
mod engine;
pub mod environment;
mod error;
pub mod flow;
mod log;
pub mod logistics;
pub mod market;
pub mod metrics;
pub mod recorder;
pub mod reliability;
mod rng;
mod scenario;
pub mod score;
mod snapshot;
mod state;
pub mod storage;
pub mod strain;
pub mod topology;
mod types;
pub mod wear;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use alerts::{active_alerts, ActiveAlert, AlertSource};
pub use clock::{Clock, MAX_SPEED, MIN_SPEED, SPEED_PRESETS};
pub use commands::{Command, CommandEnvelope, DelayOptions, OverrideOptions};
pub use config::Constants;
pub use directives::{Directive, DirectiveKind, DirectiveState, DirectiveStatus};
pub use engine::Engine;
pub use error::{ActionError, SnapshotError};
pub use log::{EventLog, LogEntry};
pub use logistics::{LogisticsState, Shipment, ShipmentStatus};
pub use metrics::{compute_metrics, Metrics, METRICS_VERSION};
pub use recorder::RecordingSummary;
pub use rng::{RandomSource, RollSite, SeededRandom};
pub use scenario::{scenario_catalog, ScenarioDef, ScenarioId};
pub use score::{Grade, HistorySample, Scorecard};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use state::{PlantState, TankActivity};
pub use topology::{process_topology, ProcessTopology};
pub use types::*;

#[cfg(test)]
mod tests;
