//! # Fusion Engine
//!
//! Turns decoded ANT+ samples into per-user telemetry.
//!
//! Responsibilities:
//! - Device registry with wrap-safe counter deltas and RR history
//! - Speed / cadence / distance computation with plausibility limits
//! - Active-device resolution per (user, role) with hysteresis
//! - Availability tracking with change edges
//! - `Snapshot` assembly on every tick
//!
//! ## Usage Example
//!
//! ```ignore
//! use fusion_engine::FusionEngine;
//!
//! let mut engine = FusionEngine::new(blueprint.to_engine_config());
//!
//! // As frames arrive
//! engine.ingest(&frame)?;
//!
//! // Every fusion interval
//! let snapshot = engine.tick(clock.now());
//! ```

mod engine;
mod error;
mod metrics_computer;
mod registry;
mod resolver;
mod runner;
mod staleness;

pub use engine::{EngineStats, FusionEngine};
pub use error::{CounterAnomaly, EngineError, Result};
pub use metrics_computer::{compute_bike_metrics, compute_heart_rate, BikeMetrics, HeartRateMetrics};
pub use registry::{
    CounterDelta, DeltaEvent, DeviceRegistry, DeviceSummary, Observation, RR_HISTORY_LEN,
};
pub use resolver::UserResolver;
pub use runner::{EngineRunner, RunnerConfig};
pub use staleness::StalenessTracker;

pub use contracts::{EngineConfig, Snapshot};
