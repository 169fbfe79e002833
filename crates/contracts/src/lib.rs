//! # Contracts
//!
//! Shared interface contracts for the telemetry fusion workspace: wire frames,
//! decoded samples, fused snapshots, configuration and the source/sink traits.
//! Every other crate depends on this one; it depends on none of them.
//!
//! ## Time Model
//! - All timestamps are seconds (f64) on a process-local monotonic clock
//! - Frames are stamped by the transport; `tick(now)` uses the same clock

mod blueprint;
mod device;
mod engine_config;
mod error;
mod frame;
mod frame_source;
mod sample;
mod sink;
mod snapshot;

pub use blueprint::*;
pub use device::{DeviceId, DeviceType, Role};
pub use engine_config::*;
pub use error::*;
pub use frame::RawFrame;
pub use frame_source::{FrameCallback, FrameSource};
pub use sample::*;
pub use sink::*;
pub use snapshot::*;
