//! # Ingestion
//!
//! Frame ingestion and decoding.
//!
//! Responsibilities:
//! - Register frame sources (radio transport, mock, replay)
//! - Queue raw frames without ever blocking a source
//! - Decode ANT+ pages into typed samples (`FrameDecoder`)
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{FrameDecoder, IngestionPipeline, MockFrameSource, MonotonicClock};
//!
//! let clock = MonotonicClock::new();
//! let mut pipeline = IngestionPipeline::new(256);
//! pipeline.register_source(Box::new(MockFrameSource::heart_rate(12345, 70.0, clock)))?;
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all();
//!
//! let mut decoder = FrameDecoder::new();
//! while let Ok(frame) = rx.recv().await {
//!     if let Ok(sample) = decoder.decode(&frame) {
//!         // ...
//!     }
//! }
//! ```

mod clock;
mod config;
mod decoder;
mod error;
mod mock;
pub mod payload;
mod pipeline;
mod replay;
mod source_adapter;

// Re-exports
pub use clock::MonotonicClock;
pub use config::{BackpressureConfig, IngestionMetrics, MetricsSnapshot};
pub use contracts::RawFrame;
pub use decoder::{decode, new_rr_intervals, BeatMarker, FrameDecoder};
pub use error::{DecodeError, IngestionError, Result};
pub use mock::{MockDeviceConfig, MockFrameSource, MockPageGenerator};
pub use pipeline::IngestionPipeline;
pub use replay::{ReplayConfig, ReplayFrameSource};
