//! # Fusion Bus
//!
//! Snapshot distribution.
//!
//! Responsibilities:
//! - Accept every `Snapshot` produced by the engine tick
//! - Fan out to multiple sinks (log, JSON-lines file, terminal, MQTT)
//! - Isolate slow sinks: each has a bounded queue that keeps the newest
//!   snapshots, so the tick loop never waits

pub mod bus;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use bus::FusionBus;
pub use contracts::{Snapshot, SnapshotSink};
pub use error::BusError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{
    FileSink, FileSinkConfig, LogSink, MqttMessage, MqttPlanner, MqttSink, MqttSinkConfig,
    TerminalSink, TopicMetric, UserTopics, render_table,
};
