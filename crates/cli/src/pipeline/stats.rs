//! Pipeline statistics.

use std::time::Duration;

use fusion_bus::MetricsSnapshot;
use fusion_engine::DeviceSummary;
use observability::SnapshotAggregator;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub duration: Duration,

    /// Engine ticks, including the final one on shutdown
    pub ticks: u64,

    pub snapshots_published: u64,

    /// Frames handed over by sources
    pub frames_received: u64,

    /// Frames dropped because the ingestion queue was full
    pub frames_dropped: u64,

    /// Frames decoded and applied by the engine
    pub frames_ingested: u64,

    /// Frames the decoder rejected
    pub frames_rejected: u64,

    pub counter_anomalies: u64,

    pub active_sources: usize,

    pub active_sinks: usize,

    /// Every device the engine registered, ordered by id
    pub devices: Vec<DeviceSummary>,

    /// Final per-sink counters
    pub sink_report: Vec<(String, MetricsSnapshot)>,

    pub telemetry: SnapshotAggregator,
}

impl PipelineStats {
    /// Frames per second received from all sources
    pub fn frame_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Ingestion drop rate as percentage
    pub fn drop_rate(&self) -> f64 {
        if self.frames_received > 0 {
            (self.frames_dropped as f64 / self.frames_received as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {}", self.ticks);
        println!("   ├─ Snapshots published: {}", self.snapshots_published);
        println!("   ├─ Active sources: {}", self.active_sources);
        println!("   └─ Active sinks: {}", self.active_sinks);

        println!("\n📡 Frames");
        println!("   ├─ Received: {} ({:.1}/s)", self.frames_received, self.frame_rate());
        println!(
            "   ├─ Dropped (queue full): {} ({:.2}%)",
            self.frames_dropped,
            self.drop_rate()
        );
        println!("   ├─ Applied: {}", self.frames_ingested);
        println!("   ├─ Rejected: {}", self.frames_rejected);
        println!("   └─ Counter anomalies: {}", self.counter_anomalies);

        if !self.devices.is_empty() {
            println!("\n🔌 Devices");
            for (i, device) in self.devices.iter().enumerate() {
                let prefix = if i == self.devices.len() - 1 { "└─" } else { "├─" };
                println!(
                    "   {} {:>5} {:<14} {} frames, last seen {:.1}s",
                    prefix,
                    device.device_id,
                    device.device_type,
                    device.observations,
                    device.last_seen
                );
            }
        }

        if !self.sink_report.is_empty() {
            println!("\n📤 Sinks");
            for (i, (name, metrics)) in self.sink_report.iter().enumerate() {
                let prefix = if i == self.sink_report.len() - 1 { "└─" } else { "├─" };
                println!("   {} {}: {}", prefix, name, metrics);
            }
        }

        println!("\n{}", self.telemetry.summary());
    }
}
