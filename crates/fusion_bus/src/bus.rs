//! Fusion bus - fan-out of snapshots to sinks

use std::sync::Arc;

use contracts::{FusionBlueprint, SinkConfig, SinkType, Snapshot, SnapshotSink};
use tracing::{debug, info, instrument};

use crate::error::BusError;
use crate::handle::SinkHandle;
use crate::metrics::MetricsSnapshot;
use crate::sinks::{FileSink, LogSink, MqttSink, TerminalSink, UserTopics};

/// Fans every snapshot out to independent sink workers.
///
/// `publish` never waits: each sink has its own bounded queue that drops the
/// oldest snapshot when the sink falls behind.
#[derive(Default)]
pub struct FusionBus {
    handles: Vec<SinkHandle>,
    published: u64,
}

impl FusionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bus with one sink per configured entry.
    #[instrument(
        name = "fusion_bus_from_blueprint",
        skip(blueprint),
        fields(sink_count = blueprint.sinks.len())
    )]
    pub async fn from_blueprint(blueprint: &FusionBlueprint) -> Result<Self, BusError> {
        let topics = UserTopics::from_blueprint(blueprint);
        let mut bus = Self::new();
        for config in &blueprint.sinks {
            bus.handles.push(create_sink_handle(config, &topics).await?);
        }
        Ok(bus)
    }

    /// Register a sink with its own worker and queue.
    pub fn subscribe<S: SnapshotSink + Send + 'static>(&mut self, sink: S, queue_capacity: usize) {
        info!(sink = %sink.name(), queue_capacity, "sink subscribed");
        self.handles.push(SinkHandle::spawn(sink, queue_capacity));
    }

    /// Hand a snapshot to every sink.
    pub fn publish(&mut self, snapshot: Arc<Snapshot>) {
        self.published += 1;
        for handle in &self.handles {
            handle.offer(Arc::clone(&snapshot));
        }

        if self.published.is_multiple_of(100) {
            debug!(published = self.published, "bus progress");
        }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Close every queue, wait for the workers to drain, flush and close
    /// their sinks. Returns the final per-sink counters.
    #[instrument(name = "fusion_bus_shutdown", skip(self), fields(sinks = self.handles.len()))]
    pub async fn shutdown(self) -> Vec<(String, MetricsSnapshot)> {
        for handle in &self.handles {
            handle.close();
        }

        let mut report = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            let name = handle.name().to_string();
            let metrics = handle.shutdown().await;
            info!(sink = %name, %metrics, "sink closed");
            report.push((name, metrics));
        }

        info!(published = self.published, "fusion bus shut down");
        report
    }
}

#[instrument(
    name = "fusion_bus_create_sink_handle",
    skip(config, topics),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
async fn create_sink_handle(config: &SinkConfig, topics: &UserTopics) -> Result<SinkHandle, BusError> {
    let capacity = config.queue_capacity;
    match config.sink_type {
        SinkType::Log => Ok(SinkHandle::spawn(LogSink::new(&config.name), capacity)),
        SinkType::File => {
            let sink = FileSink::from_params(&config.name, &config.params)
                .map_err(|e| BusError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, capacity))
        }
        SinkType::Terminal => Ok(SinkHandle::spawn(TerminalSink::stdout(&config.name), capacity)),
        SinkType::Mqtt => {
            let sink = MqttSink::from_params(&config.name, &config.params, topics.clone())
                .map_err(|e| BusError::sink_creation(&config.name, e.to_string()))?;
            Ok(SinkHandle::spawn(sink, capacity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::tests::{make_snapshot, RecordingSink};
    use contracts::{ConfigVersion, FusionConfig, UserConfig};
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_fanout_to_all_sinks() {
        let a = RecordingSink::new("a");
        let b = RecordingSink::new("b");
        let (seen_a, seen_b) = (Arc::clone(&a.seen), Arc::clone(&b.seen));

        let mut bus = FusionBus::new();
        bus.subscribe(a, 8);
        bus.subscribe(b, 8);

        for i in 1..=3 {
            bus.publish(make_snapshot(i));
        }
        let report = bus.shutdown().await;

        assert_eq!(*seen_a.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(*seen_b.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, m)| m.delivered == 3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_sink_does_not_delay_fast_sink() {
        let fast = RecordingSink::new("fast");
        let mut slow = RecordingSink::new("slow");
        slow.delay_ms = 200;
        let seen_fast = Arc::clone(&fast.seen);
        let seen_slow = Arc::clone(&slow.seen);

        let mut bus = FusionBus::new();
        bus.subscribe(fast, 4);
        bus.subscribe(slow, 1);

        let started = Instant::now();
        for i in 1..=20 {
            bus.publish(make_snapshot(i));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // publish never waited on the slow sink
        assert!(started.elapsed() < Duration::from_millis(1000));

        // fast sink is caught up while slow is still on its first writes
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(seen_fast.lock().unwrap().len(), 20);
        assert!(seen_slow.lock().unwrap().len() < 20);

        bus.shutdown().await;
        assert_eq!(seen_slow.lock().unwrap().last().copied(), Some(20));
    }

    #[tokio::test]
    async fn test_from_blueprint_creates_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        let blueprint = FusionBlueprint {
            version: ConfigVersion::V1,
            fusion: FusionConfig::default(),
            users: vec![UserConfig {
                name: "alice".to_string(),
                hr_device_ids: vec![contracts::DeviceId::new(11)],
                ..Default::default()
            }],
            shared_bike: None,
            sinks: vec![
                SinkConfig {
                    name: "log".to_string(),
                    sink_type: SinkType::Log,
                    queue_capacity: 4,
                    params: HashMap::new(),
                },
                SinkConfig {
                    name: "file".to_string(),
                    sink_type: SinkType::File,
                    queue_capacity: 4,
                    params: HashMap::from([(
                        "path".to_string(),
                        path.to_string_lossy().to_string(),
                    )]),
                },
            ],
        };

        let mut bus = FusionBus::from_blueprint(&blueprint).await.unwrap();
        assert_eq!(bus.sink_count(), 2);

        bus.publish(make_snapshot(1));
        bus.shutdown().await;

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_file_sink_requires_path() {
        let config = SinkConfig {
            name: "file".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 4,
            params: HashMap::new(),
        };
        let err = create_sink_handle(&config, &UserTopics::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BusError::SinkCreation { .. }));
    }
}
