//! Ingestion Pipeline main entry

use std::collections::BTreeMap;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use contracts::{FrameSource, RawFrame};
use tracing::{debug, info, instrument};

use crate::config::{BackpressureConfig, IngestionMetrics};
use crate::error::{IngestionError, Result};
use crate::source_adapter::SourceAdapter;

/// Ingestion Pipeline
///
/// Owns every registered frame source and the bounded queue they all feed.
/// The single consumer of [`take_receiver`](Self::take_receiver) is the
/// engine task.
pub struct IngestionPipeline {
    adapters: BTreeMap<String, SourceAdapter>,
    metrics: Arc<IngestionMetrics>,
    tx: Sender<RawFrame>,
    rx: Option<Receiver<RawFrame>>,
}

impl IngestionPipeline {
    /// Create a pipeline with the given queue capacity
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(BackpressureConfig::new(channel_capacity))
    }

    pub fn with_config(config: BackpressureConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));

        Self {
            adapters: BTreeMap::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx,
            rx: Some(rx),
        }
    }

    /// Register a frame source under its own id.
    ///
    /// # Errors
    /// `AlreadyRegistered` if a source with the same id exists.
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source),
        fields(source_id = %source.source_id())
    )]
    pub fn register_source(&mut self, source: Box<dyn FrameSource>) -> Result<()> {
        let source_id = source.source_id().to_string();
        if self.adapters.contains_key(&source_id) {
            return Err(IngestionError::AlreadyRegistered { source_id });
        }

        debug!(source_id = %source_id, "registered frame source");
        self.adapters
            .insert(source_id.clone(), SourceAdapter::new(source_id, source));
        Ok(())
    }

    /// Start all registered sources
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&self) {
        info!(count = self.adapters.len(), "starting all frame sources");
        for adapter in self.adapters.values() {
            adapter.start(self.tx.clone(), self.metrics.clone());
        }
    }

    /// Stop all sources
    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.adapters.len(), "stopping all frame sources");
        for adapter in self.adapters.values() {
            adapter.stop();
        }
    }

    /// Get the frame stream receiver
    ///
    /// Can only be called once, subsequent calls return None
    pub fn take_receiver(&mut self) -> Option<Receiver<RawFrame>> {
        self.rx.take()
    }

    /// Sender for frames injected outside any registered source
    pub fn sender(&self) -> Sender<RawFrame> {
        self.tx.clone()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// True while at least one source is still producing
    pub fn any_listening(&self) -> bool {
        self.adapters.values().any(SourceAdapter::is_listening)
    }

    pub fn is_source_listening(&self, source_id: &str) -> bool {
        self.adapters
            .get(source_id)
            .map(|a| a.is_listening())
            .unwrap_or(false)
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MonotonicClock;
    use crate::mock::MockFrameSource;
    use std::time::Duration;

    #[test]
    fn test_pipeline_creation() {
        let pipeline = IngestionPipeline::new(100);
        assert_eq!(pipeline.source_count(), 0);
        assert!(!pipeline.any_listening());
    }

    #[test]
    fn test_take_receiver_once() {
        let mut pipeline = IngestionPipeline::new(100);
        assert!(pipeline.take_receiver().is_some());
        assert!(pipeline.take_receiver().is_none());
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let clock = MonotonicClock::new();
        let mut pipeline = IngestionPipeline::new(16);
        pipeline
            .register_source(Box::new(MockFrameSource::heart_rate(1, 70.0, clock)))
            .unwrap();
        let err = pipeline
            .register_source(Box::new(MockFrameSource::heart_rate(1, 80.0, clock)))
            .unwrap_err();
        assert!(matches!(err, IngestionError::AlreadyRegistered { .. }));
    }

    #[tokio::test]
    async fn test_frames_reach_receiver() {
        let clock = MonotonicClock::new();
        let mut pipeline = IngestionPipeline::new(64);
        pipeline
            .register_source(Box::new(
                MockFrameSource::heart_rate(1, 70.0, clock).with_rate_hz(100.0),
            ))
            .unwrap();
        pipeline
            .register_source(Box::new(
                MockFrameSource::speed_cadence(2, 30.0, 90.0, clock).with_rate_hz(100.0),
            ))
            .unwrap();
        let rx = pipeline.take_receiver().unwrap();

        pipeline.start_all();
        assert!(pipeline.is_source_listening("mock-heart_rate-1"));

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(frame.device_type == 120 || frame.device_type == 121);

        pipeline.stop_all();
        assert!(pipeline.metrics().snapshot().frames_received > 0);
    }
}
