//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Backpressure configuration
///
/// The ingestion queue never blocks a source: when it is full the incoming
/// frame is dropped and counted.
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    /// Channel capacity
    pub channel_capacity: usize,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl BackpressureConfig {
    pub fn new(channel_capacity: usize) -> Self {
        Self { channel_capacity }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total frames handed over by sources
    pub frames_received: AtomicU64,

    /// Frames dropped because the queue was full or closed
    pub frames_dropped: AtomicU64,

    /// Queue length after the last enqueue
    pub queue_len: AtomicUsize,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_dropped: u64,
    pub queue_len: usize,
}
