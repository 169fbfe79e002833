//! Per-sink delivery counters

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters for a single sink, shared between the bus and the sink worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    queue_len: AtomicUsize,
    /// Snapshots written successfully
    delivered: AtomicU64,
    /// Snapshots the sink failed to write
    failed: AtomicU64,
    /// Queued snapshots replaced by newer ones before the sink got to them
    overwritten: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_len(&self) -> usize {
        self.queue_len.load(Ordering::Relaxed)
    }

    pub fn set_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn inc_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn overwritten(&self) -> u64 {
        self.overwritten.load(Ordering::Relaxed)
    }

    pub fn inc_overwritten(&self) {
        self.overwritten.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queue_len: self.queue_len(),
            delivered: self.delivered(),
            failed: self.failed(),
            overwritten: self.overwritten(),
        }
    }
}

/// Point-in-time copy of [`SinkMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub queue_len: usize,
    pub delivered: u64,
    pub failed: u64,
    pub overwritten: u64,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delivered={} failed={} overwritten={}",
            self.delivered, self.failed, self.overwritten
        )
    }
}
