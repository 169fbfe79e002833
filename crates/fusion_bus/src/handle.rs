//! SinkHandle - one sink with its own drop-oldest queue and worker task

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, trace};

use contracts::{Snapshot, SnapshotSink};

use crate::metrics::{MetricsSnapshot, SinkMetrics};

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: Sender<Arc<Snapshot>>,
    metrics: Arc<SinkMetrics>,
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker for `sink` with a queue of `queue_capacity` snapshots.
    pub fn spawn<S: SnapshotSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = async_channel::bounded(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a snapshot without waiting.
    ///
    /// A full queue evicts its oldest entry. Returns false once the worker
    /// is gone.
    pub fn offer(&self, snapshot: Arc<Snapshot>) -> bool {
        match self.tx.force_send(snapshot) {
            Ok(None) => {
                self.metrics.set_queue_len(self.tx.len());
                true
            }
            Ok(Some(evicted)) => {
                self.metrics.inc_overwritten();
                metrics::counter!("ant_fusion_sink_overwritten_total", "sink" => self.name.clone())
                    .increment(1);
                trace!(sink = %self.name, tick_id = evicted.tick_id, "sink behind, dropped oldest snapshot");
                true
            }
            Err(_) => {
                error!(sink = %self.name, "sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Close the queue, let the worker drain it, then flush and close the sink.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) -> MetricsSnapshot {
        self.tx.close();
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "worker task panicked");
        }
        debug!(sink = %self.name, "sink handle shut down");
        self.metrics.snapshot()
    }

    /// Close the queue without waiting for the worker.
    pub(crate) fn close(&self) {
        self.tx.close();
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics), fields(sink = %name))]
async fn sink_worker<S: SnapshotSink>(
    mut sink: S,
    rx: Receiver<Arc<Snapshot>>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "sink worker started");

    // recv keeps yielding queued snapshots after close
    while let Ok(snapshot) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        match sink.write(&snapshot).await {
            Ok(()) => {
                metrics.inc_delivered();
            }
            Err(e) => {
                metrics.inc_failed();
                metrics::counter!("ant_fusion_sink_failures_total", "sink" => name.clone())
                    .increment(1);
                error!(
                    sink = %name,
                    tick_id = snapshot.tick_id,
                    error = %e,
                    "write failed"
                );
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "close failed on shutdown");
    }

    debug!(sink = %name, "sink worker stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use contracts::ContractError;
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    /// Records tick ids; optionally slow or failing
    pub(crate) struct RecordingSink {
        pub name: String,
        pub seen: Arc<Mutex<Vec<u64>>>,
        pub closed: Arc<Mutex<bool>>,
        pub delay_ms: u64,
        pub should_fail: bool,
    }

    impl RecordingSink {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                seen: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(false)),
                delay_ms: 0,
                should_fail: false,
            }
        }
    }

    impl SnapshotSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.seen.lock().unwrap().push(snapshot.tick_id);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    pub(crate) fn make_snapshot(tick_id: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot {
            tick_id,
            timestamp: tick_id as f64,
            users: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_sink_handle_delivers_and_closes() {
        let sink = RecordingSink::new("test");
        let seen = Arc::clone(&sink.seen);
        let closed = Arc::clone(&sink.closed);

        let handle = SinkHandle::spawn(sink, 10);
        for i in 1..=5 {
            assert!(handle.offer(make_snapshot(i)));
        }

        let metrics = handle.shutdown().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(metrics.delivered, 5);
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_slow_sink_keeps_latest() {
        let mut sink = RecordingSink::new("slow");
        sink.delay_ms = 50;
        let seen = Arc::clone(&sink.seen);

        let handle = SinkHandle::spawn(sink, 2);
        for i in 1..=10 {
            handle.offer(make_snapshot(i));
        }

        let metrics = handle.shutdown().await;
        let seen = seen.lock().unwrap();
        assert!(metrics.overwritten > 0);
        assert_eq!(seen.last().copied(), Some(10));
        assert!(seen.len() < 10);
        assert_eq!(metrics.delivered + metrics.overwritten, 10);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut sink = RecordingSink::new("failing");
        sink.should_fail = true;

        let handle = SinkHandle::spawn(sink, 10);
        for i in 1..=3 {
            handle.offer(make_snapshot(i));
        }
        sleep(Duration::from_millis(50)).await;

        assert_eq!(handle.metrics().failed(), 3);
        handle.shutdown().await;
    }
}
