//! Frame source adapter
//!
//! Bridges a [`FrameSource`] callback into the shared ingestion queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use contracts::{FrameCallback, FrameSource, RawFrame};
use tracing::{debug, trace, warn};

use crate::config::IngestionMetrics;

/// Wraps one registered source.
pub struct SourceAdapter {
    source_id: String,
    source: Box<dyn FrameSource>,
    listening: Arc<AtomicBool>,
}

impl SourceAdapter {
    pub fn new(source_id: String, source: Box<dyn FrameSource>) -> Self {
        Self {
            source_id,
            source,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(&self, tx: Sender<RawFrame>, metrics: Arc<IngestionMetrics>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let source_id = self.source_id.clone();
        let listening = self.listening.clone();

        debug!(source_id = %source_id, "starting frame source");

        let callback: FrameCallback = Arc::new(move |frame| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }

            metrics.record_received();
            enqueue_frame(&tx, frame, &metrics, &source_id);
        });

        self.source.listen(callback);
    }

    pub fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(source_id = %self.source_id, "stopping frame source");
            self.source.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed) && self.source.is_listening()
    }
}

/// Enqueue without blocking; a full queue drops the incoming frame.
#[inline]
pub(crate) fn enqueue_frame(
    tx: &Sender<RawFrame>,
    frame: RawFrame,
    metrics: &IngestionMetrics,
    source_id: &str,
) {
    match tx.try_send(frame) {
        Ok(()) => {
            metrics.update_queue_len(tx.len());
            trace!(source_id = %source_id, "frame queued");
        }
        Err(TrySendError::Full(frame)) => {
            metrics.record_dropped();
            metrics::counter!("ant_fusion_frames_dropped_total", "reason" => "queue_full").increment(1);
            trace!(source_id = %source_id, device_id = %frame.device_id, "queue full, frame dropped");
        }
        Err(TrySendError::Closed(_)) => {
            metrics.record_dropped();
            warn!(source_id = %source_id, "ingestion channel closed");
        }
    }
}
