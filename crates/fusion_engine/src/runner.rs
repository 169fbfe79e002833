//! Engine task
//!
//! Owns the [`FusionEngine`] and serializes frame ingestion with periodic
//! ticks on a single tokio task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_channel::Receiver;
use contracts::{RawFrame, Snapshot};
use ingestion::MonotonicClock;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::engine::FusionEngine;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Time between ticks
    pub tick_interval: Duration,

    /// Stop after this many ticks (None = until shutdown)
    pub max_ticks: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Shutdown,
    MaxTicks,
}

pub struct EngineRunner {
    engine: FusionEngine,
    frames: Receiver<RawFrame>,
    clock: MonotonicClock,
    config: RunnerConfig,
}

impl EngineRunner {
    pub fn new(
        engine: FusionEngine,
        frames: Receiver<RawFrame>,
        clock: MonotonicClock,
        config: RunnerConfig,
    ) -> Self {
        Self {
            engine,
            frames,
            clock,
            config,
        }
    }

    /// Run until `shutdown` flips to true (or its sender is dropped) or the
    /// tick limit is reached, handing every snapshot to `publish`.
    ///
    /// On shutdown one final snapshot is published. The engine is returned
    /// for inspection.
    pub async fn run<F>(mut self, mut shutdown: watch::Receiver<bool>, mut publish: F) -> FusionEngine
    where
        F: FnMut(Arc<Snapshot>),
    {
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut frames_open = true;

        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            max_ticks = ?self.config.max_ticks,
            "engine task started"
        );

        let reason = loop {
            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break StopReason::Shutdown;
                    }
                }

                _ = ticker.tick() => {
                    self.tick_and_publish(&mut publish);
                    if self
                        .config
                        .max_ticks
                        .is_some_and(|max| self.engine.tick_count() >= max)
                    {
                        break StopReason::MaxTicks;
                    }
                }

                frame = self.frames.recv(), if frames_open => match frame {
                    Ok(frame) => {
                        if let Err(err) = self.engine.ingest(&frame) {
                            trace!(error = %err, "frame not applied");
                        }
                    }
                    Err(_) => {
                        debug!("ingestion queue closed, ticking on");
                        frames_open = false;
                    }
                },
            }
        };

        if reason == StopReason::Shutdown {
            debug!("publishing final snapshot");
            self.tick_and_publish(&mut publish);
        }

        let stats = self.engine.stats();
        info!(
            ?reason,
            ticks = stats.ticks,
            frames = stats.frames_ingested,
            rejected = stats.frames_rejected,
            anomalies = stats.counter_anomalies,
            "engine task stopped"
        );

        self.engine
    }

    fn tick_and_publish<F>(&mut self, publish: &mut F)
    where
        F: FnMut(Arc<Snapshot>),
    {
        let started = Instant::now();
        let snapshot = self.engine.tick(self.clock.now());
        metrics::histogram!("ant_fusion_tick_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        metrics::counter!("ant_fusion_ticks_total").increment(1);

        publish(Arc::new(snapshot));
    }
}
