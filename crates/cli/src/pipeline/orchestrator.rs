//! Pipeline orchestrator - coordinates all components.
//!
//! Frames come from simulated devices (one per configured device-id) or from
//! a recorded trace when a replay path is given.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{DeviceId, DeviceType, FrameSource, FusionBlueprint};
use fusion_bus::FusionBus;
use fusion_engine::{EngineRunner, FusionEngine, RunnerConfig};
use ingestion::{
    IngestionPipeline, MockDeviceConfig, MockFrameSource, MonotonicClock, ReplayConfig,
    ReplayFrameSource,
};
use observability::{record_queue_depth, record_snapshot_metrics, SnapshotAggregator};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

const BUS_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub blueprint: FusionBlueprint,

    /// Stop after this many snapshots (None = unlimited)
    pub max_ticks: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Ingestion queue capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Recorded frames to replay instead of simulated devices
    pub replay_path: Option<PathBuf>,

    pub replay_speed: f64,

    pub replay_loop: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `shutdown` resolves, the timeout expires or the tick limit
    /// is reached. A final snapshot is published on shutdown and timeout.
    #[instrument(
        name = "pipeline_run",
        skip_all,
        fields(users = self.config.blueprint.users.len(), sinks = self.config.blueprint.sinks.len())
    )]
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        // Ingestion
        let clock = MonotonicClock::new();
        let mut ingestion = IngestionPipeline::new(self.config.buffer_size);
        for source in self.build_sources(clock)? {
            ingestion
                .register_source(source)
                .context("Failed to register frame source")?;
        }
        let active_sources = ingestion.source_count();
        info!(active_sources, "Ingestion pipeline configured");

        // Engine
        let engine_config = blueprint.to_engine_config();
        info!(
            users = engine_config.users.len(),
            stale_secs = engine_config.stale_secs,
            wheel_circumference_m = engine_config.wheel_circumference_m,
            "Fusion engine configured"
        );
        let engine = FusionEngine::new(engine_config);

        // Bus
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - snapshots will only be counted");
        }
        let mut bus = FusionBus::from_blueprint(blueprint)
            .await
            .context("Failed to create fusion bus")?;
        let active_sinks = bus.sink_count();
        info!(active_sinks, "Fusion bus started");

        ingestion.start_all();
        let frames = ingestion
            .take_receiver()
            .ok_or_else(|| CliError::pipeline_execution("ingestion receiver already taken"))?;

        let runner = EngineRunner::new(
            engine,
            frames,
            clock,
            RunnerConfig {
                tick_interval: Duration::from_secs_f64(blueprint.fusion.fusion_interval_secs),
                max_ticks: self.config.max_ticks,
            },
        );

        info!(max_ticks = ?self.config.max_ticks, timeout = ?self.config.timeout, "Pipeline running");

        let ingestion_metrics = ingestion.metrics();
        let mut telemetry = SnapshotAggregator::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let timeout = self.config.timeout;

        let engine = {
            let run = runner.run(shutdown_rx, |snapshot| {
                record_snapshot_metrics(&snapshot);
                record_queue_depth(ingestion_metrics.snapshot().queue_len);
                telemetry.update(&snapshot);
                bus.publish(snapshot);
            });
            tokio::pin!(run);

            let stop = async {
                match timeout {
                    Some(limit) => tokio::select! {
                        _ = shutdown => info!("Shutdown requested"),
                        _ = tokio::time::sleep(limit) => {
                            warn!(timeout_secs = limit.as_secs(), "Pipeline timed out");
                        }
                    },
                    None => {
                        shutdown.await;
                        info!("Shutdown requested");
                    }
                }
            };
            tokio::pin!(stop);

            tokio::select! {
                engine = &mut run => engine,
                _ = &mut stop => {
                    let _ = shutdown_tx.send(true);
                    (&mut run).await
                }
            }
        };

        // Shutdown
        info!("Shutting down pipeline...");
        ingestion.stop_all();

        let published = bus.published();
        let sink_report = match tokio::time::timeout(BUS_SHUTDOWN_TIMEOUT, bus.shutdown()).await {
            Ok(report) => report,
            Err(_) => {
                warn!("Sinks did not drain in time");
                Vec::new()
            }
        };

        let ingestion_stats = ingestion_metrics.snapshot();
        let engine_stats = engine.stats();
        let devices = engine.registry().summaries();
        for device in &devices {
            debug!(
                device_id = %device.device_id,
                device_type = %device.device_type,
                observations = device.observations,
                last_seen = device.last_seen,
                "Device seen"
            );
        }
        let stats = PipelineStats {
            duration: start_time.elapsed(),
            ticks: engine_stats.ticks,
            snapshots_published: published,
            frames_received: ingestion_stats.frames_received,
            frames_dropped: ingestion_stats.frames_dropped,
            frames_ingested: engine_stats.frames_ingested,
            frames_rejected: engine_stats.frames_rejected,
            counter_anomalies: engine_stats.counter_anomalies,
            devices,
            active_sources,
            active_sinks,
            sink_report,
            telemetry,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            ticks = stats.ticks,
            frames = stats.frames_received,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }

    fn build_sources(&self, clock: MonotonicClock) -> Result<Vec<Box<dyn FrameSource>>> {
        if let Some(path) = &self.config.replay_path {
            info!(path = %path.display(), speed = self.config.replay_speed, "Running in REPLAY mode");
            let replay = ReplayFrameSource::load(
                path,
                ReplayConfig {
                    speed_multiplier: self.config.replay_speed,
                    loop_playback: self.config.replay_loop,
                },
                clock,
            )
            .with_context(|| format!("Failed to load replay from {}", path.display()))?;
            return Ok(vec![Box::new(replay)]);
        }

        info!("Running in MOCK mode (simulated devices)");
        Ok(mock_device_plan(&self.config.blueprint)
            .into_iter()
            .map(|config| Box::new(MockFrameSource::new(config, clock)) as Box<dyn FrameSource>)
            .collect())
    }
}

/// One simulated device per configured device-id.
///
/// A device configured as both speed and cadence sensor is simulated as a
/// combined speed & cadence sensor.
pub fn mock_device_plan(blueprint: &FusionBlueprint) -> Vec<MockDeviceConfig> {
    let mut devices: BTreeMap<DeviceId, (DeviceType, f64)> = BTreeMap::new();

    let bike_pairs = blueprint
        .users
        .iter()
        .map(|u| (u.speed_device_id, u.cadence_device_id))
        .chain(
            blueprint
                .shared_bike
                .iter()
                .map(|b| (b.speed_device_id, b.cadence_device_id)),
        );
    for (speed, cadence) in bike_pairs {
        match (speed, cadence) {
            (Some(s), Some(c)) if s == c => {
                devices.insert(s, (DeviceType::SpeedCadence, 0.0));
            }
            (s, c) => {
                if let Some(s) = s {
                    devices.entry(s).or_insert((DeviceType::Speed, 0.0));
                }
                if let Some(c) = c {
                    devices.entry(c).or_insert((DeviceType::Cadence, 0.0));
                }
            }
        }
    }

    for (index, user) in blueprint.users.iter().enumerate() {
        let bpm = 70.0 + 12.0 * index as f64;
        for id in user.heart_rate_candidates() {
            devices.entry(id).or_insert((DeviceType::HeartRate, bpm));
        }
    }

    devices
        .into_iter()
        .map(|(id, (device_type, bpm))| {
            let mut config = MockDeviceConfig::new(id.get(), device_type);
            config.wheel_circumference_m = blueprint.fusion.wheel_circumference_m;
            if device_type == DeviceType::HeartRate {
                config.base_bpm = bpm;
            }
            config
        })
        .collect()
}
