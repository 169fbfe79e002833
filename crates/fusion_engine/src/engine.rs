//! Fusion engine: frame ingestion and per-tick snapshot assembly

use std::collections::HashMap;

use contracts::{
    BikeState, DeviceId, EngineConfig, HeartRateState, RawFrame, Role, Sample, Snapshot,
    UserState,
};
use ingestion::{DecodeError, FrameDecoder};
use tracing::{debug, instrument, warn};

use crate::error::{EngineError, Result};
use crate::metrics_computer::{compute_bike_metrics, compute_heart_rate};
use crate::registry::{DeltaEvent, DeviceRegistry, Observation};
use crate::resolver::UserResolver;
use crate::staleness::StalenessTracker;

/// Seconds an unchanged event time may repeat before the wheel or crank
/// counts as stopped (ANT+ zero-speed timeout).
const ZERO_RATE_TIMEOUT_SECS: f64 = 3.0;

/// Last good readings of one device
#[derive(Debug, Clone, Copy, Default)]
struct DeviceReadings {
    bpm: Option<u8>,
    speed_kmh: Option<f64>,
    cadence_rpm: Option<f64>,
    /// Reception time of the last frame whose wheel event time advanced
    wheel_moved_at: Option<f64>,
    crank_moved_at: Option<f64>,
}

impl DeviceReadings {
    /// Apply one counter's rate. A repeated event time keeps the last rate
    /// until the zero-rate timeout, then reports the computed zero.
    fn apply_rate(
        rate: &mut Option<f64>,
        moved_at: &mut Option<f64>,
        seconds: f64,
        computed: Option<f64>,
        now: f64,
    ) {
        if seconds > 0.0 {
            *rate = computed;
            *moved_at = Some(now);
        } else if moved_at.map_or(true, |t| now - t >= ZERO_RATE_TIMEOUT_SECS) {
            *rate = computed;
        }
    }
}

/// Engine counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub frames_ingested: u64,
    pub frames_rejected: u64,
    pub counter_anomalies: u64,
    pub ticks: u64,
}

/// Telemetry fusion engine.
///
/// `ingest` folds frames into device state; `tick` resolves every user and
/// produces a snapshot. Both run on the same task so a tick never sees a
/// half-applied frame.
#[derive(Debug)]
pub struct FusionEngine {
    config: EngineConfig,
    decoder: FrameDecoder,
    registry: DeviceRegistry,
    resolver: UserResolver,
    tracker: StalenessTracker,
    readings: HashMap<DeviceId, DeviceReadings>,
    /// Distance per wheel device not yet credited to a user
    pending_distance_m: HashMap<DeviceId, f64>,
    trip_distance_m: Vec<f64>,
    tick_id: u64,
    stats: EngineStats,
}

impl FusionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let resolver = UserResolver::new(&config);
        let trip_distance_m = vec![0.0; config.users.len()];

        Self {
            config,
            decoder: FrameDecoder::new(),
            registry: DeviceRegistry::new(),
            resolver,
            tracker: StalenessTracker::new(),
            readings: HashMap::new(),
            pending_distance_m: HashMap::new(),
            trip_distance_m,
            tick_id: 0,
            stats: EngineStats::default(),
        }
    }

    /// Decode a frame and fold it into device state.
    ///
    /// Rejected frames and implausible counter deltas come back as errors;
    /// none of them leave the engine in a worse state than before the call.
    #[instrument(
        level = "trace",
        name = "fusion_engine_ingest",
        skip(self, frame),
        fields(device_id = %frame.device_id, device_type = frame.device_type)
    )]
    pub fn ingest(&mut self, frame: &RawFrame) -> Result<Observation> {
        let decoded = self.decoder.decode(frame).and_then(|sample| {
            frame
                .kind()
                .map(|kind| (kind, sample))
                .ok_or(DecodeError::UnsupportedDeviceType {
                    device_id: frame.device_id,
                    device_type: frame.device_type,
                })
        });

        let (device_type, sample) = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                self.stats.frames_rejected += 1;
                metrics::counter!("ant_fusion_frames_rejected_total", "reason" => err.kind())
                    .increment(1);
                return Err(err.into());
            }
        };

        self.stats.frames_ingested += 1;
        metrics::counter!(
            "ant_fusion_frames_decoded_total",
            "device_type" => device_type.to_string()
        )
        .increment(1);

        let device_id = frame.device_id;
        let observation = self
            .registry
            .observe(device_id, device_type, &sample, frame.timestamp);

        if observation == Observation::First {
            self.pending_distance_m.remove(&device_id);
            self.readings.insert(
                device_id,
                DeviceReadings {
                    wheel_moved_at: Some(frame.timestamp),
                    crank_moved_at: Some(frame.timestamp),
                    ..Default::default()
                },
            );
        }

        match (&sample, observation) {
            (Sample::HeartRate(hr), _) => {
                let metrics = compute_heart_rate(hr);
                self.readings.entry(device_id).or_default().bpm = Some(metrics.bpm);
            }
            (Sample::CadenceSpeed(_), Observation::Delta(delta)) => {
                self.apply_bike_delta(device_id, &delta, frame.timestamp)?;
            }
            (Sample::CadenceSpeed(_), Observation::First) => {}
        }

        Ok(observation)
    }

    fn apply_bike_delta(
        &mut self,
        device_id: DeviceId,
        delta: &DeltaEvent,
        now: f64,
    ) -> Result<()> {
        let computed = compute_bike_metrics(
            delta,
            self.config.wheel_circumference_m,
            &self.config.limits,
        );

        match computed {
            Ok(metrics) => {
                let readings = self.readings.entry(device_id).or_default();
                if let Some(wheel) = delta.wheel {
                    DeviceReadings::apply_rate(
                        &mut readings.speed_kmh,
                        &mut readings.wheel_moved_at,
                        wheel.seconds,
                        metrics.speed_kmh,
                        now,
                    );
                }
                if let Some(crank) = delta.crank {
                    DeviceReadings::apply_rate(
                        &mut readings.cadence_rpm,
                        &mut readings.crank_moved_at,
                        crank.seconds,
                        metrics.cadence_rpm,
                        now,
                    );
                }
                if metrics.distance_delta_m > 0.0 {
                    *self.pending_distance_m.entry(device_id).or_default() +=
                        metrics.distance_delta_m;
                }
                Ok(())
            }
            Err(anomaly) => {
                self.stats.counter_anomalies += 1;
                warn!(device_id = %device_id, %anomaly, "dropping implausible counter delta");
                metrics::counter!("ant_fusion_counter_anomalies_total", "kind" => anomaly.kind())
                    .increment(1);
                Err(EngineError::CounterAnomaly { device_id, anomaly })
            }
        }
    }

    /// Resolve every user and role at `now` and assemble a snapshot.
    #[instrument(level = "debug", name = "fusion_engine_tick", skip(self))]
    pub fn tick(&mut self, now: f64) -> Snapshot {
        self.tick_id += 1;
        self.stats.ticks += 1;

        let user_count = self.resolver.user_count();

        // Heart rate first: the shared bike rider depends on it.
        let heart_rate: Vec<_> = (0..user_count)
            .map(|user| {
                self.resolver
                    .resolve_active(user, Role::HeartRate, now, &self.registry)
            })
            .collect();
        self.resolver.update_shared_rider(&self.registry);

        let mut users = Vec::with_capacity(user_count);
        for (user, hr_device) in heart_rate.into_iter().enumerate() {
            let speed_device = self
                .resolver
                .resolve_active(user, Role::Speed, now, &self.registry);
            let cadence_device = self
                .resolver
                .resolve_active(user, Role::Cadence, now, &self.registry);

            let hr_status = self.tracker.evaluate(user, Role::HeartRate, hr_device);
            let speed_status = self.tracker.evaluate(user, Role::Speed, speed_device);
            let cadence_status = self.tracker.evaluate(user, Role::Cadence, cadence_device);

            if let Some(distance) = speed_device.and_then(|d| self.pending_distance_m.remove(&d)) {
                self.trip_distance_m[user] += distance;
            }

            let online = hr_status.is_available()
                || speed_status.is_available()
                || cadence_status.is_available();
            let online_changed = self.tracker.evaluate_online(user, online);

            users.push(UserState {
                name: self.resolver.user_name(user).unwrap_or_default().to_string(),
                heart_rate: HeartRateState {
                    bpm: self.reading(hr_device, |r| r.bpm),
                    rr_intervals_ms: hr_device
                        .map(|device| self.registry.rr_history_ms(device))
                        .unwrap_or_default(),
                    status: hr_status,
                },
                bike: BikeState {
                    speed_kmh: self.reading(speed_device, |r| r.speed_kmh),
                    cadence_rpm: self.reading(cadence_device, |r| r.cadence_rpm),
                    distance_m: self.trip_distance_m[user],
                    speed: speed_status,
                    cadence: cadence_status,
                },
                online,
                online_changed,
            });
        }

        // Wheel distance from devices nobody is riding is not credited later.
        self.pending_distance_m.clear();

        let online_users = users.iter().filter(|user| user.online).count();
        metrics::gauge!("ant_fusion_users_online").set(online_users as f64);
        debug!(
            tick_id = self.tick_id,
            users = users.len(),
            online_users,
            "tick assembled"
        );

        Snapshot {
            tick_id: self.tick_id,
            timestamp: now,
            users,
        }
    }

    fn reading<T>(
        &self,
        device: Option<DeviceId>,
        field: impl Fn(&DeviceReadings) -> Option<T>,
    ) -> Option<T> {
        device
            .and_then(|device| self.readings.get(&device))
            .and_then(field)
    }

    /// Zero a user's trip distance. Returns false for unknown users.
    pub fn reset_distance(&mut self, user_name: &str) -> bool {
        let Some(user) = (0..self.resolver.user_count())
            .find(|user| self.resolver.user_name(*user) == Some(user_name))
        else {
            return false;
        };
        self.trip_distance_m[user] = 0.0;
        debug!(user = %user_name, "trip distance reset");
        true
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_id
    }

    pub fn shared_rider(&self) -> Option<&str> {
        self.resolver.shared_rider()
    }
}
