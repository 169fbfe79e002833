//! Device registry
//!
//! Sole owner of per-device state. Devices are registered on their first
//! frame and never removed.

use std::collections::HashMap;
use std::fmt;

use contracts::{DeviceId, DeviceType, RevolutionCounter, Sample};
use ingestion::payload::EVENT_TIME_HZ;
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// RR intervals kept per heart-rate device
pub const RR_HISTORY_LEN: usize = 10;

/// Change of one cumulative counter between two observations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterDelta {
    /// Revolutions since the previous observation (wrap-corrected)
    pub revolutions: u16,

    /// Event-time delta in seconds (wrap-corrected)
    pub seconds: f64,
}

impl CounterDelta {
    pub fn between(previous: RevolutionCounter, current: RevolutionCounter) -> Self {
        let ticks = current.event_time.wrapping_sub(previous.event_time);
        Self {
            revolutions: current.revolutions.wrapping_sub(previous.revolutions),
            seconds: f64::from(ticks) / EVENT_TIME_HZ,
        }
    }
}

/// Deltas against the previous observation of the same device
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeltaEvent {
    pub wheel: Option<CounterDelta>,
    pub crank: Option<CounterDelta>,

    /// Seconds between the previous and this observation (reception time)
    pub gap_s: f64,
}

/// Result of [`DeviceRegistry::observe`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Observation {
    /// Device registered (or re-registered) by this frame
    First,
    Delta(DeltaEvent),
}

struct DeviceRecord {
    device_type: DeviceType,
    first_seen: f64,
    last_seen: f64,
    last_sample: Sample,
    observations: u64,
    rr_history: HeapRb<f64>,
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("device_type", &self.device_type)
            .field("last_seen", &self.last_seen)
            .field("observations", &self.observations)
            .field("rr_len", &self.rr_history.occupied_len())
            .finish()
    }
}

impl DeviceRecord {
    fn new(device_type: DeviceType, sample: &Sample, now: f64) -> Self {
        let mut record = Self {
            device_type,
            first_seen: now,
            last_seen: now,
            last_sample: sample.clone(),
            observations: 1,
            rr_history: HeapRb::new(RR_HISTORY_LEN),
        };
        record.push_rr(sample);
        record
    }

    fn push_rr(&mut self, sample: &Sample) {
        if let Sample::HeartRate(hr) = sample {
            for rr in &hr.rr_intervals {
                self.rr_history.push_overwrite(rr.as_secs_f64() * 1000.0);
            }
        }
    }
}

/// Read-only view of a registered device
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSummary {
    pub device_id: DeviceId,
    pub device_type: DeviceType,
    pub first_seen: f64,
    pub last_seen: f64,
    pub observations: u64,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceId, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a decoded sample.
    ///
    /// Counter deltas are computed modulo 2^16. A device that re-appears with
    /// another profile is registered from scratch.
    pub fn observe(
        &mut self,
        device_id: DeviceId,
        device_type: DeviceType,
        sample: &Sample,
        now: f64,
    ) -> Observation {
        let Some(record) = self.devices.get_mut(&device_id) else {
            debug!(device_id = %device_id, device_type = %device_type, "new device");
            self.devices
                .insert(device_id, DeviceRecord::new(device_type, sample, now));
            return Observation::First;
        };

        if record.device_type != device_type {
            warn!(
                device_id = %device_id,
                from = %record.device_type,
                to = %device_type,
                "device changed profile, re-registering"
            );
            *record = DeviceRecord::new(device_type, sample, now);
            return Observation::First;
        }

        let mut delta = DeltaEvent {
            gap_s: (now - record.last_seen).max(0.0),
            ..DeltaEvent::default()
        };

        if let (Some(previous), Some(current)) = (
            record.last_sample.as_cadence_speed(),
            sample.as_cadence_speed(),
        ) {
            delta.wheel = previous
                .wheel
                .zip(current.wheel)
                .map(|(old, new)| CounterDelta::between(old, new));
            delta.crank = previous
                .crank
                .zip(current.crank)
                .map(|(old, new)| CounterDelta::between(old, new));
        }

        record.push_rr(sample);
        record.last_sample = sample.clone();
        record.last_seen = record.last_seen.max(now);
        record.observations += 1;

        Observation::Delta(delta)
    }

    pub fn last_seen(&self, device_id: DeviceId) -> Result<f64> {
        self.devices
            .get(&device_id)
            .map(|record| record.last_seen)
            .ok_or(EngineError::DeviceNotFound { device_id })
    }

    /// Seen within `stale_secs` of `now` (inclusive)
    pub fn is_fresh(&self, device_id: DeviceId, now: f64, stale_secs: f64) -> bool {
        self.last_seen(device_id)
            .is_ok_and(|seen| now - seen <= stale_secs)
    }

    pub fn last_sample(&self, device_id: DeviceId) -> Option<Sample> {
        self.devices
            .get(&device_id)
            .map(|record| record.last_sample.clone())
    }

    /// Most recent RR intervals (ms), oldest first
    pub fn rr_history_ms(&self, device_id: DeviceId) -> Vec<f64> {
        self.devices
            .get(&device_id)
            .map(|record| record.rr_history.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn summary(&self, device_id: DeviceId) -> Option<DeviceSummary> {
        self.devices.get(&device_id).map(|record| DeviceSummary {
            device_id,
            device_type: record.device_type,
            first_seen: record.first_seen,
            last_seen: record.last_seen,
            observations: record.observations,
        })
    }

    /// All devices, ordered by id
    pub fn summaries(&self) -> Vec<DeviceSummary> {
        let mut ids: Vec<_> = self.devices.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().filter_map(|id| self.summary(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
