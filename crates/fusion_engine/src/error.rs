//! Fusion engine errors

use contracts::DeviceId;
use ingestion::DecodeError;
use thiserror::Error;

/// Implausible counter delta. The derived metric for that event is dropped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CounterAnomaly {
    #[error("speed {speed_kmh:.1} km/h exceeds {limit:.1} km/h")]
    SpeedOutOfRange { speed_kmh: f64, limit: f64 },

    #[error("cadence {cadence_rpm:.1} rpm exceeds {limit:.1} rpm")]
    CadenceOutOfRange { cadence_rpm: f64, limit: f64 },

    #[error("gap of {gap_s:.1}s since previous frame exceeds {limit:.1}s, counters ambiguous")]
    GapTooLong { gap_s: f64, limit: f64 },
}

impl CounterAnomaly {
    /// Short label used as a metric dimension
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpeedOutOfRange { .. } => "speed",
            Self::CadenceOutOfRange { .. } => "cadence",
            Self::GapTooLong { .. } => "gap",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("device {device_id} has never been observed")]
    DeviceNotFound { device_id: DeviceId },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("counter anomaly on device {device_id}: {anomaly}")]
    CounterAnomaly {
        device_id: DeviceId,
        #[source]
        anomaly: CounterAnomaly,
    },
}

pub type Result<T> = std::result::Result<T, EngineError>;
