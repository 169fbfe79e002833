//! Sample - Frame Decoder output
//!
//! Typed, immutable view of one decoded frame.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decoded sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Sample {
    /// Heart-rate monitor page
    HeartRate(HeartRateSample),

    /// Speed, cadence or combined speed/cadence page
    CadenceSpeed(CadenceSpeedSample),
}

/// Heart-rate sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateSample {
    /// Computed heart rate (BPM)
    pub bpm: u8,

    /// Heart-beat count, wraps at 256
    pub beat_count: u8,

    /// Last heart-beat event time (1/1024 s, wraps at 2^16)
    pub beat_event_time: u16,

    /// RR intervals new since the previous frame of the same device, oldest first
    pub rr_intervals: Vec<Duration>,
}

/// Cumulative revolution counter with its event time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevolutionCounter {
    /// Cumulative revolutions (wraps at 2^16)
    pub revolutions: u16,

    /// Event time of the last revolution (1/1024 s, wraps at 2^16)
    pub event_time: u16,
}

/// Bike speed / cadence sample
///
/// Single-purpose sensors leave the other half empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceSpeedSample {
    pub wheel: Option<RevolutionCounter>,
    pub crank: Option<RevolutionCounter>,
}

impl Sample {
    pub fn as_heart_rate(&self) -> Option<&HeartRateSample> {
        match self {
            Self::HeartRate(hr) => Some(hr),
            Self::CadenceSpeed(_) => None,
        }
    }

    pub fn as_cadence_speed(&self) -> Option<&CadenceSpeedSample> {
        match self {
            Self::CadenceSpeed(cs) => Some(cs),
            Self::HeartRate(_) => None,
        }
    }
}
