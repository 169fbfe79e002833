//! Physical metrics from counter deltas

use contracts::{HeartRateSample, PlausibilityLimits};

use crate::error::CounterAnomaly;
use crate::registry::DeltaEvent;

/// Rates derived from one delta event. Halves a sensor does not report are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BikeMetrics {
    pub speed_kmh: Option<f64>,
    pub cadence_rpm: Option<f64>,
    pub distance_delta_m: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateMetrics {
    pub bpm: u8,
    pub new_rr_intervals_ms: Vec<f64>,
}

/// Speed, cadence and distance travelled for one delta event.
///
/// A zero time delta yields zero rates. Events outside `limits` are rejected
/// as a whole so the caller can keep its last good values.
pub fn compute_bike_metrics(
    delta: &DeltaEvent,
    wheel_circumference_m: f64,
    limits: &PlausibilityLimits,
) -> Result<BikeMetrics, CounterAnomaly> {
    if delta.gap_s > limits.max_gap_secs {
        return Err(CounterAnomaly::GapTooLong {
            gap_s: delta.gap_s,
            limit: limits.max_gap_secs,
        });
    }

    let speed_kmh = delta
        .wheel
        .map(|wheel| per_second(wheel.revolutions, wheel.seconds) * wheel_circumference_m * 3.6);
    let cadence_rpm = delta
        .crank
        .map(|crank| per_second(crank.revolutions, crank.seconds) * 60.0);

    if let Some(speed_kmh) = speed_kmh.filter(|v| *v > limits.max_speed_kmh) {
        return Err(CounterAnomaly::SpeedOutOfRange {
            speed_kmh,
            limit: limits.max_speed_kmh,
        });
    }
    if let Some(cadence_rpm) = cadence_rpm.filter(|v| *v > limits.max_cadence_rpm) {
        return Err(CounterAnomaly::CadenceOutOfRange {
            cadence_rpm,
            limit: limits.max_cadence_rpm,
        });
    }

    let distance_delta_m = delta
        .wheel
        .map_or(0.0, |wheel| f64::from(wheel.revolutions) * wheel_circumference_m);

    Ok(BikeMetrics {
        speed_kmh,
        cadence_rpm,
        distance_delta_m,
    })
}

pub fn compute_heart_rate(sample: &HeartRateSample) -> HeartRateMetrics {
    HeartRateMetrics {
        bpm: sample.bpm,
        new_rr_intervals_ms: sample
            .rr_intervals
            .iter()
            .map(|rr| rr.as_secs_f64() * 1000.0)
            .collect(),
    }
}

#[inline]
fn per_second(revolutions: u16, seconds: f64) -> f64 {
    if seconds > 0.0 {
        f64::from(revolutions) / seconds
    } else {
        0.0
    }
}
