//! Shared monotonic clock
//!
//! Sources stamp frames and the engine ticks against the same epoch.

use std::time::Instant;

/// Seconds since a fixed epoch.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn starting_at(epoch: Instant) -> Self {
        Self { epoch }
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
