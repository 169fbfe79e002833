//! Fusion engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};

use crate::{DeviceId, Role};

/// Fusion engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Users in display order
    pub users: Vec<UserRoster>,

    /// Bike sensors attributed to the current rider
    #[serde(default)]
    pub shared_bike: Option<SharedBike>,

    /// Wheel circumference (meters)
    pub wheel_circumference_m: f64,

    /// Staleness window (seconds)
    pub stale_secs: f64,

    #[serde(default)]
    pub limits: PlausibilityLimits,
}

/// Candidate devices of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoster {
    pub name: String,

    /// Heart-rate candidates in preference order
    pub heart_rate: Vec<DeviceId>,

    pub speed: Option<DeviceId>,
    pub cadence: Option<DeviceId>,
}

impl UserRoster {
    pub fn candidates(&self, role: Role) -> &[DeviceId] {
        match role {
            Role::HeartRate => &self.heart_rate,
            Role::Speed => self.speed.as_slice(),
            Role::Cadence => self.cadence.as_slice(),
        }
    }
}

/// Shared bike devices
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedBike {
    pub speed: Option<DeviceId>,
    pub cadence: Option<DeviceId>,
}

impl SharedBike {
    pub fn device_for(&self, role: Role) -> Option<DeviceId> {
        match role {
            Role::HeartRate => None,
            Role::Speed => self.speed,
            Role::Cadence => self.cadence,
        }
    }
}

/// Bounds above which a derived metric is treated as a counter anomaly
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlausibilityLimits {
    /// Maximum believable speed (km/h)
    pub max_speed_kmh: f64,

    /// Maximum believable cadence (rpm)
    pub max_cadence_rpm: f64,

    /// Longest gap between samples over which counter deltas are trusted (seconds).
    /// The 1/1024 s event clock wraps every 64 s.
    pub max_gap_secs: f64,
}

impl Default for PlausibilityLimits {
    fn default() -> Self {
        Self {
            max_speed_kmh: 120.0,
            max_cadence_rpm: 250.0,
            max_gap_secs: 64.0,
        }
    }
}
