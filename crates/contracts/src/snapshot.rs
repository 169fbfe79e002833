//! Snapshot - Fusion Bus output
//!
//! Immutable per-tick view of every configured user.

use serde::{Deserialize, Serialize};

use crate::DeviceId;

/// Fused state snapshot
///
/// Produced once per tick and shared with sinks behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Tick sequence number (monotonically increasing, starts at 1)
    pub tick_id: u64,

    /// Tick time (seconds, same clock as frame timestamps)
    pub timestamp: f64,

    /// One row per configured user, in configuration order
    pub users: Vec<UserState>,
}

impl Snapshot {
    pub fn user(&self, name: &str) -> Option<&UserState> {
        self.users.iter().find(|user| user.name == name)
    }
}

/// Per-user row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub name: String,
    pub heart_rate: HeartRateState,
    pub bike: BikeState,

    /// Any role available
    pub online: bool,

    /// `online` differs from the previous tick
    pub online_changed: bool,
}

/// Heart-rate role state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeartRateState {
    /// Current BPM of the active device, `None` unless available
    pub bpm: Option<u8>,

    /// Recent RR intervals of the active device (milliseconds, oldest first)
    pub rr_intervals_ms: Vec<f64>,

    pub status: RoleStatus,
}

impl HeartRateState {
    pub fn available(&self) -> bool {
        self.status.is_available()
    }
}

/// Bike role state (speed, cadence, trip distance)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BikeState {
    /// Last good speed of the active speed device, `None` unless available
    pub speed_kmh: Option<f64>,

    /// Last good cadence of the active cadence device, `None` unless available
    pub cadence_rpm: Option<f64>,

    /// Accumulated trip distance (meters)
    pub distance_m: f64,

    pub speed: RoleStatus,
    pub cadence: RoleStatus,
}

impl BikeState {
    pub fn available(&self) -> bool {
        self.speed.is_available() || self.cadence.is_available()
    }
}

/// Resolution result for one (user, role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoleStatus {
    pub availability: Availability,

    /// Device currently feeding this role
    pub active_device: Option<DeviceId>,

    /// Edge flag: availability differs from the previous tick
    pub availability_changed: bool,
}

impl RoleStatus {
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }
}

/// Availability of a (user, role)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Never resolved since start
    #[default]
    Unknown,
    /// Active device seen within the staleness window
    Available,
    /// Was available, every candidate is now stale
    Stale,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Stale => "stale",
        }
    }
}
