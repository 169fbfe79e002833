//! DeviceId / DeviceType / Role
//!
//! Identity of a wireless sensor and the logical role it fills for a user.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ANT device number.
///
/// `Copy` newtype over the 16-bit device number broadcast by the sensor.
///
/// # Examples
/// ```
/// use contracts::DeviceId;
///
/// let id = DeviceId::new(12345);
/// assert_eq!(id.get(), 12345);
/// assert_eq!(id.to_string(), "12345");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(u16);

impl DeviceId {
    #[inline]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u16> for DeviceId {
    #[inline]
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl From<DeviceId> for u16 {
    #[inline]
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

/// ANT+ device profile carried in the channel id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Heart-rate monitor (120)
    HeartRate,
    /// Combined bike speed & cadence sensor (121)
    SpeedCadence,
    /// Bike cadence sensor (122)
    Cadence,
    /// Bike speed sensor (123)
    Speed,
}

impl DeviceType {
    /// Map the ANT+ device type code to a known profile.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            120 => Some(Self::HeartRate),
            121 => Some(Self::SpeedCadence),
            122 => Some(Self::Cadence),
            123 => Some(Self::Speed),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::HeartRate => 120,
            Self::SpeedCadence => 121,
            Self::Cadence => 122,
            Self::Speed => 123,
        }
    }

    /// Channel period in 1/32768 s units, as used by the ANT+ profiles.
    pub fn channel_period(self) -> u16 {
        match self {
            Self::HeartRate => 8070,
            Self::SpeedCadence => 8086,
            Self::Cadence => 8102,
            Self::Speed => 8118,
        }
    }

    /// Whether frames of this type can feed the given role.
    pub fn serves(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Self::HeartRate, Role::HeartRate)
                | (Self::SpeedCadence, Role::Speed)
                | (Self::SpeedCadence, Role::Cadence)
                | (Self::Speed, Role::Speed)
                | (Self::Cadence, Role::Cadence)
        )
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::HeartRate => "heart_rate",
            Self::SpeedCadence => "speed_cadence",
            Self::Cadence => "cadence",
            Self::Speed => "speed",
        };
        f.write_str(name)
    }
}

/// Logical slot a device fills for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    HeartRate,
    Speed,
    Cadence,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::HeartRate, Role::Speed, Role::Cadence];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::HeartRate => "heart_rate",
            Self::Speed => "speed",
            Self::Cadence => "cadence",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
