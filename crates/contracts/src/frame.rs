//! RawFrame - transport output
//!
//! One broadcast message as delivered by the radio stack.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{DeviceId, DeviceType};

/// Raw broadcast frame.
///
/// `device_type` stays the raw ANT+ code; unknown codes are rejected by the
/// decoder, not at the transport boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFrame {
    /// ANT device number
    pub device_id: DeviceId,

    /// ANT+ device type code (120 = HR, 121 = speed/cadence, ...)
    pub device_type: u8,

    /// Broadcast data page (zero-copy)
    pub payload: Bytes,

    /// Reception time (seconds, monotonic)
    pub timestamp: f64,
}

impl RawFrame {
    pub fn new(device_id: u16, device_type: u8, payload: impl Into<Bytes>, timestamp: f64) -> Self {
        Self {
            device_id: DeviceId::new(device_id),
            device_type,
            payload: payload.into(),
            timestamp,
        }
    }

    /// Known profile for this frame, if any.
    pub fn kind(&self) -> Option<DeviceType> {
        DeviceType::from_code(self.device_type)
    }
}
