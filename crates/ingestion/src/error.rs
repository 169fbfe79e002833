//! Ingestion error types

use contracts::DeviceId;
use thiserror::Error;

/// Frame decoding failure
///
/// None of these are fatal: the frame is dropped and ingestion continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Device type code is not one of the supported profiles
    #[error("unsupported device type {device_type} from device {device_id}")]
    UnsupportedDeviceType { device_id: DeviceId, device_type: u8 },

    /// Payload length or fields do not match the profile layout
    #[error("malformed payload from device {device_id}: {message}")]
    MalformedPayload { device_id: DeviceId, message: String },

    /// Heart-rate strap reports no skin contact (computed heart rate 0)
    #[error("no signal from device {device_id}")]
    NoSignal { device_id: DeviceId },
}

impl DecodeError {
    pub fn malformed(device_id: DeviceId, message: impl Into<String>) -> Self {
        Self::MalformedPayload {
            device_id,
            message: message.into(),
        }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedDeviceType { .. } => "unsupported_device_type",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::NoSignal { .. } => "no_signal",
        }
    }
}

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source id registered twice
    #[error("frame source {source_id} is already registered")]
    AlreadyRegistered { source_id: String },

    /// Queue consumer is gone
    #[error("ingestion channel closed for source {source_id}")]
    ChannelClosed { source_id: String },
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
