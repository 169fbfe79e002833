//! Fusion bus error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    /// Sink could not be built from its configuration
    #[error("failed to create sink '{name}': {message}")]
    SinkCreation { name: String, message: String },

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] contracts::ContractError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BusError {
    pub fn sink_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
