//! Error types for CLI operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// A command-line override produced an invalid configuration
    #[error("Invalid override: {message}")]
    InvalidOverride { message: String },

    #[error("Pipeline execution failed: {message}")]
    PipelineExecution { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_override(message: impl Into<String>) -> Self {
        Self::InvalidOverride {
            message: message.into(),
        }
    }

    pub fn pipeline_execution(message: impl Into<String>) -> Self {
        Self::PipelineExecution {
            message: message.into(),
        }
    }
}
