//! SnapshotSink trait - Fusion Bus output interface
//!
//! Defines the abstract interface for sinks.

use crate::{ContractError, Snapshot};

/// Snapshot output trait
///
/// All sink implementations must implement this trait. Each sink is driven by
/// its own worker, so `write` may take as long as it needs.
#[trait_variant::make(SnapshotSink: Send)]
pub trait LocalSnapshotSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one snapshot
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
