//! LogSink - logs a per-user summary via tracing

use contracts::{ContractError, Snapshot, SnapshotSink, UserState};
use tracing::{info, instrument};

/// Sink that logs one line per user and snapshot
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_user(&self, tick_id: u64, user: &UserState) {
        info!(
            sink = %self.name,
            tick_id,
            user = %user.name,
            online = user.online,
            bpm = ?user.heart_rate.bpm,
            speed_kmh = ?user.bike.speed_kmh.map(|v| (v * 100.0).round() / 100.0),
            cadence_rpm = ?user.bike.cadence_rpm.map(f64::round),
            distance_m = user.bike.distance_m.round(),
            hr = ?user.heart_rate.status.availability,
            speed = ?user.bike.speed.availability,
            cadence = ?user.bike.cadence.availability,
            "snapshot"
        );
    }
}

impl SnapshotSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, tick_id = snapshot.tick_id)
    )]
    async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError> {
        for user in &snapshot.users {
            self.log_user(snapshot.tick_id, user);
        }
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}
