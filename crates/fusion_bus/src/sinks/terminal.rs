//! TerminalSink - live per-user table

use std::fmt::Write as _;
use std::io::{self, Write};

use chrono::Local;
use contracts::{Availability, ContractError, RoleStatus, Snapshot, SnapshotSink};
use tracing::instrument;

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Render a snapshot as a fixed-width table.
pub fn render_table(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "tick {:<6} t={:>9.1}s  {}",
        snapshot.tick_id,
        snapshot.timestamp,
        Local::now().format("%H:%M:%S")
    );
    let _ = writeln!(
        out,
        "{:<14} {:>5} {:>9} {:>7} {:>10}  {}",
        "user", "bpm", "km/h", "rpm", "km", "status"
    );
    let _ = writeln!(out, "{}", "-".repeat(62));

    for user in &snapshot.users {
        let bpm = user
            .heart_rate
            .bpm
            .map_or_else(|| "--".to_string(), |v| v.to_string());
        let speed = user
            .bike
            .speed_kmh
            .map_or_else(|| "--".to_string(), |v| format!("{v:.1}"));
        let cadence = user
            .bike
            .cadence_rpm
            .map_or_else(|| "--".to_string(), |v| format!("{v:.0}"));

        let _ = writeln!(
            out,
            "{:<14} {:>5} {:>9} {:>7} {:>10.3}  {}{}{}",
            user.name,
            bpm,
            speed,
            cadence,
            user.bike.distance_m / 1000.0,
            marker(&user.heart_rate.status),
            marker(&user.bike.speed),
            marker(&user.bike.cadence),
        );
    }
    out
}

fn marker(status: &RoleStatus) -> char {
    match status.availability {
        Availability::Available => '+',
        Availability::Stale => '!',
        Availability::Unknown => '.',
    }
}

/// Sink that redraws a table on every snapshot
pub struct TerminalSink {
    name: String,
    out: Box<dyn Write + Send>,
    clear: bool,
}

impl TerminalSink {
    pub fn stdout(name: impl Into<String>) -> Self {
        Self::with_writer(name, Box::new(io::stdout()), true)
    }

    pub fn with_writer(name: impl Into<String>, out: Box<dyn Write + Send>, clear: bool) -> Self {
        Self {
            name: name.into(),
            out,
            clear,
        }
    }

    fn draw(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        if self.clear {
            self.out.write_all(CLEAR_SCREEN.as_bytes())?;
        }
        self.out.write_all(render_table(snapshot).as_bytes())?;
        self.out.flush()
    }
}

impl SnapshotSink for TerminalSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "terminal_sink_write",
        level = "trace",
        skip(self, snapshot),
        fields(sink = %self.name, tick_id = snapshot.tick_id)
    )]
    async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError> {
        self.draw(snapshot)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.out
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
