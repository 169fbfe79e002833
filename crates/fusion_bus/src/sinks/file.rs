//! FileSink - appends snapshots to a JSON-lines file

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use contracts::{ContractError, Snapshot, SnapshotSink};
use serde::Serialize;
use tracing::{debug, error, instrument};

#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file, created if missing
    pub path: PathBuf,

    /// Start a fresh file instead of appending
    pub truncate: bool,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        let truncate = match params.get("truncate").map(String::as_str) {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => return Err(format!("invalid truncate value '{}'", other)),
        };

        Ok(Self { path, truncate })
    }
}

#[derive(Serialize)]
struct Record<'a> {
    written_at: String,
    #[serde(flatten)]
    snapshot: &'a Snapshot,
}

/// Sink that writes one JSON object per snapshot
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writer: BufWriter<File>,
    lines: u64,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(!config.truncate)
            .truncate(config.truncate)
            .open(&config.path)?;

        Ok(Self {
            name: name.into(),
            config,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config)
    }

    fn append(&mut self, snapshot: &Snapshot) -> std::io::Result<()> {
        let record = Record {
            written_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            snapshot,
        };
        serde_json::to_writer(&mut self.writer, &record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl SnapshotSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, tick_id = snapshot.tick_id)
    )]
    async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError> {
        self.append(snapshot).map_err(|e| {
            error!(sink = %self.name, tick_id = snapshot.tick_id, error = %e, "write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(
            sink = %self.name,
            path = %self.config.path.display(),
            lines = self.lines,
            "FileSink closed"
        );
        Ok(())
    }
}
