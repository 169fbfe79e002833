//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// ANT+ Fusion - per-user telemetry from heart-rate and bike sensors
#[derive(Parser, Debug)]
#[command(
    name = "ant-fusion",
    author,
    version,
    about = "ANT+ telemetry fusion engine",
    long_about = "Receives ANT+ heart-rate, speed and cadence frames, resolves the active \n\
                  device per user and role, and publishes a per-user snapshot every \n\
                  fusion interval to the configured sinks (log, file, terminal, MQTT)."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ANT_FUSION_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ANT_FUSION_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the fusion pipeline
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "config.toml", env = "ANT_FUSION_CONFIG")]
    pub config: PathBuf,

    /// Override the staleness window (seconds)
    #[arg(long, env = "ANT_FUSION_STALE_SECS")]
    pub stale_secs: Option<f64>,

    /// Override the fusion interval (seconds)
    #[arg(long, env = "ANT_FUSION_INTERVAL")]
    pub interval: Option<f64>,

    /// Stop after this many snapshots (0 = unlimited)
    #[arg(long, default_value = "0", env = "ANT_FUSION_MAX_TICKS")]
    pub max_ticks: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "ANT_FUSION_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Ingestion queue capacity (frames)
    #[arg(long, default_value = "256", env = "ANT_FUSION_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "9000", env = "ANT_FUSION_METRICS_PORT")]
    pub metrics_port: u16,

    /// Replay recorded frames (JSON lines) instead of simulating devices
    #[arg(long, env = "ANT_FUSION_REPLAY")]
    pub replay: Option<PathBuf>,

    /// Replay speed multiplier (1.0 = recorded speed)
    #[arg(long, default_value = "1.0", requires = "replay")]
    pub replay_speed: f64,

    /// Start the recording over when it ends
    #[arg(long, requires = "replay")]
    pub replay_loop: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml", env = "ANT_FUSION_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "ANT_FUSION_CONFIG")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the device table
    #[arg(long)]
    pub devices: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
