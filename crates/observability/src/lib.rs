//! # Observability
//!
//! Tracing subscriber setup, Prometheus export and snapshot metrics.
//!
//! ## Features
//!
//! - Tracing init (JSON / pretty / compact), honouring `RUST_LOG`
//! - Prometheus exporter for the `metrics` facade
//! - Per-snapshot gauges and an in-memory run summary
//!
//! ## Usage Example
//!
//! ```ignore
//! use observability::{record_snapshot_metrics, SnapshotAggregator};
//!
//! observability::init_with_config(ObservabilityConfig::default())?;
//!
//! let mut aggregator = SnapshotAggregator::new();
//! let snapshot = engine.tick(clock.now());
//! record_snapshot_metrics(&snapshot);
//! aggregator.update(&snapshot);
//! ```

pub mod metrics;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{
    record_queue_depth, record_snapshot_metrics, MetricsSummary, RunningStats, SnapshotAggregator,
    StatsSummary, UserAggregate, UserSummary,
};

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (`None` disables the exporter)
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is unset
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: Some(9000),
            default_log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Install the tracing subscriber and, when a port is set, the Prometheus
/// exporter.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().pretty())
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact())
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Install only the Prometheus recorder, for callers that set up tracing
/// themselves.
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}
