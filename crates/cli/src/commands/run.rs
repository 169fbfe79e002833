//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::FusionBlueprint;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    apply_overrides(&mut blueprint, args)?;

    info!(
        users = blueprint.users.len(),
        devices = blueprint.all_device_ids().len(),
        shared_bike = blueprint.shared_bike.is_some(),
        sinks = blueprint.sinks.len(),
        stale_secs = blueprint.fusion.stale_secs,
        interval_secs = blueprint.fusion.fusion_interval_secs,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let pipeline_config = PipelineConfig {
        blueprint,
        max_ticks: (args.max_ticks > 0).then_some(args.max_ticks),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        replay_path: args.replay.clone(),
        replay_speed: args.replay_speed,
        replay_loop: args.replay_loop,
    };

    info!("Starting pipeline...");
    let stats = Pipeline::new(pipeline_config)
        .run(shutdown_signal())
        .await
        .context("Pipeline execution failed")?;

    info!(
        ticks = stats.ticks,
        frames = stats.frames_received,
        dropped = stats.frames_dropped,
        duration_secs = stats.duration.as_secs_f64(),
        "Pipeline completed"
    );
    stats.print_summary();

    info!("ANT+ Fusion finished");
    Ok(())
}

/// Apply CLI overrides and re-validate.
fn apply_overrides(blueprint: &mut FusionBlueprint, args: &RunArgs) -> Result<()> {
    if let Some(stale_secs) = args.stale_secs {
        info!(stale_secs, "Overriding staleness window from CLI");
        blueprint.fusion.stale_secs = stale_secs;
    }
    if let Some(interval) = args.interval {
        info!(interval, "Overriding fusion interval from CLI");
        blueprint.fusion.fusion_interval_secs = interval;
    }

    config_loader::ConfigLoader::validate(blueprint)
        .map_err(|e| CliError::invalid_override(e.to_string()))?;
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_config_summary(blueprint: &FusionBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Fusion:");
    println!("  Wheel circumference: {} m", blueprint.fusion.wheel_circumference_m);
    println!("  Stale after: {} s", blueprint.fusion.stale_secs);
    println!("  Interval: {} s", blueprint.fusion.fusion_interval_secs);

    println!("\nUsers ({}):", blueprint.users.len());
    for user in &blueprint.users {
        println!(
            "  - {} hr={:?} speed={:?} cadence={:?}",
            user.name,
            user.heart_rate_candidates(),
            user.speed_device_id,
            user.cadence_device_id
        );
    }

    if let Some(bike) = &blueprint.shared_bike {
        println!(
            "\nShared bike: speed={:?} cadence={:?}",
            bike.speed_device_id, bike.cadence_device_id
        );
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
