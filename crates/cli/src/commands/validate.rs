//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{FusionBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    user_count: usize,
    device_count: usize,
    shared_bike: bool,
    sink_count: usize,
}

pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    user_count: blueprint.users.len(),
                    device_count: blueprint.all_device_ids().len(),
                    shared_bike: blueprint.shared_bike.is_some(),
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal issues
fn collect_warnings(blueprint: &FusionBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - snapshots will be dropped".to_string());
    }

    for user in &blueprint.users {
        if user.heart_rate_candidates().is_empty() {
            warnings.push(format!(
                "User '{}' has no heart-rate device - cannot ride the shared bike",
                user.name
            ));
        }
        if user.hr_device_id.is_some() && !user.hr_device_ids.is_empty() {
            warnings.push(format!(
                "User '{}' sets both hr_device_id and hr_device_ids - lists are merged",
                user.name
            ));
        }
    }

    if blueprint.fusion.fusion_interval_secs > blueprint.fusion.stale_secs {
        warnings.push(format!(
            "fusion_interval_secs ({}) exceeds stale_secs ({}) - staleness will lag by a tick",
            blueprint.fusion.fusion_interval_secs, blueprint.fusion.stale_secs
        ));
    }

    let mqtt_sinks = blueprint
        .sinks
        .iter()
        .filter(|s| s.sink_type == SinkType::Mqtt)
        .count();
    if mqtt_sinks > 1 {
        warnings.push(format!(
            "{} MQTT sinks configured - discovery topics may collide",
            mqtt_sinks
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Users: {}", summary.user_count);
            println!("  Devices: {}", summary.device_count);
            println!("  Shared bike: {}", if summary.shared_bike { "yes" } else { "no" });
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
