//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{DeviceId, FusionBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    fusion: FusionInfo,
    users: Vec<UserInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shared_bike: Option<SharedBikeInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    devices: Vec<DeviceInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct FusionInfo {
    wheel_circumference_m: f64,
    stale_secs: f64,
    fusion_interval_secs: f64,
    require_heart_rate: bool,
}

#[derive(Serialize)]
struct UserInfo {
    name: String,
    heart_rate: Vec<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cadence: Option<u16>,
}

#[derive(Serialize)]
struct SharedBikeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cadence: Option<u16>,
}

/// Who a device belongs to and which role it fills
#[derive(Serialize)]
struct DeviceInfo {
    device_id: u16,
    owner: String,
    role: String,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn device_table(blueprint: &FusionBlueprint) -> Vec<DeviceInfo> {
    let mut devices = Vec::new();
    let mut push = |id: DeviceId, owner: &str, role: &str| {
        devices.push(DeviceInfo {
            device_id: id.get(),
            owner: owner.to_string(),
            role: role.to_string(),
        });
    };

    for user in &blueprint.users {
        for id in user.heart_rate_candidates() {
            push(id, &user.name, "heart_rate");
        }
        match (user.speed_device_id, user.cadence_device_id) {
            (Some(s), Some(c)) if s == c => push(s, &user.name, "speed+cadence"),
            (s, c) => {
                if let Some(s) = s {
                    push(s, &user.name, "speed");
                }
                if let Some(c) = c {
                    push(c, &user.name, "cadence");
                }
            }
        }
    }
    if let Some(bike) = &blueprint.shared_bike {
        if let Some(s) = bike.speed_device_id {
            push(s, "(shared)", "speed");
        }
        if let Some(c) = bike.cadence_device_id {
            push(c, "(shared)", "cadence");
        }
    }

    devices.sort_by_key(|d| d.device_id);
    devices
}

fn build_config_info(blueprint: &FusionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let users = blueprint
        .users
        .iter()
        .map(|u| UserInfo {
            name: u.name.clone(),
            heart_rate: u.heart_rate_candidates().into_iter().map(DeviceId::get).collect(),
            speed: u.speed_device_id.map(DeviceId::get),
            cadence: u.cadence_device_id.map(DeviceId::get),
        })
        .collect();

    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        fusion: FusionInfo {
            wheel_circumference_m: blueprint.fusion.wheel_circumference_m,
            stale_secs: blueprint.fusion.stale_secs,
            fusion_interval_secs: blueprint.fusion.fusion_interval_secs,
            require_heart_rate: blueprint.fusion.require_heart_rate,
        },
        users,
        shared_bike: blueprint.shared_bike.as_ref().map(|b| SharedBikeInfo {
            speed: b.speed_device_id.map(DeviceId::get),
            cadence: b.cadence_device_id.map(DeviceId::get),
        }),
        devices: if args.devices {
            device_table(blueprint)
        } else {
            Vec::new()
        },
        sinks,
    }
}

fn print_config_info(blueprint: &FusionBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                 ANT+ Fusion Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let fusion = &blueprint.fusion;
    println!("⚙️  Fusion");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Wheel circumference: {} m", fusion.wheel_circumference_m);
    println!("   ├─ Stale after: {} s", fusion.stale_secs);
    println!("   ├─ Interval: {} s", fusion.fusion_interval_secs);
    println!("   └─ Heart rate required: {}", fusion.require_heart_rate);

    println!("\n🚴 Users ({})", blueprint.users.len());
    for (i, user) in blueprint.users.iter().enumerate() {
        let is_last = i == blueprint.users.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        println!("   {} {}", prefix, user.name);
        println!(
            "   {}  ├─ Heart rate: {:?}",
            child_prefix,
            user.heart_rate_candidates()
                .into_iter()
                .map(DeviceId::get)
                .collect::<Vec<_>>()
        );
        println!("   {}  ├─ Speed: {}", child_prefix, describe(user.speed_device_id));
        println!("   {}  └─ Cadence: {}", child_prefix, describe(user.cadence_device_id));
    }

    if let Some(bike) = &blueprint.shared_bike {
        println!("\n🔁 Shared bike");
        println!("   ├─ Speed: {}", describe(bike.speed_device_id));
        println!("   └─ Cadence: {}", describe(bike.cadence_device_id));
    }

    if args.devices {
        let devices = device_table(blueprint);
        println!("\n📡 Devices ({})", devices.len());
        for (i, device) in devices.iter().enumerate() {
            let prefix = if i == devices.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {:>5}  {:<14} {}",
                prefix, device.device_id, device.role, device.owner
            );
        }
    }

    if args.sinks && !blueprint.sinks.is_empty() {
        println!("\n📤 Sinks ({})", blueprint.sinks.len());
        for (i, sink) in blueprint.sinks.iter().enumerate() {
            let prefix = if i == blueprint.sinks.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} {} ({:?}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}

fn describe(id: Option<DeviceId>) -> String {
    id.map_or_else(|| "-".to_string(), |id| id.to_string())
}
