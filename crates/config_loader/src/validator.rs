//! Configuration validation
//!
//! Rules:
//! - at least one user, names non-empty and unique
//! - each device id belongs to one user (or the shared bike) and one class
//!   of role (heart rate vs bike)
//! - each user can resolve at least one role
//! - fusion parameters in range
//! - sink required fields present

use std::collections::{HashMap, HashSet};

use contracts::{ContractError, DeviceId, FusionBlueprint, SinkType};

/// Validate a FusionBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    validate_users(blueprint)?;
    validate_device_assignments(blueprint)?;
    validate_role_coverage(blueprint)?;
    validate_fusion(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_users(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    if blueprint.users.is_empty() {
        return Err(ContractError::config_validation(
            "users",
            "at least one user must be configured",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, user) in blueprint.users.iter().enumerate() {
        if user.name.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("users[{idx}].name"),
                "user name cannot be empty",
            ));
        }
        if !seen.insert(user.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("users[name={}]", user.name),
                "duplicate user name",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceClass {
    HeartRate,
    Bike,
}

/// A device may serve several bike roles of one owner (combined sensor), but
/// never two owners and never both heart rate and bike.
fn validate_device_assignments(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let mut owners: HashMap<DeviceId, (&str, DeviceClass)> = HashMap::new();

    for (idx, user) in blueprint.users.iter().enumerate() {
        for id in user.heart_rate_candidates() {
            claim(
                &mut owners,
                id,
                &user.name,
                DeviceClass::HeartRate,
                format!("users[{idx}].hr_device_ids"),
            )?;
        }
        for id in user.speed_device_id.iter().chain(&user.cadence_device_id) {
            claim(
                &mut owners,
                *id,
                &user.name,
                DeviceClass::Bike,
                format!("users[{idx}].speed_device_id / cadence_device_id"),
            )?;
        }
    }

    if let Some(bike) = &blueprint.shared_bike {
        for id in bike.speed_device_id.iter().chain(&bike.cadence_device_id) {
            claim(
                &mut owners,
                *id,
                "shared_bike",
                DeviceClass::Bike,
                "shared_bike".to_string(),
            )?;
        }
    }

    Ok(())
}

fn claim<'a>(
    owners: &mut HashMap<DeviceId, (&'a str, DeviceClass)>,
    id: DeviceId,
    owner: &'a str,
    class: DeviceClass,
    field: String,
) -> Result<(), ContractError> {
    let Some(&(prev_owner, prev_class)) = owners.get(&id) else {
        owners.insert(id, (owner, class));
        return Ok(());
    };

    if prev_owner != owner {
        return Err(ContractError::config_validation(
            field,
            format!("device {id} is already assigned to '{prev_owner}'"),
        ));
    }
    if prev_class != class {
        return Err(ContractError::config_validation(
            field,
            format!("device {id} cannot serve both heart-rate and bike roles"),
        ));
    }
    Ok(())
}

fn validate_role_coverage(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let has_shared_bike = blueprint
        .shared_bike
        .as_ref()
        .is_some_and(|bike| bike.speed_device_id.is_some() || bike.cadence_device_id.is_some());

    for (idx, user) in blueprint.users.iter().enumerate() {
        let has_hr = !user.heart_rate_candidates().is_empty();
        let has_bike = user.speed_device_id.is_some() || user.cadence_device_id.is_some();

        if blueprint.fusion.require_heart_rate && !has_hr {
            return Err(ContractError::config_validation(
                format!("users[{idx}].hr_device_ids"),
                format!("user '{}' has no heart-rate device but one is required", user.name),
            ));
        }

        // Shared bike devices follow the active heart-rate user, so they only
        // cover users who also have a heart-rate candidate.
        if !has_hr && !has_bike {
            let message = if has_shared_bike {
                format!(
                    "user '{}' needs a heart-rate device to ride the shared bike",
                    user.name
                )
            } else {
                format!("user '{}' has no devices configured", user.name)
            };
            return Err(ContractError::config_validation(format!("users[{idx}]"), message));
        }
    }
    Ok(())
}

fn validate_fusion(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let fusion = &blueprint.fusion;

    if !(fusion.wheel_circumference_m > 0.0 && fusion.wheel_circumference_m < 5.0) {
        return Err(ContractError::config_validation(
            "fusion.wheel_circumference_m",
            format!(
                "wheel_circumference_m must be in (0, 5), got {}",
                fusion.wheel_circumference_m
            ),
        ));
    }

    if fusion.stale_secs <= 0.0 || !fusion.stale_secs.is_finite() {
        return Err(ContractError::config_validation(
            "fusion.stale_secs",
            format!("stale_secs must be > 0, got {}", fusion.stale_secs),
        ));
    }

    if fusion.fusion_interval_secs <= 0.0 || !fusion.fusion_interval_secs.is_finite() {
        return Err(ContractError::config_validation(
            "fusion.fusion_interval_secs",
            format!(
                "fusion_interval_secs must be > 0, got {}",
                fusion.fusion_interval_secs
            ),
        ));
    }

    let limits = &fusion.limits;
    if limits.max_speed_kmh <= 0.0 || limits.max_cadence_rpm <= 0.0 || limits.max_gap_secs <= 0.0
    {
        return Err(ContractError::config_validation(
            "fusion.limits",
            "plausibility limits must all be > 0",
        ));
    }

    Ok(())
}

fn validate_sinks(blueprint: &FusionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].queue_capacity"),
                "queue_capacity must be > 0",
            ));
        }

        let required = match sink.sink_type {
            SinkType::File => Some("path"),
            SinkType::Mqtt => Some("host"),
            SinkType::Log | SinkType::Terminal => None,
        };
        if let Some(key) = required {
            if sink.params.get(key).map_or(true, |v| v.is_empty()) {
                return Err(ContractError::config_validation(
                    format!("sinks[{idx}].params.{key}"),
                    format!("{:?} sink requires '{key}'", sink.sink_type),
                ));
            }
        }
    }
    Ok(())
}
