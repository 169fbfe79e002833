//! FusionBlueprint - Config Loader output
//!
//! Describes the complete setup: users and their candidate devices, shared
//! bike sensors, fusion tuning and output routing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{DeviceId, EngineConfig, PlausibilityLimits, Role, SharedBike, UserRoster};

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    /// Fusion tuning
    #[serde(default)]
    pub fusion: FusionConfig,

    /// Users in display order
    pub users: Vec<UserConfig>,

    /// Bike sensors shared between users (e.g. a gym bike)
    #[serde(default)]
    pub shared_bike: Option<SharedBikeConfig>,

    /// Output routing
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Fusion tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// Wheel circumference (meters)
    #[serde(default = "default_wheel_circumference")]
    pub wheel_circumference_m: f64,

    /// A device not seen for longer than this is stale (seconds)
    #[serde(default = "default_stale_secs")]
    pub stale_secs: f64,

    /// Snapshot period (seconds)
    #[serde(default = "default_fusion_interval")]
    pub fusion_interval_secs: f64,

    /// Every user must have a heart-rate candidate
    #[serde(default)]
    pub require_heart_rate: bool,

    #[serde(default)]
    pub limits: PlausibilityLimits,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            wheel_circumference_m: default_wheel_circumference(),
            stale_secs: default_stale_secs(),
            fusion_interval_secs: default_fusion_interval(),
            require_heart_rate: false,
            limits: PlausibilityLimits::default(),
        }
    }
}

fn default_wheel_circumference() -> f64 {
    2.105 // 700x25c
}

fn default_stale_secs() -> f64 {
    10.0
}

fn default_fusion_interval() -> f64 {
    1.0
}

/// User definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    /// Unique display name
    pub name: String,

    /// Heart-rate candidates in preference order
    #[serde(default)]
    pub hr_device_ids: Vec<DeviceId>,

    /// Legacy single heart-rate device, appended after `hr_device_ids`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hr_device_id: Option<DeviceId>,

    #[serde(default)]
    pub speed_device_id: Option<DeviceId>,

    #[serde(default)]
    pub cadence_device_id: Option<DeviceId>,
}

impl UserConfig {
    /// Heart-rate candidates with the legacy field merged in, without duplicates.
    pub fn heart_rate_candidates(&self) -> Vec<DeviceId> {
        let mut ids = self.hr_device_ids.clone();
        if let Some(legacy) = self.hr_device_id {
            if !ids.contains(&legacy) {
                ids.push(legacy);
            }
        }
        ids
    }

    /// Configured candidates for `role`, in preference order.
    pub fn candidates(&self, role: Role) -> Vec<DeviceId> {
        match role {
            Role::HeartRate => self.heart_rate_candidates(),
            Role::Speed => self.speed_device_id.into_iter().collect(),
            Role::Cadence => self.cadence_device_id.into_iter().collect(),
        }
    }
}

/// Bike sensors attributed to whichever user is currently riding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedBikeConfig {
    #[serde(default)]
    pub speed_device_id: Option<DeviceId>,

    #[serde(default)]
    pub cadence_device_id: Option<DeviceId>,
}

/// Sink output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink name
    pub name: String,

    /// Sink type
    pub sink_type: SinkType,

    /// Queue capacity; the oldest snapshot is overwritten when full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    4
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// Tracing output
    Log,
    /// JSON-lines file
    File,
    /// Live terminal table
    Terminal,
    /// MQTT publisher
    Mqtt,
}

impl FusionBlueprint {
    /// Build the runtime engine configuration.
    pub fn to_engine_config(&self) -> EngineConfig {
        let users = self
            .users
            .iter()
            .map(|user| UserRoster {
                name: user.name.clone(),
                heart_rate: user.heart_rate_candidates(),
                speed: user.speed_device_id,
                cadence: user.cadence_device_id,
            })
            .collect();

        let shared_bike = self
            .shared_bike
            .as_ref()
            .map(|bike| SharedBike {
                speed: bike.speed_device_id,
                cadence: bike.cadence_device_id,
            })
            .filter(|bike| bike.speed.is_some() || bike.cadence.is_some());

        EngineConfig {
            users,
            shared_bike,
            wheel_circumference_m: self.fusion.wheel_circumference_m,
            stale_secs: self.fusion.stale_secs,
            limits: self.fusion.limits.clone(),
        }
    }

    /// Every device id mentioned anywhere in the configuration.
    pub fn all_device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self
            .users
            .iter()
            .flat_map(|user| Role::ALL.into_iter().flat_map(move |role| user.candidates(role)))
            .collect();
        if let Some(bike) = &self.shared_bike {
            ids.extend(bike.speed_device_id);
            ids.extend(bike.cadence_device_id);
        }
        ids.sort();
        ids.dedup();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(name: &str, hr: &[u16]) -> UserConfig {
        UserConfig {
            name: name.into(),
            hr_device_ids: hr.iter().copied().map(DeviceId::new).collect(),
            ..Default::default()
        }
    }

    fn sample_blueprint() -> FusionBlueprint {
        let mut alice = sample_user("alice", &[100, 101]);
        alice.speed_device_id = Some(DeviceId::new(200));
        alice.cadence_device_id = Some(DeviceId::new(200));
        FusionBlueprint {
            version: ConfigVersion::V1,
            fusion: FusionConfig::default(),
            users: vec![alice, sample_user("bob", &[102])],
            shared_bike: None,
            sinks: vec![],
        }
    }

    #[test]
    fn engine_config_defaults() {
        let config = sample_blueprint().to_engine_config();
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[0].heart_rate, vec![DeviceId::new(100), DeviceId::new(101)]);
        assert_eq!(config.users[0].speed, Some(DeviceId::new(200)));
        assert_eq!(config.stale_secs, 10.0);
        assert_eq!(config.wheel_circumference_m, 2.105);
        assert!(config.shared_bike.is_none());
    }

    #[test]
    fn legacy_hr_field_is_merged() {
        let mut user = sample_user("carol", &[7]);
        user.hr_device_id = Some(DeviceId::new(9));
        assert_eq!(user.heart_rate_candidates(), vec![DeviceId::new(7), DeviceId::new(9)]);

        user.hr_device_id = Some(DeviceId::new(7));
        assert_eq!(user.heart_rate_candidates(), vec![DeviceId::new(7)]);
    }

    #[test]
    fn empty_shared_bike_is_ignored() {
        let mut blueprint = sample_blueprint();
        blueprint.shared_bike = Some(SharedBikeConfig::default());
        assert!(blueprint.to_engine_config().shared_bike.is_none());

        blueprint.shared_bike = Some(SharedBikeConfig {
            speed_device_id: Some(DeviceId::new(300)),
            cadence_device_id: None,
        });
        let bike = blueprint.to_engine_config().shared_bike.unwrap();
        assert_eq!(bike.speed, Some(DeviceId::new(300)));
    }

    #[test]
    fn all_device_ids_are_deduplicated() {
        let ids = sample_blueprint().all_device_ids();
        let raw: Vec<u16> = ids.into_iter().map(u16::from).collect();
        assert_eq!(raw, vec![100, 101, 102, 200]);
    }
}
