//! MqttSink - per-user topics plus Home Assistant discovery
//!
//! Topic layout:
//! - `{base}/users/{user}/hr|speed|cadence|distance` on change
//! - `{base}/users/{user}/availability` = `online` / `offline`, retained
//! - `{discovery_prefix}/sensor/{base}_{user}_{metric}/config` once

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use contracts::{ContractError, FusionBlueprint, Snapshot, SnapshotSink, UserState};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";

/// Published metric of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicMetric {
    Hr,
    Speed,
    Cadence,
    Distance,
}

impl TopicMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hr => "hr",
            Self::Speed => "speed",
            Self::Cadence => "cadence",
            Self::Distance => "distance",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Hr => "Heart Rate",
            Self::Speed => "Speed",
            Self::Cadence => "Cadence",
            Self::Distance => "Distance",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Self::Hr => "bpm",
            Self::Speed => "km/h",
            Self::Cadence => "rpm",
            Self::Distance => "km",
        }
    }

    fn icon(self) -> &'static str {
        match self {
            Self::Hr => "mdi:heart",
            Self::Speed => "mdi:speedometer",
            Self::Cadence => "mdi:timer-sync",
            Self::Distance => "mdi:map-marker-distance",
        }
    }

    /// Payload for this metric, if the user currently has a value for it
    fn payload(self, user: &UserState) -> Option<String> {
        match self {
            Self::Hr => user.heart_rate.bpm.map(|bpm| bpm.to_string()),
            Self::Speed => user.bike.speed_kmh.map(|v| format!("{v:.2}")),
            Self::Cadence => user.bike.cadence_rpm.map(|v| format!("{}", v.trunc() as i64)),
            Self::Distance => user
                .bike
                .speed
                .is_available()
                .then(|| format!("{:.3}", user.bike.distance_m / 1000.0)),
        }
    }
}

const METRICS: [TopicMetric; 4] = [
    TopicMetric::Hr,
    TopicMetric::Speed,
    TopicMetric::Cadence,
    TopicMetric::Distance,
];

/// Which metrics each user has devices for, in configuration order
#[derive(Debug, Clone, Default)]
pub struct UserTopics {
    users: Vec<(String, Vec<TopicMetric>)>,
}

impl UserTopics {
    pub fn from_blueprint(blueprint: &FusionBlueprint) -> Self {
        let shared = blueprint.shared_bike.as_ref();
        let shared_speed = shared.is_some_and(|bike| bike.speed_device_id.is_some());
        let shared_cadence = shared.is_some_and(|bike| bike.cadence_device_id.is_some());

        let users = blueprint
            .users
            .iter()
            .map(|user| {
                let mut metrics = Vec::new();
                if !user.heart_rate_candidates().is_empty() {
                    metrics.push(TopicMetric::Hr);
                }
                if user.speed_device_id.is_some() || shared_speed {
                    metrics.push(TopicMetric::Speed);
                }
                if user.cadence_device_id.is_some() || shared_cadence {
                    metrics.push(TopicMetric::Cadence);
                }
                if metrics.contains(&TopicMetric::Speed) {
                    metrics.push(TopicMetric::Distance);
                }
                (user.name.clone(), metrics)
            })
            .collect();

        Self { users }
    }

    pub fn new(users: Vec<(String, Vec<TopicMetric>)>) -> Self {
        Self { users }
    }

    pub fn metrics_for(&self, user: &str) -> &[TopicMetric] {
        self.users
            .iter()
            .find(|(name, _)| name == user)
            .map_or(&[], |(_, metrics)| metrics.as_slice())
    }
}

#[derive(Debug, Clone)]
pub struct MqttSinkConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub base_topic: String,
    pub qos: QoS,
    /// Retain flag for metric topics (availability and discovery are always retained)
    pub retain: bool,
    pub discovery: bool,
    pub discovery_prefix: String,
    pub keep_alive_secs: u64,
}

impl MqttSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let host = params
            .get("host")
            .filter(|h| !h.is_empty())
            .cloned()
            .ok_or_else(|| "missing 'host' parameter".to_string())?;

        let port = match params.get("port") {
            Some(p) => p.parse().map_err(|e| format!("invalid port '{}': {}", p, e))?,
            None => 1883,
        };

        let qos = match params.get("qos").map(String::as_str) {
            Some("0") => QoS::AtMostOnce,
            Some("1") | None => QoS::AtLeastOnce,
            Some("2") => QoS::ExactlyOnce,
            Some(other) => return Err(format!("invalid qos '{}'", other)),
        };

        Ok(Self {
            host,
            port,
            client_id: params
                .get("client_id")
                .cloned()
                .unwrap_or_else(|| format!("ant-fusion-{}", std::process::id())),
            username: params.get("username").cloned(),
            password: params.get("password").cloned(),
            base_topic: params
                .get("base_topic")
                .cloned()
                .unwrap_or_else(|| "pyantdisplay".to_string()),
            qos,
            retain: parse_flag(params, "retain", true)?,
            discovery: parse_flag(params, "discovery", true)?,
            discovery_prefix: params
                .get("discovery_prefix")
                .cloned()
                .unwrap_or_else(|| "homeassistant".to_string()),
            keep_alive_secs: match params.get("keep_alive_secs") {
                Some(v) => v.parse().map_err(|e| format!("invalid keep_alive_secs '{}': {}", v, e))?,
                None => 30,
            },
        })
    }
}

fn parse_flag(params: &HashMap<String, String>, key: &str, default: bool) -> Result<bool, String> {
    match params.get(key).map(String::as_str) {
        None => Ok(default),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(format!("invalid {} value '{}'", key, other)),
    }
}

fn qos_level(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

/// One message to publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
    commit: Commit,
}

/// Planner state a message settles once the client accepted it
#[derive(Debug, Clone, PartialEq, Eq)]
enum Commit {
    Discovery,
    Availability { user: String, online: bool },
    Value { user: String, metric: TopicMetric },
}

/// Decides what to publish for each snapshot.
///
/// Metric topics are sent only when their formatted value changes,
/// availability only on change, discovery once. State advances only for
/// messages the client accepted, so a rejected message is planned again.
#[derive(Debug)]
pub struct MqttPlanner {
    base_topic: String,
    discovery_prefix: String,
    discovery: bool,
    retain: bool,
    qos_level: u8,
    topics: UserTopics,
    discovery_sent: HashSet<String>,
    last_values: HashMap<(String, TopicMetric), String>,
    availability: HashMap<String, bool>,
}

impl MqttPlanner {
    pub fn new(config: &MqttSinkConfig, topics: UserTopics) -> Self {
        Self {
            base_topic: config.base_topic.clone(),
            discovery_prefix: config.discovery_prefix.clone(),
            discovery: config.discovery,
            retain: config.retain,
            qos_level: qos_level(config.qos),
            topics,
            discovery_sent: HashSet::new(),
            last_values: HashMap::new(),
            availability: HashMap::new(),
        }
    }

    fn user_topic(&self, user: &str, leaf: &str) -> String {
        format!("{}/users/{}/{}", self.base_topic, user, leaf)
    }

    pub fn plan(&self, snapshot: &Snapshot) -> Vec<MqttMessage> {
        let mut messages = Vec::new();

        if self.discovery {
            messages.extend(
                self.discovery_messages()
                    .into_iter()
                    .filter(|m| !self.discovery_sent.contains(&m.topic)),
            );
        }

        for user in &snapshot.users {
            if self.availability.get(&user.name) != Some(&user.online) {
                messages.push(self.availability_message(&user.name, user.online));
            }

            for metric in METRICS {
                let Some(payload) = metric.payload(user) else {
                    continue;
                };
                if self.last_values.get(&(user.name.clone(), metric)) == Some(&payload) {
                    continue;
                }
                messages.push(MqttMessage {
                    topic: self.user_topic(&user.name, metric.as_str()),
                    payload,
                    retain: self.retain,
                    commit: Commit::Value {
                        user: user.name.clone(),
                        metric,
                    },
                });
            }
        }

        messages
    }

    /// Record a message as delivered to the client.
    pub fn commit(&mut self, message: &MqttMessage) {
        match &message.commit {
            Commit::Discovery => {
                self.discovery_sent.insert(message.topic.clone());
            }
            Commit::Availability { user, online } => {
                self.availability.insert(user.clone(), *online);
            }
            Commit::Value { user, metric } => {
                self.last_values
                    .insert((user.clone(), *metric), message.payload.clone());
            }
        }
    }

    /// Hand `messages` to `publish` in order, committing each accepted one.
    ///
    /// Stops at the first rejection; the remaining messages stay uncommitted
    /// and come back from the next `plan`.
    pub fn publish_with<E>(
        &mut self,
        messages: Vec<MqttMessage>,
        mut publish: impl FnMut(&MqttMessage) -> Result<(), E>,
    ) -> Result<(), E> {
        for message in messages {
            publish(&message)?;
            self.commit(&message);
        }
        Ok(())
    }

    /// `offline` for every known user
    pub fn offline_messages(&self) -> Vec<MqttMessage> {
        let mut names: Vec<&String> = self.topics.users.iter().map(|(name, _)| name).collect();
        let mut extra: Vec<&String> = self
            .availability
            .keys()
            .filter(|name| !names.contains(name))
            .collect();
        extra.sort();
        names.extend(extra);

        names
            .into_iter()
            .map(|name| self.availability_message(name, false))
            .collect()
    }

    fn availability_message(&self, user: &str, online: bool) -> MqttMessage {
        MqttMessage {
            topic: self.user_topic(user, "availability"),
            payload: if online { ONLINE } else { OFFLINE }.to_string(),
            retain: true,
            commit: Commit::Availability {
                user: user.to_string(),
                online,
            },
        }
    }

    fn discovery_messages(&self) -> Vec<MqttMessage> {
        let mut messages = Vec::new();
        for (user, metrics) in &self.topics.users {
            let device = json!({
                "identifiers": [format!("{}_user_{}", self.base_topic, user)],
                "manufacturer": "ANT+ Fusion",
                "model": "ANT+ Monitor",
                "name": format!("{} {}", self.base_topic, user),
            });

            for metric in metrics {
                let object_id = format!("{}_{}_{}", self.base_topic, user, metric.as_str());
                let mut doc = json!({
                    "name": format!("{} {}", user, metric.label()),
                    "unique_id": object_id,
                    "state_topic": self.user_topic(user, metric.as_str()),
                    "availability_topic": self.user_topic(user, "availability"),
                    "payload_available": ONLINE,
                    "payload_not_available": OFFLINE,
                    "qos": self.qos_level,
                    "retain": self.retain,
                    "unit_of_measurement": metric.unit(),
                    "icon": metric.icon(),
                    "state_class": "measurement",
                    "device": device,
                });
                if *metric == TopicMetric::Distance {
                    doc["state_class"] = json!("total_increasing");
                    doc["device_class"] = json!("distance");
                }

                messages.push(MqttMessage {
                    topic: format!("{}/sensor/{}/config", self.discovery_prefix, object_id),
                    payload: doc.to_string(),
                    retain: true,
                    commit: Commit::Discovery,
                });
            }
        }
        messages
    }
}

/// Sink publishing to an MQTT broker
pub struct MqttSink {
    name: String,
    client: AsyncClient,
    qos: QoS,
    planner: MqttPlanner,
    event_task: Option<JoinHandle<()>>,
}

impl MqttSink {
    /// Build the client and start its event loop. Connection happens in the
    /// background and is retried until the sink is closed.
    pub fn connect(name: impl Into<String>, config: MqttSinkConfig, topics: UserTopics) -> Self {
        let name = name.into();
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.clone().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, 256);
        info!(sink = %name, host = %config.host, port = config.port, "connecting to MQTT broker");
        let event_task = tokio::spawn(drive_event_loop(name.clone(), eventloop));

        Self {
            planner: MqttPlanner::new(&config, topics),
            name,
            client,
            qos: config.qos,
            event_task: Some(event_task),
        }
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
        topics: UserTopics,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = MqttSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Ok(Self::connect(name, config, topics))
    }

    fn send(&mut self, messages: Vec<MqttMessage>) -> Result<(), ContractError> {
        let name = &self.name;
        let client = &self.client;
        let qos = self.qos;

        self.planner.publish_with(messages, |message| {
            debug!(sink = %name, topic = %message.topic, payload = %message.payload, "publish");
            client
                .try_publish(
                    message.topic.clone(),
                    qos,
                    message.retain,
                    message.payload.clone(),
                )
                .map_err(|e| ContractError::sink_write(name, e.to_string()))
        })
    }
}

async fn drive_event_loop(name: String, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!(sink = %name, "MQTT connected");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(sink = %name, "MQTT disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(sink = %name, error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

impl SnapshotSink for MqttSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "mqtt_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, tick_id = snapshot.tick_id)
    )]
    async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError> {
        let messages = self.planner.plan(snapshot);
        self.send(messages)
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "mqtt_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let offline = self.planner.offline_messages();
        let sent = self.send(offline);

        if let Err(e) = self.client.try_disconnect() {
            warn!(sink = %self.name, error = %e, "MQTT disconnect request failed");
        }

        if let Some(task) = self.event_task.take() {
            let abort = task.abort_handle();
            if tokio::time::timeout(Duration::from_secs(2), task).await.is_err() {
                warn!(sink = %self.name, "MQTT event loop did not stop in time");
                abort.abort();
            }
        }

        info!(sink = %self.name, "MqttSink closed");
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Availability, BikeState, DeviceId, HeartRateState, RoleStatus};

    fn make_config() -> MqttSinkConfig {
        let params = HashMap::from([("host".to_string(), "localhost".to_string())]);
        MqttSinkConfig::from_params(&params).unwrap()
    }

    fn status(available: bool) -> RoleStatus {
        RoleStatus {
            availability: if available {
                Availability::Available
            } else {
                Availability::Unknown
            },
            active_device: available.then_some(DeviceId::new(1)),
            availability_changed: false,
        }
    }

    fn make_user(bpm: Option<u8>, speed: Option<f64>, distance_m: f64) -> UserState {
        UserState {
            name: "alice".to_string(),
            heart_rate: HeartRateState {
                bpm,
                rr_intervals_ms: Vec::new(),
                status: status(bpm.is_some()),
            },
            bike: BikeState {
                speed_kmh: speed,
                cadence_rpm: None,
                distance_m,
                speed: status(speed.is_some()),
                cadence: status(false),
            },
            online: bpm.is_some() || speed.is_some(),
            online_changed: false,
        }
    }

    fn snapshot(user: UserState) -> Snapshot {
        Snapshot {
            tick_id: 1,
            timestamp: 0.0,
            users: vec![user],
        }
    }

    fn topics() -> UserTopics {
        UserTopics::new(vec![(
            "alice".to_string(),
            vec![TopicMetric::Hr, TopicMetric::Speed, TopicMetric::Distance],
        )])
    }

    /// Plan and accept everything, returning what was published
    fn publish_all(planner: &mut MqttPlanner, snapshot: &Snapshot) -> Vec<MqttMessage> {
        let mut sent = Vec::new();
        let messages = planner.plan(snapshot);
        planner
            .publish_with(messages, |m| {
                sent.push(m.clone());
                Ok::<_, ()>(())
            })
            .unwrap();
        sent
    }

    fn find<'a>(messages: &'a [MqttMessage], topic: &str) -> Option<&'a MqttMessage> {
        messages.iter().find(|m| m.topic == topic)
    }

    #[test]
    fn test_config_defaults() {
        let config = make_config();
        assert_eq!(config.port, 1883);
        assert_eq!(config.base_topic, "pyantdisplay");
        assert_eq!(config.discovery_prefix, "homeassistant");
        assert_eq!(config.qos, QoS::AtLeastOnce);
        assert!(config.retain);
        assert!(config.discovery);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        let mut params = HashMap::from([("host".to_string(), "h".to_string())]);
        params.insert("qos".to_string(), "3".to_string());
        assert!(MqttSinkConfig::from_params(&params).is_err());

        params.insert("qos".to_string(), "0".to_string());
        params.insert("port".to_string(), "not-a-port".to_string());
        assert!(MqttSinkConfig::from_params(&params).is_err());

        assert!(MqttSinkConfig::from_params(&HashMap::new()).is_err());
    }

    #[test]
    fn test_payload_formatting() {
        let planner = MqttPlanner::new(&make_config(), UserTopics::default());
        let messages = planner.plan(&snapshot(make_user(Some(142), Some(22.684), 6300.0)));

        assert_eq!(find(&messages, "pyantdisplay/users/alice/hr").unwrap().payload, "142");
        assert_eq!(find(&messages, "pyantdisplay/users/alice/speed").unwrap().payload, "22.68");
        assert_eq!(find(&messages, "pyantdisplay/users/alice/distance").unwrap().payload, "6.300");
        let availability = find(&messages, "pyantdisplay/users/alice/availability").unwrap();
        assert_eq!(availability.payload, "online");
        assert!(availability.retain);
        assert!(find(&messages, "pyantdisplay/users/alice/cadence").is_none());
    }

    #[test]
    fn test_unchanged_values_not_republished() {
        let mut planner = MqttPlanner::new(&make_config(), UserTopics::default());
        publish_all(&mut planner, &snapshot(make_user(Some(120), Some(20.0), 100.0)));

        let messages = publish_all(&mut planner, &snapshot(make_user(Some(120), Some(20.001), 100.0)));
        assert!(messages.is_empty());

        let messages = publish_all(&mut planner, &snapshot(make_user(Some(121), Some(20.0), 100.0)));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].topic, "pyantdisplay/users/alice/hr");
    }

    #[test]
    fn test_availability_only_on_change() {
        let mut planner = MqttPlanner::new(&make_config(), UserTopics::default());
        publish_all(&mut planner, &snapshot(make_user(Some(120), None, 0.0)));

        let offline = publish_all(&mut planner, &snapshot(make_user(None, None, 0.0)));
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].payload, "offline");

        assert!(publish_all(&mut planner, &snapshot(make_user(None, None, 0.0))).is_empty());
    }

    #[test]
    fn test_discovery_sent_once() {
        let mut planner = MqttPlanner::new(&make_config(), topics());

        let first = publish_all(&mut planner, &snapshot(make_user(None, None, 0.0)));
        let configs: Vec<_> = first
            .iter()
            .filter(|m| m.topic.starts_with("homeassistant/sensor/"))
            .collect();
        assert_eq!(configs.len(), 3);
        assert!(configs
            .iter()
            .any(|m| m.topic == "homeassistant/sensor/pyantdisplay_alice_hr/config"));

        let doc: serde_json::Value = serde_json::from_str(&configs[0].payload).unwrap();
        assert_eq!(doc["state_topic"], "pyantdisplay/users/alice/hr");
        assert_eq!(doc["availability_topic"], "pyantdisplay/users/alice/availability");
        assert_eq!(doc["unit_of_measurement"], "bpm");

        let second = publish_all(&mut planner, &snapshot(make_user(None, None, 0.0)));
        assert!(second.iter().all(|m| !m.topic.starts_with("homeassistant/")));
    }

    #[test]
    fn test_offline_on_close() {
        let mut planner = MqttPlanner::new(&make_config(), topics());
        publish_all(&mut planner, &snapshot(make_user(Some(100), None, 0.0)));

        let messages = planner.offline_messages();
        assert_eq!(
            messages,
            vec![MqttMessage {
                topic: "pyantdisplay/users/alice/availability".to_string(),
                payload: "offline".to_string(),
                retain: true,
                commit: Commit::Availability {
                    user: "alice".to_string(),
                    online: false,
                },
            }]
        );
    }

    #[test]
    fn test_rejected_messages_are_planned_again() {
        let mut planner = MqttPlanner::new(&make_config(), UserTopics::default());
        publish_all(&mut planner, &snapshot(make_user(Some(120), None, 0.0)));

        // Client queue full: the offline edge and the rest are rejected.
        let dropped = snapshot(make_user(None, None, 0.0));
        let messages = planner.plan(&dropped);
        assert_eq!(messages.len(), 1);
        let mut attempts = 0;
        let result = planner.publish_with(messages, |_| {
            attempts += 1;
            Err("request queue full")
        });
        assert_eq!(result, Err("request queue full"));
        assert_eq!(attempts, 1);

        let retried = publish_all(&mut planner, &dropped);
        assert_eq!(retried.len(), 1);
        assert_eq!(retried[0].topic, "pyantdisplay/users/alice/availability");
        assert_eq!(retried[0].payload, "offline");

        assert!(publish_all(&mut planner, &dropped).is_empty());
    }

    #[test]
    fn test_partial_publish_commits_accepted_prefix() {
        let mut planner = MqttPlanner::new(&make_config(), topics());
        let first = snapshot(make_user(Some(130), Some(25.0), 1000.0));

        // discovery (3) + availability + hr go out, then the client rejects
        let messages = planner.plan(&first);
        let accepted = 5;
        let mut sent = 0;
        let result = planner.publish_with(messages, |_| {
            if sent == accepted {
                return Err(());
            }
            sent += 1;
            Ok(())
        });
        assert!(result.is_err());

        let retried = publish_all(&mut planner, &first);
        let topics: Vec<&str> = retried.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(
            topics,
            vec!["pyantdisplay/users/alice/speed", "pyantdisplay/users/alice/distance"]
        );
    }

    #[test]
    fn test_user_topics_from_blueprint() {
        let blueprint: FusionBlueprint = serde_json::from_value(json!({
            "users": [
                { "name": "alice", "hr_device_id": 11, "speed_device_id": 21 },
                { "name": "bob", "hr_device_ids": [12] }
            ],
            "shared_bike": { "cadence_device_id": 40 }
        }))
        .unwrap();

        let topics = UserTopics::from_blueprint(&blueprint);
        assert_eq!(
            topics.metrics_for("alice"),
            &[
                TopicMetric::Hr,
                TopicMetric::Speed,
                TopicMetric::Cadence,
                TopicMetric::Distance
            ]
        );
        assert_eq!(topics.metrics_for("bob"), &[TopicMetric::Hr, TopicMetric::Cadence]);
        assert!(topics.metrics_for("carol").is_empty());
    }
}
