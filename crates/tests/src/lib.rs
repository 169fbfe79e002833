//! # Integration Tests
//!
//! End-to-end tests across the workspace crates.
//!
//! Covers:
//! - configuration to engine wiring
//! - simulated devices through ingestion, engine task and fusion bus
//! - failover, staleness and shared-bike attribution on recorded frame sequences

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{DeviceId, Role};

    #[test]
    fn test_blueprint_to_engine_config() {
        let blueprint = ConfigLoader::load_from_str(
            r#"
            [fusion]
            wheel_circumference_m = 2.1
            stale_secs = 5.0

            [[users]]
            name = "alice"
            hr_device_ids = [11, 12]
            speed_device_id = 21
            cadence_device_id = 21

            [[users]]
            name = "bob"
            hr_device_id = 13

            [shared_bike]
            speed_device_id = 30

            [[sinks]]
            name = "log"
            sink_type = "log"
            "#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let config = blueprint.to_engine_config();
        assert_eq!(config.users.len(), 2);
        assert_eq!(
            config.users[0].candidates(Role::HeartRate),
            &[DeviceId::new(11), DeviceId::new(12)]
        );
        assert_eq!(config.users[1].candidates(Role::HeartRate), &[DeviceId::new(13)]);
        assert_eq!(
            config.shared_bike.unwrap().device_for(Role::Speed),
            Some(DeviceId::new(30))
        );
        assert_eq!(config.stale_secs, 5.0);
        assert_eq!(blueprint.all_device_ids().len(), 5);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use contracts::{
        Availability, ContractError, DeviceId, EngineConfig, PlausibilityLimits, RawFrame,
        RevolutionCounter, SharedBike, Snapshot, SnapshotSink, UserRoster,
    };
    use fusion_bus::FusionBus;
    use fusion_engine::{EngineRunner, FusionEngine, RunnerConfig};
    use ingestion::payload::{heart_rate_page, single_counter_page};
    use ingestion::{IngestionPipeline, MockFrameSource, MonotonicClock};
    use tokio::sync::watch;

    /// Keeps every snapshot it receives
    #[derive(Clone, Default)]
    struct CollectingSink {
        snapshots: Arc<Mutex<Vec<Snapshot>>>,
    }

    impl SnapshotSink for CollectingSink {
        fn name(&self) -> &str {
            "collector"
        }

        async fn write(&mut self, snapshot: &Snapshot) -> Result<(), ContractError> {
            self.snapshots.lock().unwrap().push(snapshot.clone());
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn roster(name: &str, hr: &[u16], bike: Option<u16>) -> UserRoster {
        UserRoster {
            name: name.to_string(),
            heart_rate: hr.iter().copied().map(DeviceId::new).collect(),
            speed: bike.map(DeviceId::new),
            cadence: bike.map(DeviceId::new),
        }
    }

    fn engine_config(users: Vec<UserRoster>, stale_secs: f64) -> EngineConfig {
        EngineConfig {
            users,
            shared_bike: None,
            wheel_circumference_m: 2.105,
            stale_secs,
            limits: PlausibilityLimits::default(),
        }
    }

    fn hr_frame(device_id: u16, t: f64, beat: u16, bpm: u8) -> RawFrame {
        let page = heart_rate_page(
            0,
            0,
            beat.wrapping_mul(1024),
            (beat % 256) as u8,
            bpm,
        );
        RawFrame::new(device_id, 120, page.to_vec(), t)
    }

    fn wheel_frame(device_id: u16, t: f64, revolutions: u16, event_time: u16) -> RawFrame {
        let page = single_counter_page(RevolutionCounter {
            revolutions,
            event_time,
        });
        RawFrame::new(device_id, 123, page.to_vec(), t)
    }

    /// Run simulated devices through ingestion, the engine task and the bus.
    async fn run_mock_pipeline(
        config: EngineConfig,
        sources: Vec<MockFrameSource>,
        clock: MonotonicClock,
        runner_config: RunnerConfig,
    ) -> Vec<Snapshot> {
        let mut ingestion = IngestionPipeline::new(256);
        for source in sources {
            ingestion.register_source(Box::new(source)).unwrap();
        }

        let sink = CollectingSink::default();
        let collected = Arc::clone(&sink.snapshots);
        let mut bus = FusionBus::new();
        bus.subscribe(sink, 64);

        ingestion.start_all();
        let frames = ingestion.take_receiver().unwrap();
        let runner = EngineRunner::new(FusionEngine::new(config), frames, clock, runner_config);

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = tokio::time::timeout(
            Duration::from_secs(10),
            runner.run(shutdown_rx, |snapshot| bus.publish(snapshot)),
        )
        .await
        .expect("engine task timed out");

        ingestion.stop_all();
        let report = bus.shutdown().await;
        assert_eq!(report[0].1.delivered, engine.stats().ticks);

        let snapshots = collected.lock().unwrap().clone();
        snapshots
    }

    /// Mock straps and bike sensor -> ingestion -> engine task -> bus -> sink
    #[tokio::test]
    async fn test_e2e_mock_pipeline() {
        let clock = MonotonicClock::new();
        let sources = vec![
            MockFrameSource::heart_rate(11, 90.0, clock).with_rate_hz(20.0),
            MockFrameSource::speed_cadence(21, 25.0, 85.0, clock).with_rate_hz(20.0),
        ];
        let config = engine_config(vec![roster("alice", &[11], Some(21))], 10.0);

        let snapshots = run_mock_pipeline(
            config,
            sources,
            clock,
            RunnerConfig {
                tick_interval: Duration::from_millis(100),
                max_ticks: Some(15),
            },
        )
        .await;

        assert_eq!(snapshots.len(), 15);
        let ticks: Vec<u64> = snapshots.iter().map(|s| s.tick_id).collect();
        assert_eq!(ticks, (1..=15).collect::<Vec<_>>());

        let last = snapshots.last().unwrap().user("alice").unwrap();
        assert!(last.online);
        assert_eq!(last.heart_rate.status.active_device, Some(DeviceId::new(11)));
        let bpm = last.heart_rate.bpm.unwrap();
        assert!((84..=96).contains(&bpm), "bpm {bpm}");

        let speed = last.bike.speed_kmh.unwrap();
        assert!((15.0..35.0).contains(&speed), "speed {speed}");
        let cadence = last.bike.cadence_rpm.unwrap();
        assert!((60.0..110.0).contains(&cadence), "cadence {cadence}");
        assert!(last.bike.distance_m > 0.0);

        // distance never decreases
        let distances: Vec<f64> = snapshots
            .iter()
            .map(|s| s.users[0].bike.distance_m)
            .collect();
        assert!(distances.windows(2).all(|w| w[1] >= w[0]));
    }

    /// A strap that stops broadcasting goes stale exactly once
    #[tokio::test]
    async fn test_e2e_strap_dropout_goes_stale() {
        let clock = MonotonicClock::new();
        let sources = vec![MockFrameSource::heart_rate(11, 70.0, clock)
            .with_rate_hz(20.0)
            .with_window(Duration::ZERO, Some(Duration::from_millis(300)))];
        let config = engine_config(vec![roster("alice", &[11], None)], 0.3);

        let snapshots = run_mock_pipeline(
            config,
            sources,
            clock,
            RunnerConfig {
                tick_interval: Duration::from_millis(100),
                max_ticks: Some(15),
            },
        )
        .await;

        let statuses: Vec<_> = snapshots
            .iter()
            .map(|s| s.users[0].heart_rate.status)
            .collect();
        assert!(statuses.iter().any(|s| s.availability == Availability::Available));
        assert_eq!(statuses.last().unwrap().availability, Availability::Stale);

        let went_stale = statuses
            .iter()
            .filter(|s| s.availability_changed && s.availability == Availability::Stale)
            .count();
        assert_eq!(went_stale, 1);
    }

    /// Primary strap drops out; the backup takes over and keeps the role
    /// after the primary returns.
    #[test]
    fn test_e2e_failover_with_hysteresis() {
        let config = engine_config(vec![roster("alice", &[11, 12], None)], 10.0);
        let mut engine = FusionEngine::new(config);

        for beat in 0..6u16 {
            engine.ingest(&hr_frame(11, f64::from(beat), beat, 120)).unwrap();
        }
        for beat in 3..6u16 {
            engine.ingest(&hr_frame(12, f64::from(beat), beat, 125)).unwrap();
        }

        // both fresh at t=5: primary stays
        let snapshot = engine.tick(5.0);
        assert_eq!(
            snapshot.users[0].heart_rate.status.active_device,
            Some(DeviceId::new(11))
        );

        for beat in 6..20u16 {
            engine.ingest(&hr_frame(12, f64::from(beat), beat, 125)).unwrap();
        }

        // primary last seen at 5 is stale at 19; backup takes over
        let snapshot = engine.tick(19.0);
        let hr = &snapshot.users[0].heart_rate;
        assert_eq!(hr.status.active_device, Some(DeviceId::new(12)));
        assert_eq!(hr.bpm, Some(125));
        assert_eq!(hr.status.availability, Availability::Available);
        assert!(!hr.status.availability_changed);

        // primary returns while backup is fresh: no switch back
        engine.ingest(&hr_frame(11, 20.0, 6, 118)).unwrap();
        let snapshot = engine.tick(20.0);
        assert_eq!(
            snapshot.users[0].heart_rate.status.active_device,
            Some(DeviceId::new(12))
        );
    }

    /// The shared bike follows whoever has an active heart-rate strap.
    #[test]
    fn test_e2e_shared_bike_handoff() {
        let mut config = engine_config(
            vec![roster("alice", &[11], None), roster("bob", &[12], None)],
            10.0,
        );
        config.shared_bike = Some(SharedBike {
            speed: Some(DeviceId::new(30)),
            cadence: None,
        });
        let mut engine = FusionEngine::new(config);

        engine.ingest(&hr_frame(11, 0.0, 1, 110)).unwrap();
        engine.ingest(&wheel_frame(30, 0.0, 0, 0)).unwrap();
        engine.ingest(&wheel_frame(30, 1.0, 3, 1024)).unwrap();

        let snapshot = engine.tick(1.0);
        let alice = snapshot.user("alice").unwrap();
        let bob = snapshot.user("bob").unwrap();
        assert_eq!(alice.bike.speed.active_device, Some(DeviceId::new(30)));
        assert!((alice.bike.distance_m - 6.315).abs() < 1e-9);
        assert_eq!(bob.bike.speed.availability, Availability::Unknown);
        assert_eq!(engine.shared_rider(), Some("alice"));

        // alice leaves, bob straps in
        engine.ingest(&hr_frame(12, 20.0, 1, 100)).unwrap();
        engine.ingest(&wheel_frame(30, 21.0, 6, 2048)).unwrap();

        let snapshot = engine.tick(21.0);
        let alice = snapshot.user("alice").unwrap();
        let bob = snapshot.user("bob").unwrap();
        assert_eq!(engine.shared_rider(), Some("bob"));
        assert_eq!(bob.bike.speed.active_device, Some(DeviceId::new(30)));
        assert!((bob.bike.distance_m - 6.315).abs() < 1e-9);
        assert!((alice.bike.distance_m - 6.315).abs() < 1e-9);
        assert_eq!(alice.bike.speed.availability, Availability::Stale);
        assert!(!alice.online);
    }

    /// Configured sinks receive engine snapshots as JSON lines.
    #[tokio::test]
    async fn test_e2e_snapshots_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshots.jsonl");

        let blueprint = config_loader::ConfigLoader::load_from_str(
            &format!(
                r#"{{
                    "users": [{{ "name": "alice", "hr_device_ids": [11] }}],
                    "sinks": [
                        {{ "name": "file", "sink_type": "file", "params": {{ "path": {:?} }} }},
                        {{ "name": "log", "sink_type": "log" }}
                    ]
                }}"#,
                path.to_string_lossy()
            ),
            config_loader::ConfigFormat::Json,
        )
        .unwrap();

        let mut engine = FusionEngine::new(blueprint.to_engine_config());
        let mut bus = FusionBus::from_blueprint(&blueprint).await.unwrap();
        assert_eq!(bus.sink_count(), 2);

        engine.ingest(&hr_frame(11, 0.0, 1, 133)).unwrap();
        for t in 1..=3 {
            bus.publish(Arc::new(engine.tick(f64::from(t))));
        }
        let report: HashMap<String, _> = bus.shutdown().await.into_iter().collect();
        assert_eq!(report["file"].delivered, 3);

        let lines: Vec<serde_json::Value> = std::fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["tick_id"], 3);
        assert_eq!(lines[0]["users"][0]["name"], "alice");
        assert_eq!(lines[0]["users"][0]["heart_rate"]["bpm"], 133);
    }
}
