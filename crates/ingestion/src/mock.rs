//! Mock frame source
//!
//! Implements `FrameSource` with synthetic ANT+ pages so the whole pipeline
//! can run without a radio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use contracts::{DeviceId, DeviceType, FrameCallback, FrameSource, RawFrame, RevolutionCounter};
use tracing::{debug, trace};

use crate::clock::MonotonicClock;
use crate::payload::{
    heart_rate_page, single_counter_page, speed_cadence_page, EVENT_TIME_HZ,
    HR_PAGE_PREVIOUS_BEAT,
};

/// Mock device configuration
#[derive(Debug, Clone)]
pub struct MockDeviceConfig {
    pub device_id: DeviceId,
    pub device_type: DeviceType,

    /// Mean heart rate (HR only)
    pub base_bpm: f64,

    /// Simulated speed (speed sensors)
    pub speed_kmh: f64,

    /// Simulated cadence (cadence sensors)
    pub cadence_rpm: f64,

    pub wheel_circumference_m: f64,

    /// Broadcast rate (Hz); defaults to the profile's channel period
    pub rate_hz: f64,

    /// Stay silent until this much time has passed since `listen`
    pub start_after: Duration,

    /// Stop broadcasting after this much time (simulates a dropped strap)
    pub active_for: Option<Duration>,
}

impl MockDeviceConfig {
    pub fn new(device_id: u16, device_type: DeviceType) -> Self {
        Self {
            device_id: DeviceId::new(device_id),
            device_type,
            base_bpm: 72.0,
            speed_kmh: 25.0,
            cadence_rpm: 85.0,
            wheel_circumference_m: 2.105,
            rate_hz: 32768.0 / f64::from(device_type.channel_period()),
            start_after: Duration::ZERO,
            active_for: None,
        }
    }
}

/// Deterministic page generator for one device.
///
/// Advances beat and revolution counters in simulated time so consecutive
/// frames carry consistent event times.
#[derive(Debug, Clone)]
pub struct MockPageGenerator {
    config: MockDeviceConfig,
    frames: u64,
    last_t: Option<f64>,

    // heart rate
    beat_count: u8,
    beat_time: f64,
    prev_beat_time: f64,
    next_beat: f64,

    // revolutions (fractional accumulators)
    wheel_revs: f64,
    wheel_event: f64,
    crank_revs: f64,
    crank_event: f64,
}

impl MockPageGenerator {
    pub fn new(config: MockDeviceConfig) -> Self {
        Self {
            config,
            frames: 0,
            last_t: None,
            beat_count: 0,
            beat_time: 0.0,
            prev_beat_time: 0.0,
            next_beat: 0.0,
            wheel_revs: 0.0,
            wheel_event: 0.0,
            crank_revs: 0.0,
            crank_event: 0.0,
        }
    }

    /// Heart rate at simulated time `t`: slow drift around the base value.
    pub fn bpm_at(&self, t: f64) -> f64 {
        (self.config.base_bpm + 6.0 * (t / 30.0).sin()).clamp(30.0, 220.0)
    }

    /// Build the frame broadcast at time `t` (seconds, non-decreasing).
    pub fn frame_at(&mut self, t: f64) -> RawFrame {
        let dt = self.last_t.map_or(0.0, |last| (t - last).max(0.0));
        self.last_t = Some(t);
        self.frames += 1;

        let payload = match self.config.device_type {
            DeviceType::HeartRate => self.heart_rate_payload(t),
            DeviceType::SpeedCadence => {
                self.advance_wheel(t, dt);
                self.advance_crank(t, dt);
                speed_cadence_page(self.crank_counter(), self.wheel_counter())
            }
            DeviceType::Speed => {
                self.advance_wheel(t, dt);
                single_counter_page(self.wheel_counter())
            }
            DeviceType::Cadence => {
                self.advance_crank(t, dt);
                single_counter_page(self.crank_counter())
            }
        };

        RawFrame::new(
            self.config.device_id.get(),
            self.config.device_type.code(),
            payload.to_vec(),
            t,
        )
    }

    fn heart_rate_payload(&mut self, t: f64) -> [u8; 8] {
        if self.frames == 1 {
            self.next_beat = t;
        }
        while self.next_beat <= t {
            self.prev_beat_time = self.beat_time;
            self.beat_time = self.next_beat;
            self.beat_count = self.beat_count.wrapping_add(1);
            self.next_beat += 60.0 / self.bpm_at(self.next_beat);
        }

        // Toggle bit flips every 4 frames, as real straps do.
        let toggle = if (self.frames / 4) % 2 == 1 { 0x80 } else { 0x00 };
        heart_rate_page(
            HR_PAGE_PREVIOUS_BEAT | toggle,
            to_ticks(self.prev_beat_time),
            to_ticks(self.beat_time),
            self.beat_count,
            self.bpm_at(t).round() as u8,
        )
    }

    fn advance_wheel(&mut self, t: f64, dt: f64) {
        let revs_per_sec = self.config.speed_kmh / 3.6 / self.config.wheel_circumference_m;
        advance(&mut self.wheel_revs, &mut self.wheel_event, revs_per_sec, t, dt);
    }

    fn advance_crank(&mut self, t: f64, dt: f64) {
        let revs_per_sec = self.config.cadence_rpm / 60.0;
        advance(&mut self.crank_revs, &mut self.crank_event, revs_per_sec, t, dt);
    }

    fn wheel_counter(&self) -> RevolutionCounter {
        counter(self.wheel_revs, self.wheel_event)
    }

    fn crank_counter(&self) -> RevolutionCounter {
        counter(self.crank_revs, self.crank_event)
    }
}

/// Advance a revolution accumulator; the event time moves to the moment the
/// last whole revolution completed.
fn advance(revs: &mut f64, event: &mut f64, revs_per_sec: f64, t: f64, dt: f64) {
    if revs_per_sec <= 0.0 {
        return;
    }
    let before = revs.floor();
    *revs += revs_per_sec * dt;
    let after = revs.floor();
    if after > before {
        let overshoot = (*revs - after) / revs_per_sec;
        *event = t - overshoot;
    }
}

fn counter(revs: f64, event: f64) -> RevolutionCounter {
    RevolutionCounter {
        revolutions: (revs.floor() as u64 % 65536) as u16,
        event_time: to_ticks(event),
    }
}

fn to_ticks(seconds: f64) -> u16 {
    ((seconds * EVENT_TIME_HZ).round() as u64 % 65536) as u16
}

/// Mock frame source
///
/// Generates frames for one device at its broadcast rate on a background
/// thread. Timestamps come from the shared clock.
pub struct MockFrameSource {
    source_id: String,
    config: MockDeviceConfig,
    clock: MonotonicClock,
    listening: Arc<AtomicBool>,
}

impl MockFrameSource {
    pub fn new(config: MockDeviceConfig, clock: MonotonicClock) -> Self {
        Self {
            source_id: format!("mock-{}-{}", config.device_type, config.device_id),
            config,
            clock,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn heart_rate(device_id: u16, bpm: f64, clock: MonotonicClock) -> Self {
        let mut config = MockDeviceConfig::new(device_id, DeviceType::HeartRate);
        config.base_bpm = bpm;
        Self::new(config, clock)
    }

    pub fn speed_cadence(device_id: u16, speed_kmh: f64, cadence_rpm: f64, clock: MonotonicClock) -> Self {
        let mut config = MockDeviceConfig::new(device_id, DeviceType::SpeedCadence);
        config.speed_kmh = speed_kmh;
        config.cadence_rpm = cadence_rpm;
        Self::new(config, clock)
    }

    pub fn with_rate_hz(mut self, rate_hz: f64) -> Self {
        self.config.rate_hz = rate_hz;
        self
    }

    pub fn with_window(mut self, start_after: Duration, active_for: Option<Duration>) -> Self {
        self.config.start_after = start_after;
        self.config.active_for = active_for;
        self
    }

    pub fn config(&self) -> &MockDeviceConfig {
        &self.config
    }
}

impl FrameSource for MockFrameSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: FrameCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let source_id = self.source_id.clone();
        let config = self.config.clone();
        let clock = self.clock;
        let listening = self.listening.clone();
        let interval = Duration::from_secs_f64(1.0 / config.rate_hz.max(0.1));

        thread::spawn(move || {
            let started = clock.now();
            let mut generator = MockPageGenerator::new(config.clone());

            debug!(
                source_id = %source_id,
                device_type = %config.device_type,
                rate_hz = config.rate_hz,
                "mock frame source started"
            );

            while listening.load(Ordering::Relaxed) {
                let now = clock.now();
                let running_for = Duration::from_secs_f64((now - started).max(0.0));

                if let Some(active_for) = config.active_for {
                    if running_for >= config.start_after + active_for {
                        debug!(source_id = %source_id, "mock device went silent");
                        break;
                    }
                }

                if running_for >= config.start_after {
                    let frame = generator.frame_at(now);
                    trace!(source_id = %source_id, timestamp = now, "mock frame sent");
                    callback(frame);
                }

                thread::sleep(interval);
            }

            listening.store(false, Ordering::SeqCst);
            debug!(source_id = %source_id, "mock frame source stopped");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::FrameDecoder;
    use std::sync::Mutex;

    #[test]
    fn test_generator_heart_rate_is_decodable() {
        let mut generator = MockPageGenerator::new(MockDeviceConfig::new(7, DeviceType::HeartRate));
        let mut decoder = FrameDecoder::new();

        let mut rr_total = 0;
        for i in 0..40 {
            let frame = generator.frame_at(i as f64 * 0.25);
            let sample = decoder.decode(&frame).unwrap();
            let hr = sample.as_heart_rate().unwrap();
            assert!((60..=90).contains(&hr.bpm), "bpm {}", hr.bpm);
            for rr in &hr.rr_intervals {
                let ms = rr.as_secs_f64() * 1000.0;
                assert!((600.0..1000.0).contains(&ms), "rr {ms}");
            }
            rr_total += hr.rr_intervals.len();
        }
        // ~10 s at ~72 bpm
        assert!(rr_total >= 8, "only {rr_total} intervals");
    }

    #[test]
    fn test_generator_wheel_counts_advance() {
        let mut config = MockDeviceConfig::new(9, DeviceType::Speed);
        config.speed_kmh = 36.0; // 10 m/s
        config.wheel_circumference_m = 2.0;
        let mut generator = MockPageGenerator::new(config);
        let mut decoder = FrameDecoder::new();

        generator.frame_at(0.0);
        let frame = generator.frame_at(1.0);
        let sample = decoder.decode(&frame).unwrap();
        let wheel = sample.as_cadence_speed().unwrap().wheel.unwrap();
        assert_eq!(wheel.revolutions, 5);
        assert_eq!(wheel.event_time, 1024);
    }

    #[test]
    fn test_mock_source_emits_frames() {
        let source = MockFrameSource::heart_rate(3, 70.0, MonotonicClock::new()).with_rate_hz(100.0);
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();

        source.listen(Arc::new(move |frame| sink.lock().unwrap().push(frame)));
        assert!(source.is_listening());
        thread::sleep(Duration::from_millis(80));
        source.stop();

        let frames = frames.lock().unwrap();
        assert!(!frames.is_empty());
        assert!(frames.iter().all(|f| f.device_id == DeviceId::new(3) && f.device_type == 120));
        assert!(frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_mock_source_goes_silent() {
        let source = MockFrameSource::heart_rate(3, 70.0, MonotonicClock::new())
            .with_rate_hz(200.0)
            .with_window(Duration::ZERO, Some(Duration::from_millis(20)));
        source.listen(Arc::new(|_| {}));
        thread::sleep(Duration::from_millis(120));
        assert!(!source.is_listening());
    }
}
