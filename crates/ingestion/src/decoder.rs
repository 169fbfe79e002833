//! Frame Decoder
//!
//! Turns `(device id, device type, payload)` into a typed [`Sample`].
//!
//! [`decode`] is pure: the only state it needs, the previous beat of the same
//! heart-rate device, is passed in. [`FrameDecoder`] owns that per-device
//! memory for the single ingestion path.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use contracts::{
    CadenceSpeedSample, DeviceId, DeviceType, HeartRateSample, RawFrame, RevolutionCounter, Sample,
};
use tracing::{trace, warn};

use crate::error::DecodeError;
use crate::payload::{bike, hr, read_u16, EVENT_TIME_HZ, HR_PAGE_PREVIOUS_BEAT, PAYLOAD_LEN};

/// Beat count and event time of the last heart-rate frame from a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatMarker {
    pub count: u8,
    pub event_time: u16,
}

/// Decode one frame.
///
/// # Errors
/// - `UnsupportedDeviceType` for unknown device type codes
/// - `MalformedPayload` for payloads shorter than one data page
/// - `NoSignal` for heart-rate pages reporting 0 BPM
pub fn decode(
    device_id: DeviceId,
    device_type: u8,
    payload: &[u8],
    last_beat: Option<BeatMarker>,
) -> Result<Sample, DecodeError> {
    let kind = DeviceType::from_code(device_type).ok_or(DecodeError::UnsupportedDeviceType {
        device_id,
        device_type,
    })?;

    if payload.len() < PAYLOAD_LEN {
        return Err(DecodeError::malformed(
            device_id,
            format!(
                "{kind} page needs {PAYLOAD_LEN} bytes, got {}",
                payload.len()
            ),
        ));
    }

    match kind {
        DeviceType::HeartRate => decode_heart_rate(device_id, payload, last_beat).map(Sample::HeartRate),
        DeviceType::SpeedCadence => Ok(Sample::CadenceSpeed(CadenceSpeedSample {
            wheel: Some(counter_at(payload, bike::SC_WHEEL_REVS, bike::SC_WHEEL_TIME)),
            crank: Some(counter_at(payload, bike::SC_CRANK_REVS, bike::SC_CRANK_TIME)),
        })),
        DeviceType::Speed => Ok(Sample::CadenceSpeed(CadenceSpeedSample {
            wheel: Some(counter_at(payload, bike::REVS, bike::EVENT_TIME)),
            crank: None,
        })),
        DeviceType::Cadence => Ok(Sample::CadenceSpeed(CadenceSpeedSample {
            wheel: None,
            crank: Some(counter_at(payload, bike::REVS, bike::EVENT_TIME)),
        })),
    }
}

fn counter_at(payload: &[u8], revs: usize, time: usize) -> RevolutionCounter {
    RevolutionCounter {
        revolutions: read_u16(payload, revs),
        event_time: read_u16(payload, time),
    }
}

fn decode_heart_rate(
    device_id: DeviceId,
    payload: &[u8],
    last_beat: Option<BeatMarker>,
) -> Result<HeartRateSample, DecodeError> {
    let bpm = payload[hr::COMPUTED_HR];
    if bpm == 0 {
        return Err(DecodeError::NoSignal { device_id });
    }

    let page = payload[hr::PAGE] & 0x7F;
    let beat_count = payload[hr::BEAT_COUNT];
    let beat_event_time = read_u16(payload, hr::BEAT_TIME);
    let prev_beat_time =
        (page == HR_PAGE_PREVIOUS_BEAT).then(|| read_u16(payload, hr::PREV_BEAT_TIME));

    Ok(HeartRateSample {
        bpm,
        beat_count,
        beat_event_time,
        rr_intervals: new_rr_intervals(last_beat, beat_count, beat_event_time, prev_beat_time),
    })
}

/// RR intervals that are new relative to `last`.
///
/// - unchanged beat count: retransmission, nothing new
/// - count advanced by one: interval between the two event times
/// - larger jump or no history: only the page-4 previous-beat field can give
///   an interval ending at the current beat
pub fn new_rr_intervals(
    last: Option<BeatMarker>,
    beat_count: u8,
    beat_event_time: u16,
    prev_beat_time: Option<u16>,
) -> Vec<Duration> {
    let ticks = match last {
        Some(marker) if marker.count == beat_count => None,
        Some(marker) if beat_count.wrapping_sub(marker.count) == 1 => {
            Some(beat_event_time.wrapping_sub(marker.event_time))
        }
        _ => prev_beat_time.map(|prev| beat_event_time.wrapping_sub(prev)),
    };

    ticks
        .filter(|&t| t > 0)
        .map(|t| Duration::from_secs_f64(f64::from(t) / EVENT_TIME_HZ))
        .into_iter()
        .collect()
}

/// Stateful decoder for the ingestion path
///
/// Remembers the last beat per heart-rate device and reports each
/// unsupported device only once.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    beats: HashMap<DeviceId, BeatMarker>,
    unsupported_seen: HashSet<DeviceId>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a frame, updating the beat memory on success.
    ///
    /// Rejections are logged here: malformed payloads at warn, unsupported
    /// device types at warn once per device, missing signal at trace.
    pub fn decode(&mut self, frame: &RawFrame) -> Result<Sample, DecodeError> {
        let last = self.beats.get(&frame.device_id).copied();
        let result = decode(frame.device_id, frame.device_type, &frame.payload, last);

        match &result {
            Ok(Sample::HeartRate(sample)) => {
                self.beats.insert(
                    frame.device_id,
                    BeatMarker {
                        count: sample.beat_count,
                        event_time: sample.beat_event_time,
                    },
                );
            }
            Ok(Sample::CadenceSpeed(_)) => {}
            Err(err) => self.log_rejection(err),
        }

        result
    }

    fn log_rejection(&mut self, err: &DecodeError) {
        match err {
            DecodeError::UnsupportedDeviceType { device_id, device_type } => {
                if self.unsupported_seen.insert(*device_id) {
                    warn!(device_id = %device_id, device_type, "ignoring unsupported device type");
                }
            }
            DecodeError::MalformedPayload { device_id, message } => {
                warn!(device_id = %device_id, message = %message, "dropping malformed frame");
            }
            DecodeError::NoSignal { device_id } => {
                trace!(device_id = %device_id, "heart-rate strap reports no signal");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{heart_rate_page, single_counter_page, speed_cadence_page};
    use rand::Rng;

    const HR: u8 = 120;

    fn hr_frame(id: u16, count: u8, time: u16, bpm: u8) -> RawFrame {
        RawFrame::new(id, HR, heart_rate_page(0, 0, time, count, bpm).to_vec(), 0.0)
    }

    fn ms(d: &Duration) -> f64 {
        d.as_secs_f64() * 1000.0
    }

    #[test]
    fn test_decode_bpm() {
        let payload = heart_rate_page(0, 0, 1024, 7, 142);
        let sample = decode(DeviceId::new(1), HR, &payload, None).unwrap();
        let hr = sample.as_heart_rate().unwrap();
        assert_eq!(hr.bpm, 142);
        assert_eq!(hr.beat_count, 7);
        assert_eq!(hr.beat_event_time, 1024);
        assert!(hr.rr_intervals.is_empty());
    }

    #[test]
    fn test_zero_bpm_is_no_signal() {
        let payload = heart_rate_page(0, 0, 1024, 7, 0);
        let err = decode(DeviceId::new(1), HR, &payload, None).unwrap_err();
        assert_eq!(err, DecodeError::NoSignal { device_id: DeviceId::new(1) });
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let err = decode(DeviceId::new(1), HR, &[0, 1, 2], None).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload { .. }));
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn test_extended_payload_is_accepted() {
        let mut payload = heart_rate_page(0, 0, 1024, 7, 90).to_vec();
        payload.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        assert!(decode(DeviceId::new(1), HR, &payload, None).is_ok());
    }

    #[test]
    fn test_unsupported_device_type() {
        let err = decode(DeviceId::new(5), 11, &[0u8; 8], None).unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnsupportedDeviceType {
                device_id: DeviceId::new(5),
                device_type: 11
            }
        );
    }

    #[test]
    fn test_rr_from_consecutive_beats() {
        let last = Some(BeatMarker { count: 10, event_time: 1000 });
        let rr = new_rr_intervals(last, 11, 1000 + 819, None);
        assert_eq!(rr.len(), 1);
        assert!((ms(&rr[0]) - 799.8).abs() < 0.1);
    }

    #[test]
    fn test_rr_retransmission_is_ignored() {
        let last = Some(BeatMarker { count: 10, event_time: 1000 });
        assert!(new_rr_intervals(last, 10, 1000, Some(200)).is_empty());
    }

    #[test]
    fn test_rr_wraps_event_time_and_count() {
        let last = Some(BeatMarker { count: 255, event_time: 65000 });
        let rr = new_rr_intervals(last, 0, 488, None);
        assert_eq!(rr.len(), 1);
        // 65536 - 65000 + 488 = 1024 ticks
        assert!((rr[0].as_secs_f64() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rr_missed_beats_use_previous_beat_field() {
        let last = Some(BeatMarker { count: 10, event_time: 1000 });
        assert!(new_rr_intervals(last, 13, 4000, None).is_empty());

        let rr = new_rr_intervals(last, 13, 4000, Some(3000));
        assert_eq!(rr.len(), 1);
        assert!((ms(&rr[0]) - 976.5625).abs() < 1e-6);
    }

    #[test]
    fn test_rr_first_frame_on_page_four() {
        assert!(new_rr_intervals(None, 3, 2048, None).is_empty());
        let rr = new_rr_intervals(None, 3, 2048, Some(1024));
        assert_eq!(rr.len(), 1);
    }

    #[test]
    fn test_frame_decoder_suppresses_duplicates() {
        let mut decoder = FrameDecoder::new();

        let first = decoder.decode(&hr_frame(1, 1, 1024, 70)).unwrap();
        assert!(first.as_heart_rate().unwrap().rr_intervals.is_empty());

        let second = decoder.decode(&hr_frame(1, 2, 2048, 70)).unwrap();
        assert_eq!(second.as_heart_rate().unwrap().rr_intervals.len(), 1);

        // Same beat re-broadcast on the next channel period
        let repeat = decoder.decode(&hr_frame(1, 2, 2048, 70)).unwrap();
        assert!(repeat.as_heart_rate().unwrap().rr_intervals.is_empty());

        // Other device has its own history
        let other = decoder.decode(&hr_frame(2, 3, 3072, 60)).unwrap();
        assert!(other.as_heart_rate().unwrap().rr_intervals.is_empty());
    }

    #[test]
    fn test_frame_decoder_no_signal_keeps_history() {
        let mut decoder = FrameDecoder::new();
        decoder.decode(&hr_frame(1, 1, 1024, 70)).unwrap();
        assert!(decoder.decode(&hr_frame(1, 2, 2048, 0)).is_err());

        let next = decoder.decode(&hr_frame(1, 2, 2048, 72)).unwrap();
        assert_eq!(next.as_heart_rate().unwrap().rr_intervals.len(), 1);
    }

    #[test]
    fn test_frame_decoder_reports_unsupported_once_per_device() {
        let mut decoder = FrameDecoder::new();
        let power = |id: u16| RawFrame::new(id, 11, vec![0u8; 8], 0.0);

        for _ in 0..5 {
            assert!(matches!(
                decoder.decode(&power(40)),
                Err(DecodeError::UnsupportedDeviceType { .. })
            ));
        }
        assert_eq!(decoder.unsupported_seen.len(), 1);

        decoder.decode(&power(41)).unwrap_err();
        assert_eq!(decoder.unsupported_seen.len(), 2);
        assert!(decoder.beats.is_empty());
    }

    #[test]
    fn test_decode_combined_speed_cadence() {
        let crank = RevolutionCounter { revolutions: 300, event_time: 5000 };
        let wheel = RevolutionCounter { revolutions: 65530, event_time: 6000 };
        let payload = speed_cadence_page(crank, wheel);

        let sample = decode(DeviceId::new(9), 121, &payload, None).unwrap();
        let cs = sample.as_cadence_speed().unwrap();
        assert_eq!(cs.crank, Some(crank));
        assert_eq!(cs.wheel, Some(wheel));
    }

    #[test]
    fn test_decode_single_purpose_sensors() {
        let counter = RevolutionCounter { revolutions: 42, event_time: 777 };
        let payload = single_counter_page(counter);

        let speed = decode(DeviceId::new(9), 123, &payload, None).unwrap();
        assert_eq!(
            speed.as_cadence_speed().copied(),
            Some(CadenceSpeedSample { wheel: Some(counter), crank: None })
        );

        let cadence = decode(DeviceId::new(9), 122, &payload, None).unwrap();
        assert_eq!(
            cadence.as_cadence_speed().copied(),
            Some(CadenceSpeedSample { wheel: None, crank: Some(counter) })
        );
    }

    #[test]
    fn test_random_payloads_never_panic() {
        let mut rng = rand::rng();
        let mut decoder = FrameDecoder::new();
        for _ in 0..2000 {
            let len = rng.random_range(0..12);
            let payload: Vec<u8> = (0..len).map(|_| rng.random()).collect();
            let device_type = rng.random_range(118..126);
            let frame = RawFrame::new(rng.random::<u16>() % 8, device_type, payload, 0.0);
            let _ = decoder.decode(&frame);
        }
    }
}
