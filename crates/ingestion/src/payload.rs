//! ANT+ broadcast page layouts
//!
//! Byte offsets shared by the decoder and the synthetic frame builders.
//! All multi-byte fields are little-endian.

use contracts::RevolutionCounter;

/// Broadcast data page length
pub const PAYLOAD_LEN: usize = 8;

/// Event time resolution (ticks per second)
pub const EVENT_TIME_HZ: f64 = 1024.0;

/// Heart-rate page carrying the previous beat event time
pub const HR_PAGE_PREVIOUS_BEAT: u8 = 4;

pub(crate) mod hr {
    pub const PAGE: usize = 0;
    pub const PREV_BEAT_TIME: usize = 2;
    pub const BEAT_TIME: usize = 4;
    pub const BEAT_COUNT: usize = 6;
    pub const COMPUTED_HR: usize = 7;
}

pub(crate) mod bike {
    /// Combined speed & cadence
    pub const SC_CRANK_TIME: usize = 0;
    pub const SC_CRANK_REVS: usize = 2;
    pub const SC_WHEEL_TIME: usize = 4;
    pub const SC_WHEEL_REVS: usize = 6;

    /// Speed-only and cadence-only sensors
    pub const EVENT_TIME: usize = 4;
    pub const REVS: usize = 6;
}

#[inline]
pub(crate) fn read_u16(payload: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([payload[offset], payload[offset + 1]])
}

#[inline]
fn write_u16(buf: &mut [u8; PAYLOAD_LEN], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Build a heart-rate page.
///
/// `prev_beat_time` is only written on page 4.
pub fn heart_rate_page(
    page: u8,
    prev_beat_time: u16,
    beat_time: u16,
    beat_count: u8,
    bpm: u8,
) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    buf[hr::PAGE] = page;
    if page & 0x7F == HR_PAGE_PREVIOUS_BEAT {
        write_u16(&mut buf, hr::PREV_BEAT_TIME, prev_beat_time);
    } else {
        buf[1..4].fill(0xFF);
    }
    write_u16(&mut buf, hr::BEAT_TIME, beat_time);
    buf[hr::BEAT_COUNT] = beat_count;
    buf[hr::COMPUTED_HR] = bpm;
    buf
}

/// Build a combined speed & cadence page.
pub fn speed_cadence_page(crank: RevolutionCounter, wheel: RevolutionCounter) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    write_u16(&mut buf, bike::SC_CRANK_TIME, crank.event_time);
    write_u16(&mut buf, bike::SC_CRANK_REVS, crank.revolutions);
    write_u16(&mut buf, bike::SC_WHEEL_TIME, wheel.event_time);
    write_u16(&mut buf, bike::SC_WHEEL_REVS, wheel.revolutions);
    buf
}

/// Build a speed-only or cadence-only page (same layout, page 0).
pub fn single_counter_page(counter: RevolutionCounter) -> [u8; PAYLOAD_LEN] {
    let mut buf = [0u8; PAYLOAD_LEN];
    write_u16(&mut buf, bike::EVENT_TIME, counter.event_time);
    write_u16(&mut buf, bike::REVS, counter.revolutions);
    buf
}
