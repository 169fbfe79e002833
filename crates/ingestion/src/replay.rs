//! Replay frame source
//!
//! Plays back frames recorded as JSON lines (one `RawFrame` per line),
//! keeping the recorded inter-frame timing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use contracts::{ContractError, FrameCallback, FrameSource, RawFrame};
use tracing::{debug, info, warn};

use crate::clock::MonotonicClock;

/// Replay configuration
#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Playback speed multiplier (1.0 = recorded speed)
    pub speed_multiplier: f64,

    /// Start over after the last frame
    pub loop_playback: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed_multiplier: 1.0,
            loop_playback: false,
        }
    }
}

/// Replay frame source
///
/// Frames are re-stamped with the shared clock on emission so the engine sees
/// live timestamps.
pub struct ReplayFrameSource {
    source_id: String,
    frames: Arc<Vec<RawFrame>>,
    config: ReplayConfig,
    clock: MonotonicClock,
    listening: Arc<AtomicBool>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ReplayFrameSource {
    /// Load a recording.
    ///
    /// Blank lines are skipped; any unparsable line fails the load.
    pub fn load(path: &Path, config: ReplayConfig, clock: MonotonicClock) -> Result<Self, ContractError> {
        let source_id = format!("replay-{}", path.display());
        let file = File::open(path).map_err(|e| ContractError::frame_source(&source_id, e.to_string()))?;

        let mut frames = Vec::new();
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let frame: RawFrame = serde_json::from_str(&line).map_err(|e| {
                ContractError::frame_source(&source_id, format!("line {}: {e}", line_no + 1))
            })?;
            frames.push(frame);
        }

        frames.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        info!(source_id = %source_id, frames = frames.len(), "loaded replay recording");

        Ok(Self::from_frames(source_id, frames, config, clock))
    }

    pub fn from_frames(
        source_id: String,
        frames: Vec<RawFrame>,
        config: ReplayConfig,
        clock: MonotonicClock,
    ) -> Self {
        Self {
            source_id,
            frames: Arc::new(frames),
            config,
            clock,
            listening: Arc::new(AtomicBool::new(false)),
            thread_handle: Mutex::new(None),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Recording duration at recorded speed (seconds)
    pub fn duration_secs(&self) -> f64 {
        match (self.frames.first(), self.frames.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0.0,
        }
    }
}

impl FrameSource for ReplayFrameSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn listen(&self, callback: FrameCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let listening = self.listening.clone();
        let source_id = self.source_id.clone();
        let frames = self.frames.clone();
        let clock = self.clock;
        let speed = self.config.speed_multiplier.max(0.1);
        let loop_playback = self.config.loop_playback;

        let handle = thread::spawn(move || {
            debug!(source_id = %source_id, "replay thread started");

            'playback: loop {
                let Some(first) = frames.first() else {
                    warn!(source_id = %source_id, "no frames to replay");
                    break;
                };

                let start_time = Instant::now();
                let first_timestamp = first.timestamp;

                for frame in frames.iter() {
                    if !listening.load(Ordering::Relaxed) {
                        debug!(source_id = %source_id, "replay stopped");
                        break 'playback;
                    }

                    let offset = (frame.timestamp - first_timestamp).max(0.0);
                    let target_elapsed = Duration::from_secs_f64(offset / speed);
                    let actual_elapsed = start_time.elapsed();
                    if target_elapsed > actual_elapsed {
                        thread::sleep(target_elapsed - actual_elapsed);
                    }

                    let mut live = frame.clone();
                    live.timestamp = clock.now();
                    callback(live);
                }

                if !loop_playback {
                    info!(source_id = %source_id, "replay completed");
                    break;
                }

                debug!(source_id = %source_id, "looping replay");
            }

            listening.store(false, Ordering::SeqCst);
        });

        if let Ok(mut slot) = self.thread_handle.lock() {
            *slot = Some(handle);
        }
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);

        let handle = self.thread_handle.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }
}
