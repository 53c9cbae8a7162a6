//! FFmpeg progress parsing and percent mapping.

use std::time::Duration;

/// Assumed length of the base video used for percent estimation.
///
/// This is a fixed estimate, not read from the file. When the real video
/// is longer, progress sits at 100 until the encoder exits; when shorter,
/// it never reaches 100 before completion.
pub const DEFAULT_ASSUMED_DURATION: Duration = Duration::from_secs(152);

/// One `-progress` block from ffmpeg.
///
/// ffmpeg writes `key=value` lines and closes each block with
/// `progress=continue` or `progress=end`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FfmpegProgress {
    /// Encoded media time so far
    pub out_time: Duration,
    /// Speed relative to realtime, when ffmpeg reports one
    pub speed: Option<f64>,
    pub frame: u64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Elapsed encoded media time.
    pub fn elapsed(&self) -> Duration {
        self.out_time
    }

    /// Fold one `key=value` line into this block. Returns a snapshot when the
    /// line closes the block.
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            // Both keys carry microseconds in current ffmpeg builds
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.out_time = Duration::from_micros(us);
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                // "N/A" keeps the previous value
                if let Some(speed) = value.trim().strip_suffix('x').and_then(|v| v.trim().parse().ok()) {
                    self.speed = Some(speed);
                }
            }
            "progress" => {
                self.is_complete = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }
}

/// Maps elapsed encoded time to a whole percentage for one render attempt.
///
/// Output is clamped to 100 and never decreases, even if the encoder
/// reports a smaller timestamp than before.
#[derive(Debug, Clone)]
pub struct ProgressMapper {
    total: Duration,
    last: Option<u8>,
}

impl ProgressMapper {
    pub fn new(total: Duration) -> Self {
        Self { total, last: None }
    }

    /// Percent for `elapsed`, without updating state.
    pub fn percent_for(&self, elapsed: Duration) -> u8 {
        if self.total.is_zero() {
            return 0;
        }
        let pct = (elapsed.as_secs_f64() / self.total.as_secs_f64() * 100.0).min(100.0);
        pct.round().max(0.0) as u8
    }

    /// Record an encoder report. Returns the new percent only when it moved
    /// forward (or on the first report).
    pub fn observe(&mut self, elapsed: Duration) -> Option<u8> {
        let pct = self.percent_for(elapsed);
        match self.last {
            Some(last) if pct <= last => None,
            _ => {
                self.last = Some(pct);
                Some(pct)
            }
        }
    }

    /// Highest percent emitted so far.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
