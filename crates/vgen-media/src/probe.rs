//! Base video inspection with ffprobe.
//!
//! The pipeline only needs the base video's length (for progress) and a
//! sanity check that its frame matches the layout canvas.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use crate::geometry::{CANVAS_HEIGHT, CANVAS_WIDTH};

const PROBE_ARGS: [&str; 6] = [
    "-v",
    "error",
    "-print_format",
    "json",
    "-show_format",
    "-show_streams",
];

/// What the pipeline knows about the base video.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseVideoInfo {
    /// Container duration, if ffprobe reported a usable one
    pub duration: Option<Duration>,
    pub width: u32,
    pub height: u32,
    /// Whether an audio stream exists for `-map 0:a?` to pick up
    pub has_audio: bool,
}

impl BaseVideoInfo {
    /// Whether the frame size equals the canvas the layout is computed for.
    pub fn matches_canvas(&self) -> bool {
        self.width == CANVAS_WIDTH && self.height == CANVAS_HEIGHT
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
}

/// Probe the base video.
pub async fn probe_base_video(path: impl AsRef<Path>) -> MediaResult<BaseVideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let ffprobe = check_ffprobe()?;

    let output = Command::new(ffprobe)
        .args(PROBE_ARGS)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::FfprobeFailed {
            message: format!("ffprobe rejected {}", path.display()),
            stderr: (!stderr.is_empty()).then_some(stderr),
        });
    }

    summarize(serde_json::from_slice(&output.stdout)?)
}

fn summarize(report: ProbeReport) -> MediaResult<BaseVideoInfo> {
    let video = report
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    // Some containers only carry the length on the stream
    let duration = parse_seconds(report.format.duration.as_deref())
        .or_else(|| parse_seconds(video.duration.as_deref()));

    Ok(BaseVideoInfo {
        duration,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        has_audio: report.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

fn parse_seconds(value: Option<&str>) -> Option<Duration> {
    let secs: f64 = value?.trim().parse().ok()?;
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}
