//! Encoder output profile.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Fastest x264 preset; render latency dominates the job
pub const DEFAULT_PRESET: &str = "ultrafast";
/// Pixel format most players accept
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Moves the moov atom to the front for progressive playback
pub const DEFAULT_MOVFLAGS: &str = "+faststart";

/// Output settings for the single configured encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OutputProfile {
    /// Video codec (e.g., "libx264")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "ultrafast", "fast")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Container flags
    #[serde(default = "default_movflags")]
    pub movflags: String,

    /// Audio codec for the base video's soundtrack
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}
fn default_movflags() -> String {
    DEFAULT_MOVFLAGS.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}

impl Default for OutputProfile {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            preset: default_preset(),
            pixel_format: default_pixel_format(),
            movflags: default_movflags(),
            audio_codec: default_audio_codec(),
            extra_args: Vec::new(),
        }
    }
}

impl OutputProfile {
    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-movflags".to_string(),
            self.movflags.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
        ];

        args.extend(self.extra_args.clone());

        args
    }
}
