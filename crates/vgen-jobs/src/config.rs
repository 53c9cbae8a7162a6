//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use vgen_media::DEFAULT_ASSUMED_DURATION;

use crate::workspace::WorkspaceProvider;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base video every job is composited onto
    pub base_video_path: PathBuf,
    /// Where uploaded photos land
    pub upload_dir: PathBuf,
    /// Generated raster layers
    pub temp_dir: PathBuf,
    /// Rendered videos awaiting download
    pub output_dir: PathBuf,
    /// Extra font for the label layer
    pub label_font_path: Option<PathBuf>,
    /// Duration progress percentages are computed against
    pub assumed_duration: Duration,
    /// Replace `assumed_duration` with the probed base video length at startup
    pub probe_base_duration: bool,
    /// Idle time before a keep-alive is pushed
    pub keepalive_interval: Duration,
    /// Per-attempt encoder timeout
    pub render_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_video_path: PathBuf::from("public/videos/base.mp4"),
            upload_dir: PathBuf::from("uploads"),
            temp_dir: PathBuf::from("temp"),
            output_dir: PathBuf::from("public/output"),
            label_font_path: None,
            assumed_duration: DEFAULT_ASSUMED_DURATION,
            probe_base_duration: false,
            keepalive_interval: Duration::from_secs(15),
            render_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            base_video_path: env_path("BASE_VIDEO_PATH").unwrap_or(defaults.base_video_path),
            upload_dir: env_path("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            temp_dir: env_path("TEMP_DIR").unwrap_or(defaults.temp_dir),
            output_dir: env_path("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            label_font_path: env_path("LABEL_FONT_PATH"),
            assumed_duration: std::env::var("ASSUMED_DURATION_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.assumed_duration),
            probe_base_duration: std::env::var("PROBE_BASE_DURATION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            keepalive_interval: Duration::from_secs(
                std::env::var("KEEPALIVE_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(15),
            ),
            render_timeout: std::env::var("RENDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs),
        }
    }

    /// Scratch directories described by this config.
    pub fn workspace(&self) -> WorkspaceProvider {
        WorkspaceProvider::new(&self.upload_dir, &self.temp_dir, &self.output_dir)
    }

    /// Point every directory and the base video under `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            base_video_path: root.join("public/videos/base.mp4"),
            upload_dir: root.join("uploads"),
            temp_dir: root.join("temp"),
            output_dir: root.join("public/output"),
            ..Self::default()
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}
