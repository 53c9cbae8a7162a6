//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use vgen_models::AssetRole;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Failed to generate {role} asset: {message}")]
    AssetGeneration { role: AssetRole, message: String },

    #[error("Invalid composition graph: {0}")]
    InvalidGraph(String),

    /// Both the full and the text-less render failed.
    #[error("Render failed after fallback: {fallback}")]
    RenderFailed {
        primary: Box<MediaError>,
        fallback: Box<MediaError>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an asset generation error.
    pub fn asset_generation(role: AssetRole, message: impl Into<String>) -> Self {
        Self::AssetGeneration {
            role,
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Encoder diagnostic text, when the error carries one.
    pub fn diagnostic(&self) -> String {
        match self {
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            } if !stderr.is_empty() => format!("{message}: {stderr}"),
            MediaError::RenderFailed { fallback, .. } => fallback.diagnostic(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_failed_exposes_fallback_message() {
        let err = MediaError::RenderFailed {
            primary: Box::new(MediaError::ffmpeg_failed("first", None, Some(1))),
            fallback: Box::new(MediaError::ffmpeg_failed(
                "second",
                Some("Invalid argument".to_string()),
                Some(1),
            )),
        };
        assert!(err.to_string().contains("second"));
        assert_eq!(err.diagnostic(), "second: Invalid argument");
    }

    #[test]
    fn test_asset_generation_display() {
        let err = MediaError::asset_generation(AssetRole::Avatar, "decode failed");
        assert_eq!(err.to_string(), "Failed to generate avatar asset: decode failed");
    }
}
