//! Job error types.

use std::path::PathBuf;
use thiserror::Error;

use vgen_media::MediaError;

pub type JobResult<T> = Result<T, JobError>;

/// Fatal job failures. Each ends the job with a single `error` event.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Base video not found at {0}")]
    MissingBaseAsset(PathBuf),

    #[error("No image was uploaded")]
    MissingUpload,

    #[error("Asset generation failed: {0}")]
    AssetGeneration(#[source] MediaError),

    #[error("Render failed: {0}")]
    Render(#[source] MediaError),

    /// The caller went away before the output could be announced.
    #[error("Caller disconnected before {0} could be delivered")]
    Abandoned(String),
}

impl JobError {
    /// Message sent to the caller in the `error` event.
    pub fn user_message(&self) -> String {
        match self {
            JobError::MissingBaseAsset(_) => "Base video not found.".to_string(),
            JobError::MissingUpload => "No image uploaded.".to_string(),
            JobError::AssetGeneration(_) => "Image processing failed.".to_string(),
            JobError::Render(_) => "Render failed completely.".to_string(),
            JobError::Abandoned(_) => "Internal server error.".to_string(),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::MissingBaseAsset(_) => "missing_base_asset",
            JobError::MissingUpload => "missing_upload",
            JobError::AssetGeneration(_) => "asset_generation",
            JobError::Render(_) => "render",
            JobError::Abandoned(_) => "abandoned",
        }
    }

    /// Full diagnostic for logs, including encoder output where present.
    pub fn diagnostic(&self) -> String {
        match self {
            JobError::AssetGeneration(e) | JobError::Render(e) => e.diagnostic(),
            other => other.to_string(),
        }
    }
}
