//! Application state.

use vgen_jobs::{JobPipeline, PipelineConfig, WorkspaceProvider};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: JobPipeline,
}

impl AppState {
    /// Create application state, preparing scratch directories and an
    /// ffmpeg-backed pipeline.
    pub async fn new(config: ApiConfig, pipeline_config: &PipelineConfig) -> std::io::Result<Self> {
        pipeline_config.workspace().ensure_dirs().await?;
        let pipeline = JobPipeline::from_config(pipeline_config).await;
        Ok(Self { config, pipeline })
    }

    /// Wrap an already-built pipeline.
    pub fn with_pipeline(config: ApiConfig, pipeline: JobPipeline) -> Self {
        Self { config, pipeline }
    }

    pub fn workspace(&self) -> &WorkspaceProvider {
        self.pipeline.workspace()
    }
}
