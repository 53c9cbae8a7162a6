//! The job pipeline: from request fields to a downloadable video.
//!
//! Stages run strictly in order. The base video is checked first, then
//! geometry is computed, the raster layers are generated, and the
//! degrade-retry controller renders. Whatever happens, exactly one terminal
//! event is reported and every scratch file except a successful output is
//! deleted before `run` returns.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{warn, Instrument};

use vgen_media::{
    compute_geometry, probe_base_video, render_with_fallback, AssetGenerator, Encoder, FfmpegEncoder,
    FfmpegRunner, LabelStyle, RenderAttempt, RenderExecutor, CANVAS_HEIGHT, CANVAS_WIDTH,
};
use vgen_models::{AssetRole, JobId, OutputProfile, RenderJob};

use crate::artifacts::ArtifactTracker;
use crate::channel::ProgressReporter;
use crate::config::PipelineConfig;
use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::workspace::WorkspaceProvider;

/// Raw request data for one job. Numeric fields are parsed leniently.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub id: JobId,
    pub label: Option<String>,
    pub anchor_x: Option<String>,
    pub anchor_y: Option<String>,
    /// Uploaded photo, already written to the upload directory
    pub upload: Option<PathBuf>,
    /// Scheme and authority the download URL is built on, without a trailing slash
    pub download_base: String,
}

/// A finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    pub file_name: String,
    pub url: String,
    pub path: PathBuf,
    pub attempt: RenderAttempt,
    pub render_time: Duration,
}

/// Runs jobs. Cheap to clone; holds no per-job state.
#[derive(Debug, Clone)]
pub struct JobPipeline {
    workspace: WorkspaceProvider,
    assets: AssetGenerator,
    executor: RenderExecutor,
    base_video: PathBuf,
    keepalive_interval: Duration,
}

impl JobPipeline {
    /// Build a pipeline around an arbitrary encoder.
    pub fn new(config: &PipelineConfig, encoder: Arc<dyn Encoder>) -> Self {
        let assets = match &config.label_font_path {
            Some(font) => AssetGenerator::with_font_file(LabelStyle::default(), font),
            None => AssetGenerator::new(LabelStyle::default()),
        };

        Self {
            workspace: config.workspace(),
            assets,
            executor: RenderExecutor::new(encoder, OutputProfile::default())
                .with_assumed_duration(config.assumed_duration),
            base_video: config.base_video_path.clone(),
            keepalive_interval: config.keepalive_interval,
        }
    }

    /// Build a pipeline that encodes with ffmpeg.
    ///
    /// With `probe_base_duration` set, the base video's real length replaces
    /// the assumed duration; a failed probe keeps the assumed value.
    pub async fn from_config(config: &PipelineConfig) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = config.render_timeout {
            runner = runner.with_timeout(timeout);
        }

        let mut pipeline = Self::new(config, Arc::new(FfmpegEncoder::new(runner)));

        if config.probe_base_duration {
            match probe_base_video(&config.base_video_path).await {
                Ok(info) => {
                    if !info.matches_canvas() {
                        warn!(
                            width = info.width,
                            height = info.height,
                            "Base video frame differs from the layout canvas"
                        );
                    }
                    match info.duration {
                        Some(duration) => {
                            tracing::info!(
                                duration_secs = duration.as_secs_f64(),
                                "Using probed base video duration for progress"
                            );
                            pipeline.executor = pipeline.executor.with_assumed_duration(duration);
                        }
                        None => warn!("Base video reports no duration, keeping assumed duration"),
                    }
                }
                Err(e) => warn!("Base video probe failed, keeping assumed duration: {}", e),
            }
        }

        pipeline
    }

    pub fn workspace(&self) -> &WorkspaceProvider {
        &self.workspace
    }

    pub fn base_video(&self) -> &std::path::Path {
        &self.base_video
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    pub fn assumed_duration(&self) -> Duration {
        self.executor.assumed_duration()
    }

    /// Run one job to completion, reporting on `reporter`.
    ///
    /// Scratch files are removed before the terminal event is sent, so a
    /// client that has seen it observes a clean workspace. An output whose
    /// caller has already disconnected is removed with them.
    pub async fn run(&self, request: JobRequest, reporter: ProgressReporter) -> JobResult<JobCompletion> {
        let logger = JobLogger::new(&request.id, "render_video");
        let span = logger.create_span();

        async {
            let mut artifacts = ArtifactTracker::new();
            if let Some(upload) = &request.upload {
                artifacts.register(upload);
            }

            logger.started(request.upload.is_some());
            let result = match self.execute(&request, &reporter, &mut artifacts, &logger).await {
                // Nobody can learn the file name, so the output goes with the scratch files
                Ok(done) if reporter.is_closed() => {
                    artifacts.register(&done.path);
                    Err(JobError::Abandoned(done.file_name))
                }
                other => other,
            };

            logger.cleanup(&artifacts.cleanup().await);

            match &result {
                Ok(done) => {
                    logger.finished(done);
                    reporter.complete(&done.url, &done.file_name);
                }
                Err(e) => {
                    logger.failed(e);
                    reporter.fail(&e.user_message());
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        request: &JobRequest,
        reporter: &ProgressReporter,
        artifacts: &mut ArtifactTracker,
        logger: &JobLogger,
    ) -> JobResult<JobCompletion> {
        reporter.progress(0, "Starting...");

        if !tokio::fs::try_exists(&self.base_video).await.unwrap_or(false) {
            return Err(JobError::MissingBaseAsset(self.base_video.clone()));
        }

        let upload = request.upload.as_ref().ok_or(JobError::MissingUpload)?;

        let mut job = RenderJob::from_request_fields(
            request.label.as_deref(),
            request.anchor_x.as_deref(),
            request.anchor_y.as_deref(),
            upload,
            &self.base_video,
        );
        job.id = request.id.clone();

        let geometry = compute_geometry(&job.label, job.anchor_x, job.anchor_y, CANVAS_WIDTH, CANVAS_HEIGHT);
        logger.layout(&geometry);

        reporter.progress(10, "Processing image...");
        let assets = self
            .assets
            .generate(&geometry, &job.label, &job.source_image, |role| {
                if role == AssetRole::LabelBackground {
                    reporter.progress(20, "Calculating text box...");
                }
                artifacts.register(self.workspace.asset_path(role))
            })
            .await
            .map_err(JobError::AssetGeneration)?;

        reporter.progress(25, "Merging video...");

        let (file_name, output) = self.workspace.output_path();
        artifacts.register(&output);

        let started = Instant::now();
        let outcome = render_with_fallback(
            &self.executor,
            &job.base_video,
            &geometry,
            &assets,
            &output,
            |attempt, percent| reporter.progress(percent, attempt.status()),
        )
        .await
        .map_err(JobError::Render)?;

        if outcome.used_fallback() {
            logger.degraded();
        }

        artifacts.forget(&outcome.path);

        Ok(JobCompletion {
            url: format!("{}/download/{}", request.download_base, file_name),
            file_name,
            path: outcome.path,
            attempt: outcome.attempt,
            render_time: started.elapsed(),
        })
    }
}
