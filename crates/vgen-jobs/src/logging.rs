//! Structured job logging.
//!
//! Every line a job emits goes through [`JobLogger`] so that the lifecycle of
//! one job can be followed by filtering on `job_id`.

use tracing::{error, info, warn, Span};
use vgen_models::{GeometrySpec, JobId};

use crate::artifacts::CleanupReport;
use crate::error::JobError;
use crate::pipeline::JobCompletion;

/// Lifecycle log lines for one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        self.operation
    }

    /// Span carrying the job id and operation, for instrumenting the job task.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = self.operation)
    }

    pub fn started(&self, has_upload: bool) {
        info!(job_id = %self.job_id, operation = self.operation, has_upload, "Job started");
    }

    pub fn layout(&self, geometry: &GeometrySpec) {
        info!(
            job_id = %self.job_id,
            anchor_x = geometry.anchor.x,
            anchor_y = geometry.anchor.y,
            label_x = geometry.label.origin.x,
            label_y = geometry.label.origin.y,
            label_width = geometry.label.width,
            "Layout computed"
        );
    }

    pub fn degraded(&self) {
        warn!(job_id = %self.job_id, "Rendered without the text layer");
    }

    /// Only failed deletions are worth a line.
    pub fn cleanup(&self, report: &CleanupReport) {
        if report.failed > 0 {
            warn!(
                job_id = %self.job_id,
                removed = report.removed,
                failed = report.failed,
                "Some job artifacts could not be removed"
            );
        }
    }

    pub fn finished(&self, done: &JobCompletion) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            file = %done.file_name,
            attempt = %done.attempt,
            render_ms = done.render_time.as_millis() as u64,
            "Job completed"
        );
    }

    pub fn failed(&self, err: &JobError) {
        error!(
            job_id = %self.job_id,
            operation = self.operation,
            kind = err.kind(),
            "Job failed: {}",
            err.diagnostic()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_carries_job_id() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "render_video");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "render_video");
    }

    #[test]
    fn test_clean_cleanup_is_silent() {
        let logger = JobLogger::new(&JobId::new(), "render_video");
        // No subscriber; just exercise both branches
        logger.cleanup(&CleanupReport { removed: 3, failed: 0 });
        logger.cleanup(&CleanupReport { removed: 1, failed: 2 });
    }
}
