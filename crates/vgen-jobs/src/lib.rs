//! Per-job orchestration for the VGen render service.
//!
//! This crate provides:
//! - Unique scratch paths per job (`WorkspaceProvider`)
//! - Tracking and cleanup of ephemeral files (`ArtifactTracker`)
//! - The push channel: a progress reporter plus a keep-alive event stream
//! - The job pipeline tying geometry, assets and rendering together
//! - Structured job logging

pub mod artifacts;
pub mod channel;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod workspace;

pub use artifacts::{ArtifactTracker, CleanupReport};
pub use channel::{progress_channel, ChannelItem, ProgressReporter, ProgressStream};
pub use config::PipelineConfig;
pub use error::{JobError, JobResult};
pub use logging::JobLogger;
pub use pipeline::{JobCompletion, JobPipeline, JobRequest};
pub use workspace::{sanitize_filename, WorkspaceProvider};
