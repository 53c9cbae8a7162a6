//! Ephemeral file tracking.
//!
//! Every scratch file a job creates is registered here as soon as its path
//! is chosen. [`ArtifactTracker::cleanup`] deletes each registered path once;
//! failures are logged and never change the job's result.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Summary of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Paths deleted, or already absent
    pub removed: usize,
    /// Paths that could not be deleted
    pub failed: usize,
}

/// Owns the set of ephemeral paths for one job.
///
/// Paths still registered when the tracker is dropped are deleted
/// synchronously, so an aborted job task does not leak scratch files.
#[derive(Debug, Default)]
pub struct ArtifactTracker {
    paths: Vec<PathBuf>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path and hand it back. Registering twice is a no-op.
    pub fn register(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path.clone());
        }
        path
    }

    /// Stop tracking `path`; it will survive cleanup.
    pub fn forget(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Delete every registered path once and clear the registry.
    pub async fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in std::mem::take(&mut self.paths) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "Removed artifact");
                    report.removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), "Failed to remove artifact: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

impl Drop for ArtifactTracker {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "Removed artifact on drop"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), "Failed to remove artifact: {}", e),
            }
        }
    }
}
