//! Degrade-and-retry rendering.
//!
//! A render is attempted with the text layer first. If that fails, the same
//! assets are rendered once more through the reduced graph without text.
//! There is no third attempt.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use vgen_models::GeometrySpec;

use crate::assets::AssetSet;
use crate::error::{MediaError, MediaResult};
use crate::graph::CompositionGraph;
use crate::render::RenderExecutor;

/// Which graph variant a render attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderAttempt {
    WithText,
    WithoutText,
}

impl RenderAttempt {
    pub fn include_text(&self) -> bool {
        matches!(self, RenderAttempt::WithText)
    }

    /// Status line shown to the caller while this attempt runs.
    pub fn status(&self) -> &'static str {
        match self {
            RenderAttempt::WithText => "Rendering...",
            RenderAttempt::WithoutText => "Rendering (Fallback mode)...",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RenderAttempt::WithText => "with_text",
            RenderAttempt::WithoutText => "without_text",
        }
    }
}

impl fmt::Display for RenderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished output and the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub path: PathBuf,
    pub attempt: RenderAttempt,
}

impl RenderOutcome {
    pub fn used_fallback(&self) -> bool {
        self.attempt == RenderAttempt::WithoutText
    }
}

/// Render with text, falling back once to the text-less graph.
///
/// `on_progress` receives the running attempt and its percentage. Percent
/// restarts from zero when the fallback begins. When both attempts fail the
/// error is [`MediaError::RenderFailed`] carrying both causes.
pub async fn render_with_fallback<F>(
    executor: &RenderExecutor,
    base_video: &Path,
    geometry: &GeometrySpec,
    assets: &AssetSet,
    output: &Path,
    mut on_progress: F,
) -> MediaResult<RenderOutcome>
where
    F: FnMut(RenderAttempt, u8) + Send,
{
    let primary = match attempt(
        executor,
        RenderAttempt::WithText,
        base_video,
        geometry,
        assets,
        output,
        &mut on_progress,
    )
    .await
    {
        Ok(outcome) => return Ok(outcome),
        Err(e) => e,
    };

    warn!("Text render failed, retrying without text: {}", primary.diagnostic());

    match attempt(
        executor,
        RenderAttempt::WithoutText,
        base_video,
        geometry,
        assets,
        output,
        &mut on_progress,
    )
    .await
    {
        Ok(outcome) => Ok(outcome),
        Err(fallback) => Err(MediaError::RenderFailed {
            primary: Box::new(primary),
            fallback: Box::new(fallback),
        }),
    }
}

async fn attempt<F>(
    executor: &RenderExecutor,
    attempt: RenderAttempt,
    base_video: &Path,
    geometry: &GeometrySpec,
    assets: &AssetSet,
    output: &Path,
    on_progress: &mut F,
) -> MediaResult<RenderOutcome>
where
    F: FnMut(RenderAttempt, u8) + Send,
{
    let graph = CompositionGraph::build(geometry, attempt.include_text());
    info!(attempt = %attempt, "Starting render attempt");

    let path = executor
        .render(base_video, &graph, assets, output, |pct| on_progress(attempt, pct))
        .await?;

    info!(attempt = %attempt, "Render attempt succeeded");
    Ok(RenderOutcome { path, attempt })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetFile;
    use crate::geometry::{compute_geometry, CANVAS_HEIGHT, CANVAS_WIDTH};
    use crate::render::testing::ScriptedEncoder;
    use std::sync::Arc;
    use tempfile::TempDir;
    use vgen_models::{AssetRole, OutputProfile};

    fn asset_set(dir: &Path) -> AssetSet {
        let file = |role: AssetRole| AssetFile {
            role,
            path: dir.join(format!("{role}.png")),
            width: 10,
            height: 10,
        };
        AssetSet {
            avatar: file(AssetRole::Avatar),
            label_background: file(AssetRole::LabelBackground),
            label_text: file(AssetRole::LabelText),
        }
    }

    async fn run(
        encoder: Arc<ScriptedEncoder>,
        dir: &Path,
    ) -> (MediaResult<RenderOutcome>, Vec<(RenderAttempt, u8)>) {
        let executor = RenderExecutor::new(encoder, OutputProfile::default());
        let geometry = compute_geometry("A. Smith", 0.75, 0.6, CANVAS_WIDTH, CANVAS_HEIGHT);
        let mut events = Vec::new();
        let result = render_with_fallback(
            &executor,
            &dir.join("base.mp4"),
            &geometry,
            &asset_set(dir),
            &dir.join("out.mp4"),
            |attempt, pct| events.push((attempt, pct)),
        )
        .await;
        (result, events)
    }

    #[tokio::test]
    async fn test_first_attempt_success_skips_fallback() {
        let dir = TempDir::new().unwrap();
        let encoder = Arc::new(ScriptedEncoder::new(vec![(vec![76], true)]));

        let (result, events) = run(encoder.clone(), dir.path()).await;
        let outcome = result.unwrap();

        assert_eq!(outcome.attempt, RenderAttempt::WithText);
        assert!(!outcome.used_fallback());
        assert_eq!(encoder.calls(), 1);
        assert_eq!(events, vec![(RenderAttempt::WithText, 50)]);
    }

    #[tokio::test]
    async fn test_fallback_after_text_failure_reuses_assets() {
        let dir = TempDir::new().unwrap();
        let encoder = Arc::new(ScriptedEncoder::new(vec![
            (vec![38, 76], false),
            (vec![38], true),
        ]));

        let (result, events) = run(encoder.clone(), dir.path()).await;
        let outcome = result.unwrap();

        assert_eq!(outcome.attempt, RenderAttempt::WithoutText);
        assert!(outcome.path.exists());
        assert_eq!(encoder.calls(), 2);
        assert_eq!(
            events,
            vec![
                (RenderAttempt::WithText, 25),
                (RenderAttempt::WithText, 50),
                (RenderAttempt::WithoutText, 25),
            ]
        );

        let invocations = encoder.invocations.lock().unwrap();
        assert_eq!(invocations[0].inputs.len(), 4);
        assert_eq!(invocations[1].inputs.len(), 3);
        // Base, avatar and background are the same files in both attempts
        assert_eq!(invocations[0].inputs[..3], invocations[1].inputs[..]);
        assert_eq!(invocations[1].terminal, "v2");
    }

    #[tokio::test]
    async fn test_double_failure_is_fatal_without_third_attempt() {
        let dir = TempDir::new().unwrap();
        let encoder = Arc::new(ScriptedEncoder::new(vec![
            (vec![], false),
            (vec![], false),
            (vec![], true),
        ]));

        let (result, _) = run(encoder.clone(), dir.path()).await;
        let err = result.unwrap_err();

        assert_eq!(encoder.calls(), 2);
        assert!(matches!(err, MediaError::RenderFailed { .. }));
        assert!(err.to_string().contains("scripted failure on call 1"));
        assert!(!dir.path().join("out.mp4").exists());
    }

    #[test]
    fn test_attempt_status_lines() {
        assert_eq!(RenderAttempt::WithText.status(), "Rendering...");
        assert_eq!(
            RenderAttempt::WithoutText.status(),
            "Rendering (Fallback mode)..."
        );
        assert!(RenderAttempt::WithText.include_text());
        assert!(!RenderAttempt::WithoutText.include_text());
    }
}
