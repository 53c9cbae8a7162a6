//! Health check handlers.

use std::path::Path;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// `GET /health` and `/healthz`: liveness only.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub base_video: CheckStatus,
    pub ffmpeg: CheckStatus,
    pub scratch_dirs: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    /// Status of a check that started at `start` and finished with `outcome`.
    fn from_outcome(start: Instant, outcome: Result<(), String>) -> Self {
        match outcome {
            Ok(()) => Self {
                status: "ok".to_string(),
                error: None,
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(msg) => Self {
                status: "error".to_string(),
                error: Some(msg),
                latency_ms: None,
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// `GET /ready`: 503 unless the base video exists, ffmpeg is on `PATH`, and
/// every scratch directory accepts writes.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let start = Instant::now();
    let base_video = CheckStatus::from_outcome(
        start,
        match tokio::fs::try_exists(state.pipeline.base_video()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err("base video not found".to_string()),
            Err(e) => Err(e.to_string()),
        },
    );

    let start = Instant::now();
    let ffmpeg = CheckStatus::from_outcome(
        start,
        vgen_media::check_ffmpeg().map(|_| ()).map_err(|e| e.to_string()),
    );

    let start = Instant::now();
    let ws = state.workspace();
    let mut scratch = Ok(());
    for dir in [ws.upload_dir(), ws.temp_dir(), ws.output_dir()] {
        if let Err(e) = probe_writable(dir).await {
            scratch = Err(format!("{}: {}", dir.display(), e));
            break;
        }
    }
    let scratch_dirs = CheckStatus::from_outcome(start, scratch);

    let all_ok = base_video.is_ok() && ffmpeg.is_ok() && scratch_dirs.is_ok();
    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        checks: ReadinessChecks {
            base_video,
            ffmpeg,
            scratch_dirs,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn probe_writable(dir: &Path) -> std::io::Result<()> {
    let probe = dir.join(format!(".ready-{}", Uuid::new_v4()));
    tokio::fs::write(&probe, b"").await?;
    tokio::fs::remove_file(&probe).await
}
