//! One-shot download of rendered videos.
//!
//! A file is claimed by renaming it to a private name before any bytes are
//! sent, so two concurrent requests cannot both receive it. Once every byte
//! has been handed to the transport the claimed file is deleted; if the
//! transfer stops early it is renamed back and can be fetched again.

use std::path::PathBuf;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Suffix of claimed files; never served directly.
const CLAIM_SUFFIX: &str = ".claimed";

const CHUNK_SIZE: usize = 64 * 1024;

/// `GET /download/:filename`
pub async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> ApiResult<Response> {
    let not_found = || ApiError::not_found("File not found");

    if filename.ends_with(CLAIM_SUFFIX) {
        return Err(not_found());
    }
    let path = state.workspace().resolve_output(&filename).ok_or_else(not_found)?;

    let claim = match Claim::acquire(path).await {
        Ok(Some(claim)) => claim,
        Ok(None) => return Err(not_found()),
        Err(e) => return Err(ApiError::Io(e)),
    };

    let file = tokio::fs::File::open(&claim.claimed).await?;
    let len = file.metadata().await?.len();

    info!(file = %filename, bytes = len, "Serving download");
    metrics::record_download_served();

    let body = Body::from_stream(stream::unfold(
        Some(Transfer {
            file,
            claim,
            remaining: len,
        }),
        |state| async move {
            let mut transfer = state?;
            if transfer.remaining == 0 {
                transfer.claim.complete();
                return None;
            }

            let mut buf = vec![0u8; CHUNK_SIZE];
            match transfer.file.read(&mut buf).await {
                Ok(0) => {
                    transfer.claim.complete();
                    None
                }
                Ok(n) => {
                    buf.truncate(n);
                    transfer.remaining = transfer.remaining.saturating_sub(n as u64);
                    if transfer.remaining == 0 {
                        transfer.claim.complete();
                    }
                    Some((Ok::<_, std::io::Error>(Bytes::from(buf)), Some(transfer)))
                }
                // Dropping the transfer releases the claim
                Err(e) => Some((Err(e), None)),
            }
        },
    ));

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        filename.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("video/mp4")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        body,
    )
        .into_response())
}

struct Transfer {
    file: tokio::fs::File,
    claim: Claim,
    remaining: u64,
}

/// An output file renamed out of the way for the duration of one transfer.
struct Claim {
    original: PathBuf,
    claimed: PathBuf,
    completed: bool,
}

impl Claim {
    /// Rename `original` to a private name. `None` when it does not exist.
    async fn acquire(original: PathBuf) -> std::io::Result<Option<Self>> {
        let mut claimed = original.clone().into_os_string();
        claimed.push(format!(".{}{}", Uuid::new_v4(), CLAIM_SUFFIX));
        let claimed = PathBuf::from(claimed);

        match tokio::fs::rename(&original, &claimed).await {
            Ok(()) => Ok(Some(Self {
                original,
                claimed,
                completed: false,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Mark every byte as sent; the file is deleted on drop.
    fn complete(&mut self) {
        self.completed = true;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if self.completed {
            match std::fs::remove_file(&self.claimed) {
                Ok(()) => info!(file = %self.original.display(), "Deleted downloaded video"),
                Err(e) => warn!(file = %self.claimed.display(), "Failed to delete downloaded video: {}", e),
            }
        } else {
            match std::fs::rename(&self.claimed, &self.original) {
                Ok(()) => debug!(file = %self.original.display(), "Download aborted, file released"),
                Err(e) => warn!(file = %self.claimed.display(), "Failed to release download claim: {}", e),
            }
        }
    }
}
