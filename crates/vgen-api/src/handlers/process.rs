//! Job submission: multipart upload in, server-sent events out.

use std::convert::Infallible;
use std::path::PathBuf;

use axum::extract::{Multipart, State};
use axum::http::header::HOST;
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use futures_util::stream::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn, Instrument};

use vgen_jobs::{progress_channel, ArtifactTracker, ChannelItem, JobRequest, WorkspaceProvider};
use vgen_media::RenderAttempt;
use vgen_models::JobId;

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;

const IMAGE_FIELD: &str = "doctorImage";
const NAME_FIELD: &str = "doctorName";
const X_FIELD: &str = "overlayX";
const Y_FIELD: &str = "overlayY";

/// Fields read from the submission form.
#[derive(Debug, Default)]
struct SubmittedForm {
    upload: Option<PathBuf>,
    name: Option<String>,
    overlay_x: Option<String>,
    overlay_y: Option<String>,
}

/// `POST /api/process-video-stream`
///
/// The job runs on its own task, so it finishes and cleans up even if the
/// caller disconnects mid-stream.
pub async fn process_video_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let form = read_form(state.workspace(), multipart).await?;

    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    let request = JobRequest {
        id: JobId::new(),
        label: form.name,
        anchor_x: form.overlay_x,
        anchor_y: form.overlay_y,
        upload: form.upload,
        download_base: state.config.download_base(host),
    };
    info!(job_id = %request.id, has_image = request.upload.is_some(), "Job accepted");

    let (reporter, stream) = progress_channel(state.pipeline.keepalive_interval());
    let pipeline = state.pipeline.clone();

    metrics::record_job_started();
    tokio::spawn(
        async move {
            match pipeline.run(request, reporter).await {
                Ok(done) => {
                    if done.attempt == RenderAttempt::WithoutText {
                        metrics::record_fallback_render();
                    }
                    metrics::record_job_completed(done.attempt.as_str(), done.render_time.as_secs_f64());
                }
                Err(e) => metrics::record_job_failed(e.kind()),
            }
        }
        .in_current_span(),
    );

    Ok(Sse::new(stream.map(|item| Ok(to_sse_event(item)))))
}

/// Read the form, streaming the image into the upload directory.
///
/// A partially written upload is removed if reading fails.
async fn read_form(workspace: &WorkspaceProvider, mut multipart: Multipart) -> ApiResult<SubmittedForm> {
    let mut pending = ArtifactTracker::new();
    let mut form = SubmittedForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(IMAGE_FIELD) if form.upload.is_none() => {
                let path = pending.register(workspace.upload_path(field.file_name()));
                let mut file = tokio::fs::File::create(&path).await?;
                let mut written = 0usize;
                while let Some(chunk) = field.chunk().await? {
                    file.write_all(&chunk).await?;
                    written += chunk.len();
                }
                file.flush().await?;
                // Browsers send an empty part when no file was chosen
                if written > 0 {
                    form.upload = Some(path);
                }
            }
            Some(NAME_FIELD) => form.name = Some(field.text().await?),
            Some(X_FIELD) => form.overlay_x = Some(field.text().await?),
            Some(Y_FIELD) => form.overlay_y = Some(field.text().await?),
            _ => {}
        }
    }

    // Ownership of the upload passes to the job; empty parts are dropped here
    if let Some(path) = &form.upload {
        pending.forget(path);
    }
    pending.cleanup().await;

    Ok(form)
}

fn to_sse_event(item: ChannelItem) -> Event {
    match item {
        ChannelItem::KeepAlive => Event::default().comment("keep-alive"),
        ChannelItem::Event(event) => {
            let name = event.event_type().as_str();
            match serde_json::to_string(&event) {
                Ok(data) => Event::default().event(name).data(data),
                Err(e) => {
                    warn!("Failed to serialize job event: {}", e);
                    Event::default()
                        .event("error")
                        .data(r#"{"error":"Internal server error."}"#)
                }
            }
        }
    }
}
