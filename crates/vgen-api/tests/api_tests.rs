//! Router-level tests driven through `tower::ServiceExt::oneshot`.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use vgen_api::{create_router, ApiConfig, AppState};
use vgen_jobs::{JobPipeline, PipelineConfig};
use vgen_media::{Encoder, EncoderInvocation, MediaError, MediaResult};

const BOUNDARY: &str = "vgen-test-boundary";

/// Writes a small output file and succeeds, or fails without output.
struct StubEncoder {
    succeed: bool,
}

#[async_trait]
impl Encoder for StubEncoder {
    async fn encode(
        &self,
        invocation: &EncoderInvocation,
        progress: mpsc::UnboundedSender<Duration>,
    ) -> MediaResult<()> {
        let _ = progress.send(Duration::from_secs(76));
        if !self.succeed {
            return Err(MediaError::ffmpeg_failed("encoder crashed", None, Some(1)));
        }
        tokio::fs::write(&invocation.output, b"rendered-mp4").await?;
        Ok(())
    }
}

struct TestApp {
    _root: TempDir,
    config: PipelineConfig,
    router: Router,
}

async fn test_app(with_base: bool, succeed: bool) -> TestApp {
    let root = TempDir::new().unwrap();
    let config = PipelineConfig::rooted_at(root.path());
    config.workspace().ensure_dirs().await.unwrap();
    if with_base {
        std::fs::create_dir_all(config.base_video_path.parent().unwrap()).unwrap();
        std::fs::write(&config.base_video_path, b"base").unwrap();
    }

    let pipeline = JobPipeline::new(&config, Arc::new(StubEncoder { succeed }));
    let state = AppState::with_pipeline(ApiConfig::default(), pipeline);
    TestApp {
        _root: root,
        config,
        router: create_router(state, None),
    }
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(40, 30, image::Rgba([200, 40, 40, 255]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageOutputFormat::Png).unwrap();
    buf.into_inner()
}

fn multipart_body(name: &str, image: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"doctorName\"\r\n\r\n{name}\r\n"
        )
        .as_bytes(),
    );
    if let Some(bytes) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"doctorImage\"; filename=\"face.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn submit(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/process-video-stream")
        .header(header::HOST, "localhost:3001")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// `(event name, data)` pairs from an SSE body, comments skipped.
fn sse_events(text: &str) -> Vec<(String, String)> {
    text.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = None;
            for line in frame.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    event = Some(v.trim().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(v.trim().to_string());
                }
            }
            Some((event?, data?))
        })
        .collect()
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app(true, true).await;
    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn ready_is_degraded_without_base_video() {
    let app = test_app(false, true).await;
    let response = app.router.oneshot(get("/ready")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["base_video"]["status"], "error");
    assert_eq!(json["checks"]["scratch_dirs"]["status"], "ok");
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = test_app(true, true).await;
    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn non_multipart_submission_is_rejected() {
    let app = test_app(true, true).await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/process-video-stream")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = app.router.oneshot(request).await.unwrap();
    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn missing_base_video_streams_single_error() {
    let app = test_app(false, true).await;
    let response = app
        .router
        .oneshot(submit(multipart_body("Dr. Ada", Some(&png_bytes()))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let events = sse_events(&body_text(response).await);
    let errors: Vec<_> = events.iter().filter(|(e, _)| e == "error").collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].1.contains("Base video not found."));
    assert_eq!(events.last().unwrap().0, "error");

    // Upload is removed once the job ends
    let leftovers = std::fs::read_dir(app.config.workspace().upload_dir()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn missing_image_streams_error() {
    let app = test_app(true, true).await;
    let response = app
        .router
        .oneshot(submit(multipart_body("Dr. Ada", None)))
        .await
        .unwrap();

    let events = sse_events(&body_text(response).await);
    let (name, data) = events.last().unwrap();
    assert_eq!(name, "error");
    assert!(data.contains("No image uploaded."));
}

#[tokio::test]
async fn failed_renders_stream_single_error() {
    let app = test_app(true, false).await;
    let response = app
        .router
        .oneshot(submit(multipart_body("Dr. Ada", Some(&png_bytes()))))
        .await
        .unwrap();

    let events = sse_events(&body_text(response).await);
    assert_eq!(events.iter().filter(|(e, _)| e == "error").count(), 1);
    assert!(events.last().unwrap().1.contains("Render failed completely."));
    assert!(!events.iter().any(|(e, _)| e == "complete"));

    let outputs = std::fs::read_dir(app.config.workspace().output_dir()).unwrap().count();
    assert_eq!(outputs, 0);
}

#[tokio::test]
async fn completed_job_is_downloadable_once() {
    let app = test_app(true, true).await;
    let response = app
        .router
        .clone()
        .oneshot(submit(multipart_body("Dr. Ada", Some(&png_bytes()))))
        .await
        .unwrap();

    let events = sse_events(&body_text(response).await);
    assert_eq!(events.first().unwrap().0, "progress");
    let (name, data) = events.last().unwrap();
    assert_eq!(name, "complete");

    let payload: serde_json::Value = serde_json::from_str(data).unwrap();
    let file_name = payload["name"].as_str().unwrap().to_string();
    assert!(file_name.starts_with("video-") && file_name.ends_with(".mp4"));
    assert_eq!(
        payload["url"],
        format!("http://localhost:3001/download/{file_name}")
    );

    let uri = format!("/download/{file_name}");
    let first = app.router.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get(header::CONTENT_TYPE).unwrap(), "video/mp4");
    assert_eq!(body_text(first).await, "rendered-mp4");

    let second = app.router.oneshot(get(&uri)).await.unwrap();
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_of_unknown_file_is_not_found() {
    let app = test_app(true, true).await;
    let response = app
        .router
        .oneshot(get("/download/video-missing.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_rejects_path_traversal() {
    let app = test_app(true, true).await;
    std::fs::write(app.config.workspace().temp_dir().join("secret.txt"), b"x").unwrap();

    let response = app
        .router
        .oneshot(get("/download/..%2F..%2Ftemp%2Fsecret.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(app.config.workspace().temp_dir().join("secret.txt").exists());
}
