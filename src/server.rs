// HTTP surface over the job registry
//
// JSON in and out, camelCase, CORS-permissive. Errors are always
// `{"error": "..."}` with a status derived from `DownloadError`.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::downloader::{
    fetch_video_info, CliExtractor, DownloadError, DownloadParams, DownloadRunner,
    FfmpegTranscoder, JobRegistry, MediaExtractor, MediaTranscoder, ProgressRecord, ToolInfo,
    ToolManager, ToolType, VideoInfo,
};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
    pub extractor: Arc<dyn MediaExtractor>,
    pub tools: Arc<ToolManager>,
}

impl AppState {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        transcoder: Arc<dyn MediaTranscoder>,
        tools: ToolManager,
    ) -> Self {
        let runner = DownloadRunner::new(extractor.clone(), transcoder);
        Self {
            registry: JobRegistry::new(runner),
            extractor,
            tools: Arc::new(tools),
        }
    }

    /// Wire the real yt-dlp/ffmpeg engines from `config`
    pub fn from_config(config: &Config) -> Self {
        let tools = ToolManager::new(config.ytdlp_path.clone(), config.ffmpeg_path.clone());

        let extractor = CliExtractor::new(
            tools.resolve(ToolType::YtDlp),
            tools.locate(ToolType::Ffmpeg),
            config.probe_timeout,
        );
        let transcoder = FfmpegTranscoder::new(tools.resolve(ToolType::Ffmpeg));

        Self::new(Arc::new(extractor), Arc::new(transcoder), tools)
    }
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(e: DownloadError) -> Self {
        let status = match e {
            DownloadError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DownloadError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct InfoBody {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    download_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Started {
    download_id: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tools", get(tools))
        .route("/api/video/info", post(video_info))
        .route("/api/download/start", post(start_download))
        .route("/api/download/progress", get(all_progress))
        .route("/api/download/progress/:id", get(progress))
        .route("/api/download/cancel", post(cancel_download))
        .route("/api/download/clear/:id", delete(clear_download))
        .route("/api/download/events", get(events))
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "endpoint not found" })),
            )
        })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn tools(State(state): State<AppState>) -> ApiResult<Json<Vec<ToolInfo>>> {
    // Version probes spawn processes synchronously
    let tools = state.tools.clone();
    let infos = tokio::task::spawn_blocking(move || tools.get_all_tools())
        .await
        .map_err(|e| ApiError::internal(format!("tool lookup failed: {}", e)))?;
    Ok(Json(infos))
}

async fn video_info(
    State(state): State<AppState>,
    payload: Result<Json<InfoBody>, JsonRejection>,
) -> ApiResult<Json<VideoInfo>> {
    let Json(body) = payload?;
    let url = body
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("URL is required"))?;

    match fetch_video_info(state.extractor.as_ref(), url.trim()).await {
        Ok(info) => Ok(Json(info)),
        Err(e @ DownloadError::ExtractionFailed(_)) => Err(ApiError::bad_request(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadParams>, JsonRejection>,
) -> ApiResult<Json<Started>> {
    let Json(params) = payload?;
    let download_id = state.registry.start(params).await?;
    Ok(Json(Started { download_id }))
}

async fn all_progress(State(state): State<AppState>) -> Json<Vec<ProgressRecord>> {
    Json(state.registry.all_progress().await)
}

async fn progress(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProgressRecord>> {
    Ok(Json(state.registry.progress(&id).await?))
}

async fn cancel_download(
    State(state): State<AppState>,
    payload: Result<Json<CancelBody>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(body) = payload?;
    let id = body
        .download_id
        .ok_or_else(|| ApiError::bad_request("downloadId is required"))?;
    state.registry.cancel(&id).await?;
    Ok(Json(json!({ "status": "cancelling" })))
}

async fn clear_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.registry.clear(&id).await?;
    Ok(Json(json!({ "status": "cleared" })))
}

/// One SSE message per record update. Lagging subscribers skip what they
/// missed; the next update carries the full record anyway.
async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.registry.subscribe()).filter_map(|update| {
        let record = update.ok()?;
        Event::default()
            .event("progress")
            .json_data(&record)
            .ok()
            .map(Ok)
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Bind, serve until Ctrl+C, then wait for running downloads to stop
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config);
    let registry = state.registry.clone();
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    tracing::info!("Server stopped, cancelling active downloads");
    registry.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to install Ctrl+C handler: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::extractors::MediaProbe;
    use crate::downloader::testing::{FakeExtractor, FakeTranscoder};
    use axum::body::Body;
    use axum::http::Request;
    use tokio::sync::Semaphore;
    use tower::ServiceExt;

    fn app_with(extractor: FakeExtractor) -> Router {
        let state = AppState::new(
            Arc::new(extractor),
            Arc::new(FakeTranscoder::writing(b"")),
            ToolManager::default(),
        );
        router(state)
    }

    fn app() -> Router {
        app_with(FakeExtractor::downloading(vec![]))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_info_rejects_invalid_url() {
        let (status, body) = send(
            &app(),
            post_json("/api/video/info", json!({ "url": "https://example.com/watch?v=x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Invalid"));
    }

    #[tokio::test]
    async fn test_info_extraction_failure_is_bad_request() {
        let app = app_with(FakeExtractor::with_probe(Err(DownloadError::ExtractionFailed(
            "Video unavailable".to_string(),
        ))));
        let (status, body) = send(
            &app,
            post_json("/api/video/info", json!({ "url": "https://youtu.be/abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Video unavailable"));
    }

    #[tokio::test]
    async fn test_info_success() {
        let probe = MediaProbe {
            id: Some("abc".to_string()),
            title: Some("Title".to_string()),
            ..Default::default()
        };
        let app = app_with(FakeExtractor::with_probe(Ok(probe)));
        let (status, body) = send(
            &app,
            post_json("/api/video/info", json!({ "url": "https://youtu.be/abc" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Title");
        assert_eq!(body["availableQualities"], json!(["best"]));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/download/start")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_url() {
        let (status, body) = send(
            &app(),
            post_json(
                "/api/download/start",
                json!({ "url": "not a url", "outputDir": "/tmp" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let app = app();

        let (status, body) = send(&app, get("/api/download/progress/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Download not found");

        let (status, _) = send(
            &app,
            post_json("/api/download/cancel", json!({ "downloadId": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = Request::builder()
            .method("DELETE")
            .uri("/api/download/clear/missing")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_then_poll_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let app = app();

        let (status, body) = send(
            &app,
            post_json(
                "/api/download/start",
                json!({
                    "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
                    "outputDir": dir.path().to_string_lossy(),
                    "quality": "720p"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["downloadId"].as_str().unwrap().to_string();

        let (status, record) = send(&app, get(&format!("/api/download/progress/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["downloadId"], id.as_str());

        let (status, list) = send(&app, get("/api/download/progress")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list.as_array().unwrap().len(), 1);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/api/download/clear/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "cleared" }));
    }

    async fn wait_for_record<F>(app: &Router, id: &str, done: F) -> serde_json::Value
    where
        F: Fn(&serde_json::Value) -> bool,
    {
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let (_, record) = send(app, get(&format!("/api/download/progress/{id}"))).await;
                if done(&record) {
                    return record;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("record did not reach the expected state")
    }

    #[tokio::test]
    async fn test_cancel_active_download() {
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let app = app_with(
            FakeExtractor::downloading(vec![
                FakeExtractor::percent_tick("10%"),
                FakeExtractor::percent_tick("20%"),
            ])
            .gated(gate.clone()),
        );

        let (_, body) = send(
            &app,
            post_json(
                "/api/download/start",
                json!({
                    "url": "https://youtu.be/abc",
                    "outputDir": dir.path().to_string_lossy(),
                }),
            ),
        )
        .await;
        let id = body["downloadId"].as_str().unwrap().to_string();
        wait_for_record(&app, &id, |r| r["progress"] == 10.0).await;

        let (status, body) = send(
            &app,
            post_json("/api/download/cancel", json!({ "downloadId": id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "cancelling" }));

        gate.add_permits(1);
        let record = wait_for_record(&app, &id, |r| r["status"] == "cancelled").await;
        assert_eq!(record["progress"], 0.0);
    }

    #[tokio::test]
    async fn test_tools_lists_both_engines() {
        let (status, body) = send(&app(), get("/api/tools")).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["yt-dlp", "ffmpeg"]);
    }

    #[tokio::test]
    async fn test_events_stream_progress_records() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(
            Arc::new(FakeExtractor::downloading(vec![])),
            Arc::new(FakeTranscoder::writing(b"")),
            ToolManager::default(),
        );
        let registry = state.registry.clone();
        let app = router(state);

        let response = app.oneshot(get("/api/download/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let id = registry
            .start(DownloadParams {
                url: Some("https://youtu.be/abc".to_string()),
                output_dir: Some(dir.path().to_string_lossy().to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut frames = response.into_body().into_data_stream();
        let mut text = String::new();
        while !text.contains("\n\n") {
            let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), frames.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            text.push_str(std::str::from_utf8(&chunk).unwrap());
        }

        let frame = text.split("\n\n").next().unwrap();
        assert!(frame.starts_with("event: progress\n"));
        let data = frame
            .lines()
            .find_map(|l| l.strip_prefix("data: "))
            .unwrap();
        let record: serde_json::Value = serde_json::from_str(data).unwrap();
        assert_eq!(record["downloadId"], id.as_str());
        assert_eq!(record["status"], "downloading");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (status, body) = send(&app(), get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }
}
