//! Shared fixtures: an in-process fake Shimmy and fake download components.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tower::ServiceExt;

use shimmy_gateway::AppState;
use shimmy_gateway::backend::BackendClient;
use shimmy_gateway::config::CompletionsMode;
use shimmy_gateway::download::{
    ArtifactFetcher, BackendReloadTrigger, DownloadCoordinator, FetchError,
};
use shimmy_gateway::translate::Translator;

/// Nothing listens here.
pub const DEAD_BACKEND: &str = "http://127.0.0.1:1";

pub const STREAM_BODY: &str =
    "{\"response\":\"a\",\"done\":false}\n\n{\"response\":\"b\",\"done\":true}\n";

/// Start a fake Shimmy on an ephemeral port.
///
/// `/api/generate` answers `reply` when given, otherwise echoes the prompt,
/// and reports the request it received under `echo`. Model `"missing"` gets
/// a 404.
pub async fn spawn_backend(reply: Option<&'static str>) -> String {
    let app = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/v1/models",
            get(|| async { Json(json!({"object": "list", "data": [{"id": "phi3"}]})) }),
        )
        .route(
            "/api/generate",
            post(move |Json(body): Json<Value>| async move {
                if body["model"] == "missing" {
                    return (
                        StatusCode::NOT_FOUND,
                        Json(json!({"error": "model not found"})),
                    )
                        .into_response();
                }
                if body["stream"].as_bool().unwrap_or(false) {
                    return ([(header::CONTENT_TYPE, "application/x-ndjson")], STREAM_BODY)
                        .into_response();
                }
                let prompt = body["prompt"].as_str().unwrap_or_default().to_string();
                Json(json!({
                    "response": reply.map(str::to_string).unwrap_or(prompt),
                    "prompt_eval_count": 3,
                    "eval_count": 2,
                    "echo": body,
                }))
                .into_response()
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Size of the fake artifact; 0.02 MiB once rounded.
pub const ARTIFACT_BYTES: usize = 16 * 1024;

/// Writes a GGUF header padded to [`ARTIFACT_BYTES`], optionally waiting for
/// `gate` first.
pub struct FakeFetcher {
    pub calls: AtomicUsize,
    pub gate: Option<Arc<Notify>>,
}

#[async_trait]
impl ArtifactFetcher for FakeFetcher {
    async fn fetch(
        &self,
        _repo: &str,
        filename: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let path = dest_dir.join(filename);
        let mut artifact = vec![0u8; ARTIFACT_BYTES];
        artifact[..8].copy_from_slice(&[b'G', b'G', b'U', b'F', 3, 0, 0, 0]);
        tokio::fs::write(&path, artifact).await?;
        Ok(path)
    }
}

pub struct FakeReload;

#[async_trait]
impl BackendReloadTrigger for FakeReload {
    async fn reload(&self) -> bool {
        true
    }
}

pub fn downloads(dir: &Path, gate: Option<Arc<Notify>>) -> (Arc<DownloadCoordinator>, Arc<FakeFetcher>) {
    let fetcher = Arc::new(FakeFetcher {
        calls: AtomicUsize::new(0),
        gate,
    });
    let coord = DownloadCoordinator::new(dir.join("models"), fetcher.clone(), Arc::new(FakeReload));
    (Arc::new(coord), fetcher)
}

pub fn app_state(
    backend_url: &str,
    mode: CompletionsMode,
    downloads: Arc<DownloadCoordinator>,
) -> Arc<AppState> {
    Arc::new(AppState {
        backend: BackendClient::new(
            reqwest::Client::new(),
            backend_url,
            Duration::from_secs(2),
            Duration::from_secs(10),
        ),
        translator: Translator::new("phi3-lora"),
        completions_mode: mode,
        downloads,
    })
}

pub fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    post_raw(uri, body.to_string())
}

pub fn post_raw(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

pub fn json_of(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap()
}

pub fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
