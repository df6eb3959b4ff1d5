//! Route-level tests: the router driven against a fake Shimmy.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::Notify;

use common::*;
use shimmy_gateway::config::CompletionsMode;
use shimmy_gateway::create_router;

#[tokio::test]
async fn chat_completion_is_wrapped_in_openai_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(Some("hello")).await;
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl));

    let (status, _, body) = send(
        app,
        post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "hi"}], "stream": false}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let env = json_of(&body);
    assert_eq!(env["object"], "chat.completion");
    assert_eq!(env["choices"][0]["message"]["content"], "hello");
    assert_eq!(env["choices"][0]["message"]["role"], "assistant");
    assert_eq!(env["usage"]["total_tokens"], 5);
    assert_eq!(env["model"], "phi3-lora");
    assert!(env["id"].as_str().unwrap().starts_with("chatcmpl-"));
}

#[tokio::test]
async fn echo_round_trip_returns_derived_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl.clone()));

    let (_, _, body) = send(
        app,
        post_json(
            "/v1/chat/completions",
            json!({"messages": [
                {"role": "system", "content": "terse"},
                {"role": "user", "content": "hi"}
            ]}),
        ),
    )
    .await;
    assert_eq!(
        json_of(&body)["choices"][0]["message"]["content"],
        "system: terse\nuser: hi"
    );

    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl));
    let (_, _, body) = send(app, post_json("/v1/completions", json!({"prompt": "2+2="}))).await;
    let env = json_of(&body);
    assert_eq!(env["object"], "text_completion");
    assert_eq!(env["choices"][0]["text"], "2+2=");
    assert!(env.get("usage").is_none());
}

#[tokio::test]
async fn raw_mode_returns_backend_json_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(&backend, CompletionsMode::Raw, dl));

    let (status, _, body) = send(
        app,
        post_json("/v1/completions", json!({"prompt": "p", "top_p": 0.9})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let raw = json_of(&body);
    assert_eq!(raw["response"], "p");
    // translated native request as Shimmy saw it
    assert_eq!(raw["echo"]["model"], "phi3-lora");
    assert_eq!(raw["echo"]["temperature"], 0.7);
    assert_eq!(raw["echo"]["max_tokens"], 512);
    assert_eq!(raw["echo"]["top_p"], 0.9);
    assert_eq!(raw["echo"]["stream"], false);
}

#[tokio::test]
async fn upstream_errors_follow_completions_mode() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let req = || post_json("/v1/completions", json!({"prompt": "p", "model": "missing"}));

    let raw = create_router(app_state(&backend, CompletionsMode::Raw, dl.clone()));
    let (status, _, body) = send(raw, req()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json_of(&body)["error"], "model not found");

    let openai = create_router(app_state(&backend, CompletionsMode::Openai, dl));
    let (status, _, body) = send(openai, req()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_of(&body)["error"].as_str().unwrap().contains("404"));
}

#[tokio::test]
async fn chat_stream_is_reframed_as_event_stream() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl));

    let (status, headers, body) = send(
        app,
        post_json(
            "/v1/chat/completions",
            json!({"messages": [{"role": "user", "content": "hi"}], "stream": true}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "text/event-stream");
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "{\"response\":\"a\",\"done\":false}\n{\"response\":\"b\",\"done\":true}\n"
    );
}

#[tokio::test]
async fn generate_stream_is_passed_through_as_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl));

    let (status, headers, body) = send(
        app,
        post_json("/v1/generate", json!({"model": "phi3", "prompt": "x", "stream": true})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "application/x-ndjson");
    assert_eq!(std::str::from_utf8(&body).unwrap(), STREAM_BODY);
}

#[tokio::test]
async fn generate_forwards_body_and_status_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);

    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl.clone()));
    let (status, _, body) = send(
        app,
        post_json("/v1/generate", json!({"model": "phi3", "prompt": "x", "custom": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let res = json_of(&body);
    assert_eq!(res["echo"]["custom"], 1);
    assert!(res["echo"].get("temperature").is_none());

    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl));
    let (status, _, _) = send(
        app,
        post_json("/v1/generate", json!({"model": "missing", "prompt": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_with_backend_down_is_500() {
    let dir = tempfile::tempdir().unwrap();
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(DEAD_BACKEND, CompletionsMode::Openai, dl));

    let (status, _, body) = send(app, post_json("/v1/generate", json!({"prompt": "x"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_of(&body)["error"].is_string());
}

#[tokio::test]
async fn malformed_body_is_400() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl));

    let (status, _, body) = send(app, post_raw("/v1/chat/completions", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_of(&body)["error"].is_string());
}

#[tokio::test]
async fn v1_health_with_backend_down_is_503() {
    let dir = tempfile::tempdir().unwrap();
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(DEAD_BACKEND, CompletionsMode::Openai, dl));

    let (status, _, body) = send(app, get_req("/v1/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let res = json_of(&body);
    assert_eq!(res["status"], "unhealthy");
    assert!(res["error"].is_string());
}

#[tokio::test]
async fn health_routes_with_backend_up() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);
    let state = app_state(&backend, CompletionsMode::Openai, dl);

    let (status, _, body) = send(create_router(state.clone()), get_req("/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body), json!({"status": "ok"}));

    let (status, _, body) = send(create_router(state), get_req("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let res = json_of(&body);
    assert_eq!(res["status"], "healthy");
    assert_eq!(res["shimmy"], "ready");
    assert!(res["timestamp"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn composite_health_reports_unreachable_backend() {
    let dir = tempfile::tempdir().unwrap();
    let (dl, _) = downloads(dir.path(), None);
    let app = create_router(app_state(DEAD_BACKEND, CompletionsMode::Openai, dl));

    let (status, _, body) = send(app, get_req("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let res = json_of(&body);
    assert_eq!(res["status"], "unhealthy");
    assert_eq!(res["proxy"], "running");
    assert_eq!(res["shimmy"], "unreachable");
}

#[tokio::test]
async fn models_passthrough_and_failure() {
    let dir = tempfile::tempdir().unwrap();
    let backend = spawn_backend(None).await;
    let (dl, _) = downloads(dir.path(), None);

    let app = create_router(app_state(&backend, CompletionsMode::Openai, dl.clone()));
    let (status, _, body) = send(app, get_req("/v1/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["data"][0]["id"], "phi3");

    let app = create_router(app_state(DEAD_BACKEND, CompletionsMode::Openai, dl));
    let (status, _, body) = send(app, get_req("/v1/models")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json_of(&body)["error"].is_string());
}

#[tokio::test]
async fn pull_streams_events_as_ndjson() {
    let dir = tempfile::tempdir().unwrap();
    let (dl, fetcher) = downloads(dir.path(), None);
    let app = create_router(app_state(DEAD_BACKEND, CompletionsMode::Openai, dl));

    let (status, headers, body) = send(
        app,
        post_json(
            "/v1/api/pull",
            json!({"model": "org/repo", "filename": "model.Q4_K_M.gguf"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "application/x-ndjson");
    let lines: Vec<serde_json::Value> = std::str::from_utf8(&body)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["status"], "starting");
    assert_eq!(lines[0]["model"], "org/repo");
    assert_eq!(lines[1]["status"], "complete");
    assert_eq!(lines[1]["filename"], "model.Q4_K_M.gguf");
    assert_eq!(lines[1]["discovered"], true);
    let size_mb = lines[1]["size_mb"].as_f64().unwrap();
    assert!(size_mb > 0.0, "{size_mb}");
    assert_eq!(size_mb, 0.02);
    assert_eq!(fetcher.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pull_requires_model_and_filename() {
    let dir = tempfile::tempdir().unwrap();
    let (dl, fetcher) = downloads(dir.path(), None);
    let state = app_state(DEAD_BACKEND, CompletionsMode::Openai, dl);

    let (status, _, body) = send(
        create_router(state.clone()),
        post_json("/v1/api/pull", json!({"model": "org/repo"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let res = json_of(&body);
    assert_eq!(res["status"], "error");
    assert_eq!(res["error"], "Both 'model' and 'filename' are required");

    let (status, _, _) = send(create_router(state), post_raw("/v1/api/pull", "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(fetcher.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_pull_gets_409_and_root_shows_job() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Notify::new());
    let (dl, fetcher) = downloads(dir.path(), Some(gate.clone()));
    let state = app_state(DEAD_BACKEND, CompletionsMode::Openai, dl);

    let first = tower::ServiceExt::oneshot(
        create_router(state.clone()),
        post_json("/v1/api/pull", json!({"model": "org/a", "filename": "a.gguf"})),
    )
    .await
    .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let (status, _, body) = send(
        create_router(state.clone()),
        post_json("/v1/api/pull", json!({"model": "org/b", "filename": "b.gguf"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json_of(&body)["error"],
        "Download already in progress: org/a/a.gguf"
    );

    let (_, _, body) = send(create_router(state.clone()), get_req("/")).await;
    let root = json_of(&body);
    assert_eq!(root["download_status"]["in_progress"], true);
    assert_eq!(root["download_status"]["current_model"], "org/a");
    assert_eq!(root["download_status"]["current_filename"], "a.gguf");

    gate.notify_one();
    let body = http_body_util::BodyExt::collect(first.into_body())
        .await
        .unwrap()
        .to_bytes();
    assert!(std::str::from_utf8(&body).unwrap().contains("\"complete\""));
    assert_eq!(fetcher.calls.load(std::sync::atomic::Ordering::SeqCst), 1);

    // slot is released once the download task winds down
    for _ in 0..100 {
        if !state.downloads.status().in_progress {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let (_, _, body) = send(create_router(state), get_req("/")).await;
    let root = json_of(&body);
    assert_eq!(root["download_status"]["in_progress"], false);
    assert!(root["download_status"]["current_model"].is_null());
}
