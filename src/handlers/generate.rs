use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::parse_body;
use crate::error::ProxyError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::relay::{NDJSON, passthrough, streaming_response};
use crate::state::AppState;

// /v1/generate -> Shimmy /api/generate, body forwarded untouched
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ProxyError> {
    REQUEST_TOTAL.with_label_values(&["/v1/generate"]).inc();

    let payload: Value = parse_body(&body)?;
    if !payload.is_object() {
        return Err(ProxyError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    }

    let model = payload.get("model").and_then(Value::as_str).unwrap_or("unknown");
    info!("Proxying /v1/generate to Shimmy /api/generate for model: {model}");

    let is_stream = payload.get("stream").and_then(Value::as_bool).unwrap_or(false);
    if is_stream {
        let upstream = state
            .backend
            .generate_stream(&payload)
            .await
            .map_err(ProxyError::passthrough)?;
        return Ok(streaming_response(passthrough(upstream), NDJSON));
    }

    let start_time = Instant::now();
    let res = state
        .backend
        .generate(&payload)
        .await
        .map_err(ProxyError::passthrough)?;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok((res.status, Json(res.body)).into_response())
}
