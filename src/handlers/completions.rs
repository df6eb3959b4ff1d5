use axum::Json;
use axum::extract::{MatchedPath, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use super::parse_body;
use crate::config::CompletionsMode;
use crate::error::{BackendError, ProxyError};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{ExternalRequest, GenerateResult};
use crate::relay::{EVENT_STREAM, NDJSON, passthrough, reframe_lines, streaming_response};
use crate::state::AppState;

/// `/v1/completions` and `/v1/chat/completions`.
///
/// The request is always translated to Shimmy's generate shape. What comes
/// back depends on the deployment's [`CompletionsMode`]:
///
/// * `Openai`: buffered results are wrapped in an OpenAI envelope, streams
///   are re-framed line by line as `text/event-stream`.
/// * `Raw`: Shimmy's JSON and status are returned as-is, streams pass through
///   as NDJSON.
///
/// Streamed chunks are never translated, in either mode.
pub async fn completions_handler(
    State(state): State<Arc<AppState>>,
    path: MatchedPath,
    body: Bytes,
) -> Result<Response, ProxyError> {
    REQUEST_TOTAL.with_label_values(&[path.as_str()]).inc();

    let req: ExternalRequest = parse_body(&body)?;
    let native = state.translator.to_native(&req);
    let mode = state.completions_mode;
    info!(
        route = path.as_str(),
        model = %native.model,
        chat = req.is_chat(),
        stream = native.stream,
        ?mode,
        "Forwarding completion to Shimmy /api/generate"
    );

    if native.stream {
        let upstream = state
            .backend
            .generate_stream(&native)
            .await
            .map_err(|e| backend_failure(mode, e))?;
        return Ok(match mode {
            CompletionsMode::Openai => streaming_response(reframe_lines(upstream), EVENT_STREAM),
            CompletionsMode::Raw => streaming_response(passthrough(upstream), NDJSON),
        });
    }

    let start_time = Instant::now();
    let res = state
        .backend
        .generate(&native)
        .await
        .map_err(|e| backend_failure(mode, e))?;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match mode {
        CompletionsMode::Raw => Ok((res.status, Json(res.body)).into_response()),
        CompletionsMode::Openai => {
            let body = res.into_success()?;
            let result: GenerateResult = serde_json::from_value(body)
                .map_err(|e| ProxyError::from(BackendError::InvalidBody(e.to_string())))?;
            debug!(
                prompt_eval_count = result.prompt_eval_count,
                eval_count = result.eval_count,
                "Transforming Shimmy response to OpenAI format"
            );
            Ok(Json(state.translator.to_external(result, &req)).into_response())
        }
    }
}

// raw mode is a passthrough route; openai mode wraps everything as a 500
fn backend_failure(mode: CompletionsMode, err: BackendError) -> ProxyError {
    match mode {
        CompletionsMode::Raw => ProxyError::passthrough(err),
        CompletionsMode::Openai => err.into(),
    }
}
