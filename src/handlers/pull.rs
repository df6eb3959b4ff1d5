use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::warn;

use crate::download::PullError;
use crate::metrics::REQUEST_TOTAL;
use crate::models::PullRequest;
use crate::relay::{NDJSON, streaming_response};
use crate::state::AppState;

/// `/v1/api/pull`: download a model file and stream progress as NDJSON.
///
/// Body: `{"model": "<org>/<repo>", "filename": "<file>.gguf"}`.
pub async fn pull_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    REQUEST_TOTAL.with_label_values(&["/v1/api/pull"]).inc();

    let req: PullRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            warn!("Rejected pull request body: {e}");
            return pull_error(StatusCode::BAD_REQUEST, "Request body required");
        }
    };
    let model = req.model.unwrap_or_default();
    let filename = req.filename.unwrap_or_default();

    match state.downloads.pull(&model, &filename) {
        Ok(events) => {
            let lines = events.map(|ev| Ok::<_, Infallible>(Bytes::from(ev.to_line())));
            streaming_response(lines, NDJSON)
        }
        Err(e) => {
            let status = match e {
                PullError::AlreadyRunning { .. } => StatusCode::CONFLICT,
                PullError::MissingFields | PullError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            };
            warn!("Pull refused: {e}");
            pull_error(status, &e.to_string())
        }
    }
}

fn pull_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(serde_json::json!({
            "status": "error",
            "error": message
        })),
    )
        .into_response()
}
