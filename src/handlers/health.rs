use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::metrics::REQUEST_TOTAL;
use crate::state::AppState;

const COMPOSITE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

// /health: proxy and Shimmy status in one document
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.backend.health_status(COMPOSITE_PROBE_TIMEOUT).await {
        Ok(StatusCode::OK) => Json(serde_json::json!({
            "status": "healthy",
            "proxy": "running",
            "shimmy": "ready",
            "timestamp": chrono::Utc::now().timestamp()
        }))
        .into_response(),
        Ok(status) => {
            warn!("Shimmy health check returned status {status}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "degraded",
                    "proxy": "running",
                    "shimmy": "unhealthy"
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Shimmy backend unreachable: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "proxy": "running",
                    "shimmy": "unreachable",
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

// /v1/health -> Shimmy /health
pub async fn v1_health_handler(State(state): State<Arc<AppState>>) -> Response {
    REQUEST_TOTAL.with_label_values(&["/v1/health"]).inc();
    info!("Proxying /v1/health to Shimmy /health");

    match state.backend.health().await {
        Ok(res) => (res.status, Json(res.body)).into_response(),
        Err(e) => {
            error!("Health check failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string()
                })),
            )
                .into_response()
        }
    }
}
