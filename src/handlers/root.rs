use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use std::sync::Arc;

use crate::models::DownloadStatus;
use crate::state::AppState;

// service descriptor
pub async fn root_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "Shimmy Gateway",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "completions_mode": format!("{:?}", state.completions_mode).to_lowercase(),
        "endpoints": {
            "health": "/v1/health",
            "generate": "/v1/generate",
            "models": "/v1/models",
            "completions": "/v1/completions",
            "chat_completions": "/v1/chat/completions",
            "pull": "/v1/api/pull"
        },
        "download_status": DownloadStatus::from(state.downloads.status())
    }))
}
