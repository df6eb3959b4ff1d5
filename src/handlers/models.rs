use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{error, info};

use crate::error::ProxyError;
use crate::metrics::REQUEST_TOTAL;
use crate::state::AppState;

// /v1/models, straight passthrough
pub async fn models_handler(State(state): State<Arc<AppState>>) -> Response {
    REQUEST_TOTAL.with_label_values(&["/v1/models"]).inc();
    info!("Proxying /v1/models to Shimmy");

    match state.backend.list_models().await {
        Ok(res) => (res.status, Json(res.body)).into_response(),
        Err(e) => {
            error!("Models list failed: {e}");
            ProxyError::Internal(e.to_string()).into_response()
        }
    }
}
