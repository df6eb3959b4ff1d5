use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::handlers::{
    completions_handler, generate_handler, health_handler, metrics_handler, models_handler,
    pull_handler, root_handler, v1_health_handler,
};
use crate::state::AppState;

// every externally allowed route and the handler behind it
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/v1/health", get(v1_health_handler)) // -> /health
        .route("/v1/models", get(models_handler)) // -> /v1/models
        .route("/v1/generate", post(generate_handler)) // -> /api/generate
        .route("/v1/completions", post(completions_handler))
        .route("/v1/chat/completions", post(completions_handler))
        .route("/v1/api/pull", post(pull_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
