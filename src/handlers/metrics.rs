use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::metrics::render;

pub async fn metrics_handler() -> Response {
    match render() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => ProxyError::Internal(e).into_response(),
    }
}
