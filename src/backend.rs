//! HTTP client for Shimmy's native endpoints.

use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::metrics::BACKEND_FAILURES;

/// Raw body of a streamed generate call.
pub type ByteStream = BoxStream<'static, Result<Bytes, reqwest::Error>>;

/// Status and decoded JSON body of a buffered backend call.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl BackendResponse {
    /// Turn a non-2xx answer into `BackendError::Status`.
    pub fn into_success(self) -> Result<Value, BackendError> {
        if self.status.is_success() {
            Ok(self.body)
        } else {
            Err(BackendError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
    generate_timeout: Duration,
}

impl BackendClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        probe_timeout: Duration,
        generate_timeout: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            probe_timeout,
            generate_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<BackendResponse, BackendError> {
        let req = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(self.probe_timeout);
        self.buffered(req).await
    }

    /// Status of GET /health only; the body is not read.
    pub async fn health_status(&self, timeout: Duration) -> Result<StatusCode, BackendError> {
        let res = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(timeout)
            .send()
            .await
            .map_err(record_failure)?;
        Ok(res.status())
    }

    pub async fn list_models(&self) -> Result<BackendResponse, BackendError> {
        let req = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(self.probe_timeout);
        self.buffered(req).await
    }

    /// POST /api/generate and wait for the whole body.
    pub async fn generate<T: Serialize + ?Sized>(
        &self,
        body: &T,
    ) -> Result<BackendResponse, BackendError> {
        let req = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(body)
            .timeout(self.generate_timeout);
        self.buffered(req).await
    }

    /// POST /api/generate and hand back the body as a byte stream.
    ///
    /// Fails before any byte is relayed if Shimmy answers non-2xx.
    pub async fn generate_stream<T: Serialize + ?Sized>(
        &self,
        body: &T,
    ) -> Result<ByteStream, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(%url, "opening generate stream");

        let res = self
            .client
            .post(&url)
            .json(body)
            .timeout(self.generate_timeout)
            .send()
            .await
            .map_err(record_failure)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            warn!(%status, "generate stream rejected by backend");
            return Err(BackendError::Status {
                status,
                body: body_or_text(&text),
            });
        }

        Ok(res.bytes_stream().boxed())
    }

    async fn buffered(&self, req: reqwest::RequestBuilder) -> Result<BackendResponse, BackendError> {
        let res = req.send().await.map_err(record_failure)?;
        let status = res.status();
        let bytes = res.bytes().await.map_err(record_failure)?;
        let body = serde_json::from_slice(&bytes).map_err(|e| {
            BACKEND_FAILURES.inc();
            BackendError::InvalidBody(e.to_string())
        })?;
        Ok(BackendResponse { status, body })
    }
}

fn record_failure(err: reqwest::Error) -> BackendError {
    BACKEND_FAILURES.inc();
    err.into()
}

// error bodies are not always JSON
fn body_or_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::json!({ "error": text }))
}
