mod completions;
mod generate;
mod health;
mod metrics;
mod models;
mod pull;
mod root;

pub use completions::completions_handler;
pub use generate::generate_handler;
pub use health::{health_handler, v1_health_handler};
pub use metrics::metrics_handler;
pub use models::models_handler;
pub use pull::pull_handler;
pub use root::root_handler;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ProxyError;

// Parse a JSON body ourselves so malformed input is a 400 with a JSON error
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ProxyError> {
    serde_json::from_slice(body).map_err(|e| ProxyError::BadRequest(format!("Invalid request body: {e}")))
}
