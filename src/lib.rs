//! Route-translating proxy for a local Shimmy inference server.
//!
//! Re-exposes Shimmy's native endpoints under `/v1/*`, translates
//! OpenAI-style completions into Shimmy's generate contract, relays streamed
//! output, and serialises model downloads.

pub mod backend;
pub mod config;
pub mod download;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod relay;
pub mod routes;
pub mod state;
pub mod translate;

pub use routes::create_router;
pub use state::AppState;
