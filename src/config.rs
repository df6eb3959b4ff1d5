use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "shimmy-gateway")]
#[command(about = "Route-translating proxy that re-exposes Shimmy under /v1/*")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PROXY_PORT", default_value_t = 8080)]
    pub port: u16,

    // Shimmy base url, "http://" is added when no scheme is given
    // Example: "localhost:8081"
    #[arg(short, long, env = "SHIMMY_URL", default_value = "http://localhost:8081")]
    pub backend_url: String,

    // Directory downloaded models are written to
    #[arg(short, long, env = "MODELS_DIR", default_value = "/models")]
    pub models_dir: PathBuf,

    // HuggingFace hub endpoint used by /v1/api/pull
    #[arg(long, env = "HF_ENDPOINT", default_value = "https://huggingface.co")]
    pub hf_endpoint: String,

    // Optional token for gated repositories
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    // Model name used when a completions request carries none
    #[arg(long, env = "DEFAULT_MODEL", default_value = "")]
    pub default_model: String,

    // Response contract for /v1/completions and /v1/chat/completions
    #[arg(long, env = "COMPLETIONS_MODE", value_enum, default_value_t = CompletionsMode::Openai)]
    pub completions_mode: CompletionsMode,

    // Shimmy executable used for `discover`
    #[arg(long, env = "SHIMMY_BIN", default_value = "shimmy")]
    pub backend_bin: String,

    // pgrep pattern matching the serving Shimmy process
    #[arg(long, env = "SHIMMY_SERVE_PATTERN", default_value = "shimmy serve")]
    pub serve_pattern: String,

    // Timeout for health and model-list calls, in seconds
    #[arg(long, default_value_t = 5)]
    pub probe_timeout: u64,

    // Timeout for generate calls, in seconds
    #[arg(long, default_value_t = 300)]
    pub generate_timeout: u64,

    // Connect timeout against the hub, in seconds
    #[arg(long, env = "HF_HUB_CONNECT_TIMEOUT", default_value_t = 10)]
    pub hub_connect_timeout: u64,

    // Longest silence tolerated while reading a hub download, in seconds
    #[arg(long, env = "HF_HUB_DOWNLOAD_TIMEOUT", default_value_t = 10)]
    pub hub_read_timeout: u64,
}

/// Which response contract the completions routes honour.
///
/// One deployment picks one; the two are never mixed.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionsMode {
    /// Wrap buffered results in an OpenAI envelope; stream with line re-framing.
    #[default]
    Openai,
    /// Return Shimmy's JSON untouched; stream with raw passthrough.
    Raw,
}

impl Args {
    pub fn backend_base_url(&self) -> String {
        normalize_url(&self.backend_url)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout)
    }

    pub fn generate_timeout(&self) -> Duration {
        Duration::from_secs(self.generate_timeout)
    }

    pub fn hub_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.hub_connect_timeout)
    }

    pub fn hub_read_timeout(&self) -> Duration {
        Duration::from_secs(self.hub_read_timeout)
    }
}

// add http:// if not present, drop trailing slash
pub fn normalize_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}
