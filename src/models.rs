use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TOP_P: f64 = 1.0;
pub const DEFAULT_PENALTY: f64 = 0.0;

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_top_p() -> f64 {
    DEFAULT_TOP_P
}

fn default_role() -> String {
    "user".to_string()
}

// Shimmy /api/generate request format
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GenerateRequest {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default)]
    pub frequency_penalty: f64,
    #[serde(default)]
    pub presence_penalty: f64,
}

// Shimmy /api/generate response format (non-streaming)
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct GenerateResult {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

/// OpenAI-style body accepted by `/v1/completions` and `/v1/chat/completions`.
///
/// A request is a chat request iff `messages` is present.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ExternalRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

impl ExternalRequest {
    pub fn is_chat(&self) -> bool {
        self.messages.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AssistantMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TextChoice {
    pub text: String,
    pub index: u32,
    pub finish_reason: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Usage,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TextCompletion {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<TextChoice>,
}

// OpenAI-style envelope returned by the completions routes
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ExternalResponse {
    Chat(ChatCompletion),
    Text(TextCompletion),
}

// /v1/api/pull request body; fields stay optional so a missing one is a 400
#[derive(Debug, Deserialize, Default)]
pub struct PullRequest {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// State of the single download slot.
///
/// `in_progress == false` implies both `model` and `filename` are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadJob {
    pub in_progress: bool,
    pub model: Option<String>,
    pub filename: Option<String>,
}

// download_status block of the root descriptor
#[derive(Debug, Serialize)]
pub struct DownloadStatus {
    pub in_progress: bool,
    pub current_model: Option<String>,
    pub current_filename: Option<String>,
}

impl From<DownloadJob> for DownloadStatus {
    fn from(job: DownloadJob) -> Self {
        Self {
            in_progress: job.in_progress,
            current_model: job.model,
            current_filename: job.filename,
        }
    }
}

/// One line of the `/v1/api/pull` NDJSON stream.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadEvent {
    Starting {
        model: String,
        filename: String,
    },
    Complete {
        filename: String,
        path: String,
        size_mb: f64,
        discovered: bool,
    },
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl DownloadEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    // serialized event followed by the NDJSON line terminator
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({ "status": "error", "error": e.to_string() }).to_string()
        });
        line.push('\n');
        line
    }
}
