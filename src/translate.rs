//! Conversion between the OpenAI-style contract and Shimmy's native generate
//! contract.
//!
//! Only buffered responses are translated. Streamed chunks are relayed in
//! Shimmy's own format (see [`crate::relay`]).

use sha2::{Digest, Sha256};

use crate::models::{
    AssistantMessage, ChatChoice, ChatCompletion, ChatMessage, DEFAULT_MAX_TOKENS, DEFAULT_PENALTY,
    DEFAULT_TEMPERATURE, DEFAULT_TOP_P, ExternalRequest, ExternalResponse, GenerateRequest,
    GenerateResult, TextChoice, TextCompletion, Usage,
};

// hex chars of the response digest kept in the envelope id
const ID_HASH_LEN: usize = 24;

#[derive(Debug, Clone, Default)]
pub struct Translator {
    default_model: String,
}

impl Translator {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
        }
    }

    fn model_for(&self, req: &ExternalRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Build the native request. Never fails; every missing field has a default.
    pub fn to_native(&self, req: &ExternalRequest) -> GenerateRequest {
        let prompt = match &req.messages {
            Some(messages) => flatten_messages(messages),
            None => req.prompt.clone().unwrap_or_default(),
        };

        GenerateRequest {
            model: self.model_for(req),
            prompt,
            stream: req.stream.unwrap_or(false),
            temperature: req.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            top_p: req.top_p.unwrap_or(DEFAULT_TOP_P),
            frequency_penalty: req.frequency_penalty.unwrap_or(DEFAULT_PENALTY),
            presence_penalty: req.presence_penalty.unwrap_or(DEFAULT_PENALTY),
        }
    }

    /// Wrap a buffered native result in the envelope matching the request kind.
    pub fn to_external(&self, result: GenerateResult, req: &ExternalRequest) -> ExternalResponse {
        let created = chrono::Utc::now().timestamp();
        let model = self.model_for(req);

        if req.is_chat() {
            ExternalResponse::Chat(ChatCompletion {
                id: format!("chatcmpl-{}", response_digest(&result.response)),
                object: "chat.completion".to_string(),
                created,
                model,
                choices: vec![ChatChoice {
                    index: 0,
                    message: AssistantMessage {
                        role: "assistant".to_string(),
                        content: result.response,
                    },
                    finish_reason: "stop".to_string(),
                }],
                usage: Usage {
                    prompt_tokens: result.prompt_eval_count,
                    completion_tokens: result.eval_count,
                    total_tokens: result.prompt_eval_count + result.eval_count,
                },
            })
        } else {
            ExternalResponse::Text(TextCompletion {
                id: format!("cmpl-{}", response_digest(&result.response)),
                object: "text_completion".to_string(),
                created,
                model,
                choices: vec![TextChoice {
                    text: result.response,
                    index: 0,
                    finish_reason: "stop".to_string(),
                }],
            })
        }
    }
}

/// `"{role}: {content}"` per message, newline-joined, original order.
pub fn flatten_messages(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

// Ids only need to be unlikely to collide, not unique
fn response_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(ID_HASH_LEN);
    hex
}
