//! OpenAI-compatible chat-completions provider.
//!
//! Speaks the `/v1/chat/completions` wire format over [`reqwest`], which also
//! covers Azure-style gateways and local servers that mimic the endpoint
//! (`base_url` is configurable). Vision input is carried as `image_url` parts
//! with base64 data URIs.
//!
//! HTTP status codes map onto the [`CompletionError`] contract:
//!
//! | Condition                  | Classification |
//! |----------------------------|----------------|
//! | 429                        | `RateLimited` (honours `Retry-After`) |
//! | 500 / 502 / 503 / 504      | `Transient` |
//! | connect / timeout error    | `Transient` |
//! | any other non-2xx          | `Api` |

use super::{ChatMessage, Completion, CompletionError, CompletionOptions, CompletionProvider};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for OpenAI-compatible chat-completion endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Point at a non-default endpoint (trailing slashes are trimmed).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout. Default: 60 s.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Value {
        let wire_messages: Vec<Value> = messages.iter().map(wire_message).collect();
        let mut body = json!({
            "model": self.model,
            "messages": wire_messages,
        });
        if let Some(t) = options.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = options.max_tokens {
            body["max_tokens"] = json!(n);
        }
        body
    }
}

/// Serialise one [`ChatMessage`] into the wire shape: a plain string content
/// for text-only turns, an array of `text` / `image_url` parts otherwise.
fn wire_message(message: &ChatMessage) -> Value {
    if message.images.is_empty() {
        return json!({
            "role": message.role.as_str(),
            "content": message.content,
        });
    }

    let mut parts = vec![json!({ "type": "text", "text": message.content })];
    for img in &message.images {
        let mut image_url = json!({ "url": img.to_data_url() });
        if let Some(ref detail) = img.detail {
            image_url["detail"] = json!(detail);
        }
        parts.push(json!({ "type": "image_url", "image_url": image_url }));
    }
    json!({
        "role": message.role.as_str(),
        "content": parts,
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, options);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    CompletionError::Transient {
                        status: None,
                        detail: e.to_string(),
                    }
                } else {
                    CompletionError::Api {
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(CompletionError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::Transient {
                status: Some(status.as_u16()),
                detail,
            });
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                detail: format!("HTTP {}: {}", status.as_u16(), detail),
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| CompletionError::Api {
            detail: format!("response body is not valid JSON: {e}"),
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Api {
                detail: "response contained no choices".into(),
            })?;

        let usage = parsed.usage.unwrap_or_default();
        debug!(
            "completion: {} prompt tokens, {} completion tokens",
            usage.prompt_tokens, usage.completion_tokens
        );

        Ok(Completion {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }
}
