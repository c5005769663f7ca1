//! The completion capability consumed by the pipeline.
//!
//! The pipeline never talks to a vendor SDK directly. It depends on the
//! [`CompletionProvider`] trait: an ordered message sequence plus options in,
//! generated text plus token usage out, with failures classified into exactly
//! three groups ([`CompletionError`]). The retry loop in
//! [`crate::pipeline::invoke`] keys off that classification: rate limits and
//! transient service errors are retried with backoff, anything else
//! propagates immediately.
//!
//! [`openai::OpenAiProvider`] is the bundled implementation for
//! OpenAI-compatible `/chat/completions` endpoints. Tests substitute scripted
//! fakes through the same trait.

pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiProvider;

/// A base64-encoded raster attached to a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Base64 payload (no data-URI prefix).
    pub data: String,
    /// Media type, e.g. `image/png`.
    pub mime_type: String,
    /// Optional detail hint for tiling vision models (`"high"` / `"low"`).
    pub detail: Option<String>,
}

impl ImageData {
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Render as a `data:` URI for JSON request bodies.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Conversation role. The order of roles in a request is significant: the
/// model receives the sequence as a strict conversation, not a bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn in the request conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Images attached to this turn (user turns only in practice).
    pub images: Vec<ImageData>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(content: impl Into<String>, images: Vec<ImageData>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
        }
    }
}

/// Sampling options forwarded to the completion endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// A successful completion with token accounting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// Failure classes of the completion capability.
///
/// The three-way split is the collaborator contract: the invoker retries
/// `RateLimited` and `Transient`, and propagates `Api` untouched.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// HTTP 429 or an equivalent throttle signal.
    #[error("rate limited by the completion service")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Overloaded backend, gateway error, or network timeout. Worth retrying.
    #[error("transient service error: {detail}")]
    Transient {
        status: Option<u16>,
        detail: String,
    },

    /// Anything else (bad request, auth failure, content filter). Retrying
    /// will not help.
    #[error("{detail}")]
    Api { detail: String },
}

impl CompletionError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CompletionError::RateLimited { .. } | CompletionError::Transient { .. }
        )
    }
}

/// The external completion capability.
///
/// Implementations must be side-effect free beyond the network call itself so
/// the invoker can call them repeatedly during retry.
#[async_trait]
pub trait CompletionProvider: Send + Sync + std::fmt::Debug {
    /// Short provider name for log lines and error messages.
    fn name(&self) -> &str;

    /// Execute one completion request.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, CompletionError>;
}
