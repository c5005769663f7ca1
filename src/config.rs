//! Configuration types for deck evaluation.
//!
//! All evaluation behaviour is controlled through [`EvalConfig`], built via
//! its [`EvalConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across threads and to diff two runs to
//! understand why their scores differ.
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder pattern lets callers set only what they care about and rely
//! on well-documented defaults for the rest.
//!
//! Credentials and the authentication check are explicit fields here rather
//! than ambient globals, so the pipeline is testable without any UI session
//! behind it.

use crate::error::DeckScoreError;
use crate::llm::CompletionProvider;
use crate::pipeline::chunk::TokenEncoding;
use crate::progress::ProgressCallback;
use crate::prompts::PromptTemplates;
use crate::rubric::RubricSchema;
use crate::usage::UsageGate;
use std::fmt;
use std::sync::Arc;

/// Authentication check run before any work starts. Returning `false` stops
/// the evaluation with [`DeckScoreError::AccessDenied`].
pub type AuthPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Configuration for one deck evaluation pipeline.
///
/// Built via [`EvalConfig::builder()`] or using [`EvalConfig::default()`].
///
/// # Example
/// ```rust
/// use deckscore::EvalConfig;
///
/// let config = EvalConfig::builder()
///     .batch_size(10)
///     .model("gpt-4o")
///     .max_retries(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct EvalConfig {
    /// Slides per summarization batch. Default: 10.
    ///
    /// Ten slides fit comfortably in one prompt for typical deck text while
    /// keeping the number of completion calls (and their cost) low. Shrink
    /// it for decks with very dense per-slide text.
    pub batch_size: usize,

    /// Maximum tokens per chunk window in single-text mode. Default: 3000.
    ///
    /// Measured in tokenizer units, not characters, because the completion
    /// API budgets in tokens. Only used when the input arrives as one blob
    /// of text rather than per-slide.
    pub max_tokens: usize,

    /// Token overlap between consecutive chunk windows. Default: 300.
    ///
    /// Facts that straddle a window boundary appear whole in at least one
    /// window. Must be strictly less than `max_tokens`; the window would
    /// never advance otherwise, and [`EvalConfigBuilder::build`] rejects it.
    pub overlap: usize,

    /// Token count below which single-text input is summarized in one call
    /// instead of being chunked. Default: 6000.
    pub single_pass_token_threshold: usize,

    /// Tokenizer encoding for chunk windows. Default: `o200k_base`.
    pub encoding: TokenEncoding,

    /// Completion model identifier. Default: "gpt-4o".
    pub model: String,

    /// Sampling temperature for completion calls. Default: 0.3.
    ///
    /// Low temperature keeps summaries factual and the scoring JSON shaped
    /// as instructed; higher values buy nothing here but schema drift.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. None = provider default.
    pub completion_max_tokens: Option<usize>,

    /// Total attempts per completion call, including the first. Default: 3.
    ///
    /// Rate limits and 5xx errors are retried with exponential backoff;
    /// permanent errors (bad key, 400) are never retried and surface as
    /// [`DeckScoreError::LlmApi`] immediately.
    pub max_retries: u32,

    /// Backoff before the second attempt, in milliseconds. Default: 2000.
    ///
    /// Doubles after each attempt: 2 s → 4 s → 8 s.
    pub retry_backoff_ms: u64,

    /// Daily evaluation cap enforced when a usage gate is installed.
    /// Default: 5.
    pub daily_cap: u32,

    /// Usage gate consulted before work starts and incremented once per
    /// successful evaluation. None = no cap.
    pub usage_gate: Option<Arc<dyn UsageGate>>,

    /// API key for the bundled OpenAI-compatible provider. Falls back to the
    /// `OPENAI_API_KEY` environment variable when unset.
    pub api_key: Option<String>,

    /// Base URL for the bundled provider (Azure gateways, local servers).
    /// None = the OpenAI default.
    pub base_url: Option<String>,

    /// Pre-constructed completion provider. Takes precedence over
    /// `api_key`/`base_url`. Useful in tests or when the caller needs custom
    /// middleware (caching, rate-limiting).
    pub provider: Option<Arc<dyn CompletionProvider>>,

    /// Prompt templates. Defaults follow `rubric_schema`.
    pub templates: PromptTemplates,

    /// Which scoring schema the model is asked for and the parser accepts.
    /// Default: the four-group discrete rubric.
    pub rubric_schema: RubricSchema,

    /// Authentication check run before any work. None = no check.
    pub authenticated: Option<AuthPredicate>,

    /// Progress callback for batch/retry/scoring events.
    pub progress_callback: Option<ProgressCallback>,

    /// Per-completion-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_tokens: 3000,
            overlap: 300,
            single_pass_token_threshold: 6000,
            encoding: TokenEncoding::default(),
            model: "gpt-4o".to_string(),
            temperature: 0.3,
            completion_max_tokens: None,
            max_retries: 3,
            retry_backoff_ms: 2000,
            daily_cap: 5,
            usage_gate: None,
            api_key: None,
            base_url: None,
            provider: None,
            templates: PromptTemplates::default(),
            rubric_schema: RubricSchema::default(),
            authenticated: None,
            progress_callback: None,
            api_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for EvalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvalConfig")
            .field("batch_size", &self.batch_size)
            .field("max_tokens", &self.max_tokens)
            .field("overlap", &self.overlap)
            .field(
                "single_pass_token_threshold",
                &self.single_pass_token_threshold,
            )
            .field("encoding", &self.encoding)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("completion_max_tokens", &self.completion_max_tokens)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("daily_cap", &self.daily_cap)
            .field("usage_gate", &self.usage_gate.as_ref().map(|_| "<dyn UsageGate>"))
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field(
                "provider",
                &self.provider.as_ref().map(|p| p.name().to_string()),
            )
            .field("rubric_schema", &self.rubric_schema)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl EvalConfig {
    /// Create a new builder for `EvalConfig`.
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder {
            config: Self::default(),
            templates: None,
        }
    }
}

/// Builder for [`EvalConfig`].
#[derive(Debug)]
pub struct EvalConfigBuilder {
    config: EvalConfig,
    /// Explicitly supplied templates; when absent, `build` picks the
    /// built-in set matching the configured rubric schema.
    templates: Option<PromptTemplates>,
}

impl EvalConfigBuilder {
    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn overlap(mut self, n: usize) -> Self {
        self.config.overlap = n;
        self
    }

    pub fn single_pass_token_threshold(mut self, n: usize) -> Self {
        self.config.single_pass_token_threshold = n;
        self
    }

    pub fn encoding(mut self, encoding: TokenEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn completion_max_tokens(mut self, n: usize) -> Self {
        self.config.completion_max_tokens = Some(n);
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn daily_cap(mut self, cap: u32) -> Self {
        self.config.daily_cap = cap;
        self
    }

    pub fn usage_gate(mut self, gate: Arc<dyn UsageGate>) -> Self {
        self.config.usage_gate = Some(gate);
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn rubric_schema(mut self, schema: RubricSchema) -> Self {
        self.config.rubric_schema = schema;
        self
    }

    pub fn authenticated(mut self, check: AuthPredicate) -> Self {
        self.config.authenticated = Some(check);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EvalConfig, DeckScoreError> {
        let mut config = self.config;
        if config.batch_size == 0 {
            return Err(DeckScoreError::InvalidConfig(
                "batch_size must be >= 1".into(),
            ));
        }
        if config.max_retries == 0 {
            return Err(DeckScoreError::InvalidConfig(
                "max_retries must be >= 1".into(),
            ));
        }
        if config.max_tokens == 0 {
            return Err(DeckScoreError::InvalidConfig(
                "chunk max_tokens must be >= 1".into(),
            ));
        }
        if config.overlap >= config.max_tokens {
            return Err(DeckScoreError::InvalidConfig(format!(
                "chunk overlap ({}) must be less than max_tokens ({})",
                config.overlap, config.max_tokens
            )));
        }
        config.templates = match self.templates {
            Some(templates) => {
                templates.validate()?;
                templates
            }
            None => PromptTemplates::for_schema(config.rubric_schema),
        };
        Ok(config)
    }
}
