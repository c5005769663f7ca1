//! Error types for the deckscore library.
//!
//! Every fatal condition maps to its own [`DeckScoreError`] variant with a
//! distinct, user-facing message, so a caller can tell "try again later"
//! (rate limits, usage caps) apart from "this deck could not be read"
//! (encoding failures, malformed scoring output) without string-matching.
//!
//! Transient completion failures live in [`crate::llm::CompletionError`] and
//! are consumed by the retry loop in [`crate::pipeline::invoke`]; only after
//! the retry budget is exhausted do they surface here as
//! [`DeckScoreError::RateLimitExceeded`].

use thiserror::Error;

/// All fatal errors returned by the deckscore library.
///
/// Nothing in the pipeline swallows one of these: each variant bubbles to the
/// top-level `evaluate*` call unchanged.
#[derive(Debug, Error)]
pub enum DeckScoreError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or chunker validation failed. Never retried.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// The deck text could not be tokenized or detokenized by the configured
    /// encoding scheme.
    #[error("Deck text could not be encoded: {detail}")]
    Encoding { detail: String },

    /// The deck yielded no slides with any readable text.
    #[error("The deck contains no readable slides.\nCheck that text extraction produced at least one non-empty page.")]
    EmptyDeck,

    // ── Access / usage errors ─────────────────────────────────────────────
    /// The injected authentication check rejected this request.
    #[error("Access denied: authentication is required before evaluating a deck.")]
    AccessDenied,

    /// The daily usage cap was already reached before any model call was made.
    #[error("Daily usage limit reached ({used}/{cap} evaluations today).\nPlease try again tomorrow.")]
    UsageLimitExceeded { used: u32, cap: u32 },

    /// The usage counter store could not be read or updated.
    #[error("Failed to access the usage counter: {source}")]
    UsageGate {
        #[source]
        source: std::io::Error,
    },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// No completion provider could be resolved (missing API key etc.).
    #[error("No completion provider is configured.\n{hint}")]
    ProviderNotConfigured { hint: String },

    /// The completion API returned a non-retryable error.
    #[error("Completion API error: {message}")]
    LlmApi { message: String },

    /// Transient failures exhausted the retry budget. Terminal.
    #[error("Rate limit still exceeded after {attempts} attempts.\nPlease try again later.")]
    RateLimitExceeded { attempts: u32 },

    /// A slide image could not be encoded for the API request body.
    #[error("Failed to encode slide {slide} image: {detail}")]
    ImageEncoding { slide: usize, detail: String },

    // ── Scoring errors ────────────────────────────────────────────────────
    /// The scoring response is not a valid rubric. The raw model text is
    /// preserved so the user can diagnose what came back; it is never
    /// coerced into default scores.
    #[error("The scoring response is not a valid rubric: {detail}\nRaw response:\n{raw}")]
    MalformedResponse { detail: String, raw: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_limit_display() {
        let e = DeckScoreError::UsageLimitExceeded { used: 5, cap: 5 };
        let msg = e.to_string();
        assert!(msg.contains("5/5"), "got: {msg}");
        assert!(msg.contains("tomorrow"));
    }

    #[test]
    fn rate_limit_display() {
        let e = DeckScoreError::RateLimitExceeded { attempts: 3 };
        assert!(e.to_string().contains("3 attempts"));
    }

    #[test]
    fn malformed_response_keeps_raw_text() {
        let e = DeckScoreError::MalformedResponse {
            detail: "missing question group \"4\"".into(),
            raw: "{\"1\": {}}".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("missing question group"));
        assert!(msg.contains("{\"1\": {}}"));
    }

    #[test]
    fn distinct_messages_per_class() {
        let rate = DeckScoreError::RateLimitExceeded { attempts: 3 }.to_string();
        let cap = DeckScoreError::UsageLimitExceeded { used: 5, cap: 5 }.to_string();
        let enc = DeckScoreError::Encoding {
            detail: "bad token run".into(),
        }
        .to_string();
        assert_ne!(rate, cap);
        assert_ne!(cap, enc);
        assert_ne!(rate, enc);
    }
}
