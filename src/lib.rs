//! # deckscore
//!
//! Evaluate startup pitch decks with a VC-style rubric using LLMs.
//!
//! ## Why this crate?
//!
//! Scoring a pitch deck by hand means reading thirty slides and holding
//! team, business model, and traction signals in your head at once. This
//! crate automates the read: extracted slide text (and optionally rendered
//! slide images) is summarized batch by batch, each batch's summary carried
//! forward as rolling context into the next, and the combined summary is
//! scored against a fixed rubric returned as schema-constrained JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! slides
//!  │
//!  ├─ 1. Gate     authentication check + daily usage cap
//!  ├─ 2. Batch    fixed-size contiguous slide groups (default 10)
//!  ├─ 3. Summarize one LLM call per batch, previous summary as context
//!  ├─ 4. Combine  newline-join summaries in batch order
//!  ├─ 5. Score    one LLM call mandating exact rubric JSON
//!  └─ 6. Present  parsed rubric + aggregate percentage
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deckscore::{evaluate_slides, slides_from_extracted_text, EvalConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider resolved from OPENAI_API_KEY when not configured explicitly
//!     let text = std::fs::read_to_string("deck.txt")?;
//!     let slides = slides_from_extracted_text(&text);
//!     let config = EvalConfig::default();
//!     let output = evaluate_slides(slides, &config).await?;
//!     println!("score: {:.1}%", output.aggregate.percentage);
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.total_prompt_tokens,
//!         output.stats.total_completion_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `deckscore` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! deckscore = { version = "0.3", default-features = false }
//! ```
//!
//! ## Collaborator boundaries
//!
//! PDF extraction, the completion service, and the usage store are reached
//! through traits and adapters, not bundled: feed slides via
//! [`slides_from_pages`] / [`slides_from_extracted_text`], substitute the
//! model through [`CompletionProvider`], and the daily counter through
//! [`UsageGate`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod deck;
pub mod error;
pub mod evaluate;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;
pub mod prompts;
pub mod rubric;
pub mod usage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AuthPredicate, EvalConfig, EvalConfigBuilder};
pub use deck::{batch_slides, slides_from_extracted_text, slides_from_pages, Batch, Slide};
pub use error::DeckScoreError;
pub use evaluate::{evaluate_slides, evaluate_slides_sync, evaluate_text};
pub use llm::{
    ChatMessage, Completion, CompletionError, CompletionOptions, CompletionProvider, ImageData,
    OpenAiProvider, Role,
};
pub use output::{BatchSummary, EvaluationOutput, EvaluationStats};
pub use pipeline::chunk::{Chunker, TokenEncoding};
pub use present::{render_rubric_table, rubric_rows, RubricRow, ScoreColor};
pub use progress::{EvaluationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use prompts::PromptTemplates;
pub use rubric::{
    aggregate_score, combine_summaries, AggregateScore, Category, CategoryAssessment,
    LegacyRubric, RubricMetadata, RubricResult, RubricSchema, Score, ScoredRubric,
};
pub use usage::{FileUsageGate, MemoryUsageGate, UsageGate};
