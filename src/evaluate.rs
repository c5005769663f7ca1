//! Evaluation entry points.
//!
//! ## Why strictly sequential?
//!
//! Each batch's summarization prompt carries the previous batch's summary as
//! rolling context, so call `k` cannot be issued before call `k-1` has
//! returned — a genuine data dependency, not an artificial constraint. The
//! whole pipeline is therefore one logical thread per evaluation:
//!
//! ```text
//! auth → usage gate → batch → summarize (rolling context) → combine
//!      → score → parse → aggregate → record usage
//! ```
//!
//! Only the immediately preceding batch's summary is visible to the next
//! call; the context is overwritten, not accumulated. That bounds prompt
//! size as deck length grows, at the cost of losing detail from batches
//! older than one step — an explicit trade-off.

use crate::config::EvalConfig;
use crate::deck::{batch_slides, Slide};
use crate::error::DeckScoreError;
use crate::llm::{CompletionOptions, CompletionProvider, ImageData, OpenAiProvider};
use crate::output::{BatchSummary, EvaluationOutput, EvaluationStats};
use crate::pipeline::chunk::Chunker;
use crate::pipeline::invoke::{invoke, RetryPolicy};
use crate::pipeline::{encode, parse};
use crate::progress::{EvaluationProgressCallback, NoopProgressCallback};
use crate::rubric::{combine_summaries, RubricSchema, ScoredRubric};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Evaluate a deck given as extracted slides.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Every failure is terminal and user-distinguishable: access denied, usage
/// cap reached, no provider configured, retry budget exhausted, malformed
/// scoring response. Nothing is swallowed; a failed run never records usage.
pub async fn evaluate_slides(
    slides: Vec<Slide>,
    config: &EvalConfig,
) -> Result<EvaluationOutput, DeckScoreError> {
    let total_start = Instant::now();
    preflight(config)?;

    let total_slides = slides.len();
    if slides.iter().all(|s| s.text.trim().is_empty() && s.image.is_none()) {
        return Err(DeckScoreError::EmptyDeck);
    }
    info!("Evaluating deck: {} slides", total_slides);

    let provider = resolve_provider(config)?;

    // ── Batch and encode ─────────────────────────────────────────────────
    let batches = batch_slides(slides, config.batch_size);
    let mut units = Vec::with_capacity(batches.len());
    for batch in &batches {
        let mut images = Vec::new();
        for (slide_index, img) in batch.images() {
            let data =
                encode::encode_slide(img).map_err(|e| DeckScoreError::ImageEncoding {
                    slide: slide_index,
                    detail: e.to_string(),
                })?;
            images.push(data);
        }
        let (first, last) = batch.slide_range();
        units.push(SummaryUnit {
            text: batch.text(),
            images,
            first,
            last,
        });
    }
    debug!("{} slides → {} batches", total_slides, units.len());

    run_pipeline(units, total_slides, &provider, config, total_start).await
}

/// Evaluate a deck given as one blob of extracted text (non-slide-aware).
///
/// Text below the configured single-pass threshold is summarized in one
/// call; longer text is windowed by the token chunker and the same
/// rolling-context loop runs per chunk.
pub async fn evaluate_text(
    text: &str,
    config: &EvalConfig,
) -> Result<EvaluationOutput, DeckScoreError> {
    let total_start = Instant::now();
    preflight(config)?;

    if text.trim().is_empty() {
        return Err(DeckScoreError::EmptyDeck);
    }

    let provider = resolve_provider(config)?;

    let chunker = Chunker::new(config.encoding, config.max_tokens, config.overlap)?;
    let token_count = chunker.count_tokens(text);
    let chunks = if token_count < config.single_pass_token_threshold {
        vec![text.to_string()]
    } else {
        chunker.collect_chunks(text)?
    };
    info!(
        "Evaluating text: {} tokens → {} chunk(s)",
        token_count,
        chunks.len()
    );

    let units = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| SummaryUnit {
            text: chunk,
            images: Vec::new(),
            first: i,
            last: i,
        })
        .collect();

    run_pipeline(units, 0, &provider, config, total_start).await
}

/// Synchronous wrapper around [`evaluate_slides`].
///
/// Creates a temporary tokio runtime internally.
pub fn evaluate_slides_sync(
    slides: Vec<Slide>,
    config: &EvalConfig,
) -> Result<EvaluationOutput, DeckScoreError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DeckScoreError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(evaluate_slides(slides, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// One summarization call's worth of content.
struct SummaryUnit {
    text: String,
    images: Vec<ImageData>,
    first: usize,
    last: usize,
}

/// Pre-conditions checked before any external call is made.
///
/// Order matters: the authentication check runs first, then the usage gate.
/// Both stop the pipeline before a single token is spent.
fn preflight(config: &EvalConfig) -> Result<(), DeckScoreError> {
    if let Some(ref check) = config.authenticated {
        if !check() {
            return Err(DeckScoreError::AccessDenied);
        }
    }
    if let Some(ref gate) = config.usage_gate {
        let used = gate
            .usage_today()
            .map_err(|source| DeckScoreError::UsageGate { source })?;
        if used >= config.daily_cap {
            return Err(DeckScoreError::UsageLimitExceeded {
                used,
                cap: config.daily_cap,
            });
        }
        debug!("usage gate: {}/{} today", used, config.daily_cap);
    }
    Ok(())
}

/// Resolve the completion provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — the caller constructed
///    and configured the provider entirely; we use it as-is.
/// 2. **Explicit API key** (`config.api_key`) — build the bundled
///    OpenAI-compatible provider with the configured model and base URL.
/// 3. **`OPENAI_API_KEY` environment variable** — same, keyed from the
///    execution environment.
fn resolve_provider(config: &EvalConfig) -> Result<Arc<dyn CompletionProvider>, DeckScoreError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let key = config
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
        .ok_or_else(|| DeckScoreError::ProviderNotConfigured {
            hint: "Set OPENAI_API_KEY, configure api_key, or inject a provider.".into(),
        })?;

    let mut provider = OpenAiProvider::new(key, config.model.clone())
        .with_timeout(Duration::from_secs(config.api_timeout_secs));
    if let Some(ref base_url) = config.base_url {
        provider = provider.with_base_url(base_url.clone());
    }
    Ok(Arc::new(provider))
}

/// The sequential summarize-then-score walk shared by both entry points.
async fn run_pipeline(
    units: Vec<SummaryUnit>,
    total_slides: usize,
    provider: &Arc<dyn CompletionProvider>,
    config: &EvalConfig,
    total_start: Instant,
) -> Result<EvaluationOutput, DeckScoreError> {
    let noop = NoopProgressCallback;
    let progress: &dyn EvaluationProgressCallback = config
        .progress_callback
        .as_deref()
        .unwrap_or(&noop);

    let retry = RetryPolicy {
        max_attempts: config.max_retries,
        backoff_ms: config.retry_backoff_ms,
    };
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: config.completion_max_tokens,
    };

    let total_batches = units.len();
    progress.on_evaluation_start(total_batches);

    // ── Summarize, threading the rolling context ─────────────────────────
    let summarize_start = Instant::now();
    let mut batches: Vec<BatchSummary> = Vec::with_capacity(total_batches);
    let mut context = String::new();
    for (index, unit) in units.into_iter().enumerate() {
        progress.on_batch_start(index, total_batches);
        let batch_start = Instant::now();

        let messages =
            config
                .templates
                .build_summary_request(&unit.text, unit.images, &context);
        let invocation = invoke(provider, &messages, &options, &retry, progress).await?;
        let summary = invocation.completion.content;

        debug!(
            "batch {}/{}: {} chars, attempt(s) {}",
            index + 1,
            total_batches,
            summary.len(),
            invocation.attempts
        );
        progress.on_batch_complete(index, total_batches, summary.len());

        batches.push(BatchSummary {
            index,
            first_slide: unit.first,
            last_slide: unit.last,
            summary: summary.clone(),
            prompt_tokens: invocation.completion.prompt_tokens,
            completion_tokens: invocation.completion.completion_tokens,
            duration_ms: batch_start.elapsed().as_millis() as u64,
            attempts: invocation.attempts,
        });
        // Overwrite, never accumulate: only the immediately preceding
        // batch's summary is visible to the next call.
        context = summary;
    }
    let summarize_duration_ms = summarize_start.elapsed().as_millis() as u64;

    // ── Score ────────────────────────────────────────────────────────────
    let summaries: Vec<String> = batches.iter().map(|b| b.summary.clone()).collect();
    let combined_summary = combine_summaries(&summaries);

    progress.on_scoring_start();
    let scoring_start = Instant::now();
    let messages = config.templates.build_scoring_request(&combined_summary);
    let invocation = invoke(provider, &messages, &options, &retry, progress).await?;
    let scoring_duration_ms = scoring_start.elapsed().as_millis() as u64;

    let rubric = match config.rubric_schema {
        RubricSchema::FourGroup => {
            ScoredRubric::Standard(parse::parse_rubric(&invocation.completion.content)?)
        }
        RubricSchema::LegacyThreeGroup => {
            ScoredRubric::Legacy(parse::parse_legacy_rubric(&invocation.completion.content)?)
        }
    };
    // Parse-time validation guarantees at least one question group.
    let aggregate = rubric
        .aggregate()
        .ok_or_else(|| DeckScoreError::Internal("parsed rubric has no question groups".into()))?;

    // ── Record usage, exactly once, only now that everything succeeded ───
    if let Some(ref gate) = config.usage_gate {
        gate.record_usage()
            .map_err(|source| DeckScoreError::UsageGate { source })?;
    }

    let stats = EvaluationStats {
        total_slides,
        total_batches,
        total_prompt_tokens: batches.iter().map(|b| b.prompt_tokens as u64).sum::<u64>()
            + invocation.completion.prompt_tokens as u64,
        total_completion_tokens: batches
            .iter()
            .map(|b| b.completion_tokens as u64)
            .sum::<u64>()
            + invocation.completion.completion_tokens as u64,
        summarize_duration_ms,
        scoring_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Evaluation complete: {} batches, {:.1}% in {}ms",
        total_batches, aggregate.percentage, stats.total_duration_ms
    );
    progress.on_evaluation_complete(total_batches, aggregate.percentage);

    Ok(EvaluationOutput {
        rubric,
        aggregate,
        combined_summary,
        batches,
        stats,
    })
}
