//! End-to-end integration tests for deckscore.
//!
//! The completion capability is substituted with scripted in-memory
//! providers, so every test runs offline and deterministically: summary
//! calls return numbered summaries, the scoring call returns canned rubric
//! JSON, and every request the pipeline issued is recorded for inspection.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use async_trait::async_trait;
use deckscore::{
    evaluate_slides, evaluate_text, ChatMessage, Completion, CompletionError, CompletionOptions,
    CompletionProvider, DeckScoreError, EvalConfig, MemoryUsageGate, Role, RubricSchema,
    ScoredRubric, Slide, UsageGate,
};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Scripted completion provider: numbered summaries for summarization
/// requests, a fixed response for the scoring request, every request
/// recorded.
#[derive(Debug)]
struct ScriptedProvider {
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    summaries_served: AtomicU32,
    scoring_response: String,
}

impl ScriptedProvider {
    fn new(scoring_response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            summaries_served: AtomicU32::new(0),
            scoring_response: scoring_response.into(),
        })
    }

    fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }

    fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

fn is_scoring_request(messages: &[ChatMessage]) -> bool {
    messages
        .iter()
        .any(|m| m.content.contains("Score this startup"))
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        let content = if is_scoring_request(messages) {
            self.scoring_response.clone()
        } else {
            let n = self.summaries_served.fetch_add(1, Ordering::SeqCst) + 1;
            format!("Batch summary {n}")
        };
        Ok(Completion {
            content,
            prompt_tokens: 100,
            completion_tokens: 20,
        })
    }
}

/// A provider that always reports a rate limit.
#[derive(Debug)]
struct RateLimitedProvider {
    calls: AtomicU32,
}

#[async_trait]
impl CompletionProvider for RateLimitedProvider {
    fn name(&self) -> &str {
        "rate-limited"
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> Result<Completion, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CompletionError::RateLimited {
            retry_after_secs: None,
        })
    }
}

/// Canonical rubric JSON: group "1" all 1s, group "2" all 0.5s, groups
/// "3" and "4" all 0s. Total 4.5 of 12.
fn mixed_rubric_json() -> String {
    let group = |score: f64| {
        json!({
            "Team": {"score": score, "rationale": "team note"},
            "Business Model": {"score": score, "rationale": "model note"},
            "Traction": {"score": score, "rationale": "traction note"},
        })
    };
    json!({
        "1": group(1.0),
        "2": group(0.5),
        "3": group(0.0),
        "4": group(0.0),
        "vc_stage": "Seed",
        "region": "Europe",
        "industry": "Fintech",
    })
    .to_string()
}

/// Canonical rubric JSON with every score 1.
fn full_marks_rubric_json() -> String {
    let group = json!({
        "Team": {"score": 1, "rationale": "strong"},
        "Business Model": {"score": 1, "rationale": "scalable"},
        "Traction": {"score": 1, "rationale": "growing"},
    });
    json!({"1": group, "2": group, "3": group, "4": group}).to_string()
}

fn deck(n: usize) -> Vec<Slide> {
    (0..n)
        .map(|i| Slide::text_only(i, format!("Slide {i}: metrics and milestones")))
        .collect()
}

fn config_with(provider: Arc<dyn CompletionProvider>) -> EvalConfig {
    EvalConfig::builder()
        .provider(provider)
        .retry_backoff_ms(1)
        .build()
        .expect("valid config")
}

// ── End-to-end scenario ──────────────────────────────────────────────────────

/// The canonical 12-slide scenario: batch size 10 → batches of 10 and 2,
/// the second batch's prompt carries the first batch's summary, the
/// combined summary is the two newline-joined, and the aggregate reaches
/// presentation unaltered.
#[tokio::test]
async fn twelve_slide_deck_two_batches() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let gate = Arc::new(MemoryUsageGate::new());
    let config = EvalConfig::builder()
        .provider(provider.clone())
        .usage_gate(gate.clone())
        .retry_backoff_ms(1)
        .build()
        .expect("valid config");

    let output = evaluate_slides(deck(12), &config)
        .await
        .expect("evaluation should succeed");

    // Batching: 10 + 2, original order.
    assert_eq!(output.batches.len(), 2);
    assert_eq!(output.batches[0].first_slide, 0);
    assert_eq!(output.batches[0].last_slide, 9);
    assert_eq!(output.batches[1].first_slide, 10);
    assert_eq!(output.batches[1].last_slide, 11);

    // 2 summary calls + 1 scoring call.
    let requests = provider.requests();
    assert_eq!(requests.len(), 3);

    // First batch has no prior context: no assistant turn.
    assert!(requests[0].iter().all(|m| m.role != Role::Assistant));

    // Second batch carries the first summary as an assistant turn.
    let assistant_turns: Vec<&ChatMessage> = requests[1]
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(assistant_turns.len(), 1);
    assert_eq!(assistant_turns[0].content, "Batch summary 1");

    // Combined summary is the two batch summaries newline-joined, and the
    // scoring prompt embeds it verbatim.
    assert_eq!(output.combined_summary, "Batch summary 1\nBatch summary 2");
    assert!(requests[2]
        .iter()
        .any(|m| m.content.contains("Batch summary 1\nBatch summary 2")));

    // Aggregate handed on unaltered: 12/12 = 100%.
    assert_eq!(output.aggregate.total, 12.0);
    assert_eq!(output.aggregate.max_total, 12.0);
    assert_eq!(output.aggregate.percentage, 100.0);
    assert_eq!(output.stats.total_slides, 12);
    assert_eq!(output.stats.total_batches, 2);

    // Exactly one usage unit recorded for the completed evaluation.
    assert_eq!(gate.count(), 1);
}

/// The rolling context is one step deep: batch k's prompt contains batch
/// k-1's summary and nothing older.
#[tokio::test]
async fn context_carries_exactly_one_step() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let config = config_with(provider.clone());

    evaluate_slides(deck(25), &config)
        .await
        .expect("evaluation should succeed");

    let requests = provider.requests();
    // 3 batches of 10/10/5, then scoring.
    assert_eq!(requests.len(), 4);

    let third_batch = &requests[2];
    let assistant_turns: Vec<&ChatMessage> = third_batch
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();
    assert_eq!(assistant_turns.len(), 1);
    assert_eq!(assistant_turns[0].content, "Batch summary 2");
    assert!(
        third_batch.iter().all(|m| m.content != "Batch summary 1"),
        "batch 3's prompt must not carry batch 1's summary"
    );
}

#[tokio::test]
async fn mixed_scores_aggregate_exactly() {
    let provider = ScriptedProvider::new(mixed_rubric_json());
    let config = config_with(provider);

    let output = evaluate_slides(deck(3), &config)
        .await
        .expect("evaluation should succeed");

    assert_eq!(output.aggregate.total, 4.5);
    assert_eq!(output.aggregate.max_total, 12.0);
    assert_eq!(output.aggregate.percentage, 100.0 * 4.5 / 12.0);

    let rubric = output.rubric.as_standard().expect("standard schema");
    assert_eq!(rubric.metadata.vc_stage.as_deref(), Some("Seed"));
    assert_eq!(rubric.metadata.industry.as_deref(), Some("Fintech"));
}

/// The scoring prompt forbids fences; the parser tolerates one anyway.
#[tokio::test]
async fn fenced_scoring_response_is_accepted() {
    let fenced = format!("```json\n{}\n```", full_marks_rubric_json());
    let provider = ScriptedProvider::new(fenced);
    let config = config_with(provider);

    let output = evaluate_slides(deck(2), &config)
        .await
        .expect("fenced rubric should parse");
    assert_eq!(output.aggregate.percentage, 100.0);
}

// ── Usage gate ───────────────────────────────────────────────────────────────

/// Once the cap is reached, no completion call is issued and nothing is
/// recorded.
#[tokio::test]
async fn usage_cap_blocks_before_any_call() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let gate = Arc::new(MemoryUsageGate::new());
    for _ in 0..3 {
        gate.record_usage().unwrap();
    }
    let config = EvalConfig::builder()
        .provider(provider.clone())
        .usage_gate(gate.clone())
        .daily_cap(3)
        .build()
        .expect("valid config");

    let err = evaluate_slides(deck(12), &config).await.unwrap_err();
    assert!(matches!(
        err,
        DeckScoreError::UsageLimitExceeded { used: 3, cap: 3 }
    ));
    assert_eq!(provider.request_count(), 0);
    assert_eq!(gate.count(), 3, "a refused run must not be recorded");
}

/// A failed evaluation never counts against the cap.
#[tokio::test]
async fn failed_scoring_records_no_usage() {
    let provider = ScriptedProvider::new("I'm sorry, I cannot score this deck.");
    let gate = Arc::new(MemoryUsageGate::new());
    let config = EvalConfig::builder()
        .provider(provider)
        .usage_gate(gate.clone())
        .retry_backoff_ms(1)
        .build()
        .expect("valid config");

    let err = evaluate_slides(deck(4), &config).await.unwrap_err();
    match err {
        DeckScoreError::MalformedResponse { raw, .. } => {
            assert!(raw.contains("cannot score"), "raw text kept for diagnosis");
        }
        other => panic!("expected MalformedResponse, got {other:?}"),
    }
    assert_eq!(gate.count(), 0);
}

// ── Access and retry failure paths ───────────────────────────────────────────

#[tokio::test]
async fn unauthenticated_request_is_refused() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let config = EvalConfig::builder()
        .provider(provider.clone())
        .authenticated(Arc::new(|| false))
        .build()
        .expect("valid config");

    let err = evaluate_slides(deck(2), &config).await.unwrap_err();
    assert!(matches!(err, DeckScoreError::AccessDenied));
    assert_eq!(provider.request_count(), 0);
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_retry_budget() {
    let provider = Arc::new(RateLimitedProvider {
        calls: AtomicU32::new(0),
    });
    let gate = Arc::new(MemoryUsageGate::new());
    let config = EvalConfig::builder()
        .provider(provider.clone())
        .usage_gate(gate.clone())
        .max_retries(3)
        .retry_backoff_ms(1)
        .build()
        .expect("valid config");

    let err = evaluate_slides(deck(2), &config).await.unwrap_err();
    assert!(matches!(
        err,
        DeckScoreError::RateLimitExceeded { attempts: 3 }
    ));
    // The first batch call burned the whole budget; nothing after it ran.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert_eq!(gate.count(), 0);
}

#[tokio::test]
async fn empty_deck_is_refused_before_any_call() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let config = config_with(provider.clone());

    let slides = vec![Slide::text_only(0, "  "), Slide::text_only(1, "")];
    let err = evaluate_slides(slides, &config).await.unwrap_err();
    assert!(matches!(err, DeckScoreError::EmptyDeck));
    assert_eq!(provider.request_count(), 0);
}

// ── Alternate schemas and input modes ────────────────────────────────────────

#[tokio::test]
async fn legacy_schema_parses_float_rubric() {
    let legacy = json!({
        "team": {"1": 1.0, "2": 0.5, "3": 0.0},
        "business_model": {"1": 0.8, "2": 0.2, "3": 1.0},
        "traction": {"1": 0.0, "2": 0.3, "3": 0.6},
        "total_score": 4.4,
        "rationale": "solid team, early traction"
    })
    .to_string();
    let provider = ScriptedProvider::new(legacy);
    let config = EvalConfig::builder()
        .provider(provider.clone())
        .rubric_schema(RubricSchema::LegacyThreeGroup)
        .retry_backoff_ms(1)
        .build()
        .expect("valid config");

    let output = evaluate_slides(deck(2), &config)
        .await
        .expect("legacy rubric should parse");

    match output.rubric {
        ScoredRubric::Legacy(ref legacy) => {
            assert_eq!(legacy.leaf_count(), 9);
            assert_eq!(
                legacy.rationale.as_deref(),
                Some("solid team, early traction")
            );
        }
        ScoredRubric::Standard(_) => panic!("expected legacy schema"),
    }
    assert_eq!(output.aggregate.max_total, 9.0);
    // The legacy prompt must have been used for the scoring call.
    let scoring = provider.requests().pop().unwrap();
    assert!(scoring.iter().any(|m| m.content.contains("business_model")));
}

/// Short single-text input summarizes in one pass: one summary call plus
/// the scoring call.
#[tokio::test]
async fn short_text_is_single_pass() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let config = config_with(provider.clone());

    let output = evaluate_text(
        "A two-founder fintech startup with 40 pilot customers and 20% m/m growth.",
        &config,
    )
    .await
    .expect("evaluation should succeed");

    assert_eq!(provider.request_count(), 2);
    assert_eq!(output.stats.total_batches, 1);
    assert_eq!(output.combined_summary, "Batch summary 1");
}

/// Long single-text input is windowed by the token chunker and walks the
/// same rolling-context loop.
#[tokio::test]
async fn long_text_is_chunked_with_rolling_context() {
    let provider = ScriptedProvider::new(full_marks_rubric_json());
    let config = EvalConfig::builder()
        .provider(provider.clone())
        .single_pass_token_threshold(40)
        .max_tokens(32)
        .overlap(4)
        .retry_backoff_ms(1)
        .build()
        .expect("valid config");

    let text = "the quick brown fox jumps over the lazy dog ".repeat(20);
    let output = evaluate_text(&text, &config)
        .await
        .expect("evaluation should succeed");

    assert!(output.stats.total_batches > 1, "text must have been chunked");
    let requests = provider.requests();
    // Second chunk's request carries the first chunk's summary.
    let second = &requests[1];
    assert!(second
        .iter()
        .any(|m| m.role == Role::Assistant && m.content == "Batch summary 1"));
}
