//! Output types for deck evaluation.
//!
//! [`EvaluationOutput`] is what an evaluation hands back: the parsed rubric,
//! its derived aggregate, the combined summary the scoring call consumed,
//! per-batch records, and run statistics. Everything serialises to JSON so
//! the CLI's `--json` mode and any web frontend get the same structure.

use crate::rubric::{AggregateScore, ScoredRubric};
use serde::Serialize;

/// Result of evaluating one deck.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationOutput {
    /// The parsed scoring result, in whichever schema was configured.
    pub rubric: ScoredRubric,
    /// Derived total over the rubric. Computed once at parse time and handed
    /// on unaltered.
    pub aggregate: AggregateScore,
    /// All per-batch summaries newline-joined in batch order; exactly the
    /// text the scoring prompt embedded.
    pub combined_summary: String,
    /// Per-batch summarization records, in batch order.
    pub batches: Vec<BatchSummary>,
    /// Run statistics.
    pub stats: EvaluationStats,
}

/// Record of one batch's summarization call.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    /// Batch position, 0-based.
    pub index: usize,
    /// First slide index covered (0-based). For chunked text input this is
    /// the chunk index instead.
    pub first_slide: usize,
    /// Last slide index covered, inclusive.
    pub last_slide: usize,
    /// The summary the model produced for this batch.
    pub summary: String,
    /// Prompt tokens the completion call reported.
    pub prompt_tokens: usize,
    /// Completion tokens the completion call reported.
    pub completion_tokens: usize,
    /// Wall-clock time for this batch's call, including retries.
    pub duration_ms: u64,
    /// Attempts the invoker needed (1 = no retry).
    pub attempts: u32,
}

/// Statistics for one evaluation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvaluationStats {
    /// Slides in the deck (0 for single-text input).
    pub total_slides: usize,
    /// Summarization batches processed.
    pub total_batches: usize,
    /// Prompt tokens across all calls, scoring included.
    pub total_prompt_tokens: u64,
    /// Completion tokens across all calls, scoring included.
    pub total_completion_tokens: u64,
    /// Wall-clock time spent summarizing.
    pub summarize_duration_ms: u64,
    /// Wall-clock time of the scoring call.
    pub scoring_duration_ms: u64,
    /// Total wall-clock time for the evaluation.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::{aggregate_score, full_rubric, Score, ScoredRubric};

    #[test]
    fn output_serialises_to_json() {
        let rubric = full_rubric(Score::Full);
        let aggregate = aggregate_score(&rubric).unwrap();
        let output = EvaluationOutput {
            rubric: ScoredRubric::Standard(rubric),
            aggregate,
            combined_summary: "first\nsecond".into(),
            batches: vec![BatchSummary {
                index: 0,
                first_slide: 0,
                last_slide: 9,
                summary: "first".into(),
                prompt_tokens: 120,
                completion_tokens: 40,
                duration_ms: 900,
                attempts: 1,
            }],
            stats: EvaluationStats {
                total_slides: 12,
                total_batches: 2,
                ..Default::default()
            },
        };
        let json = serde_json::to_string_pretty(&output).unwrap();
        assert!(json.contains("\"percentage\": 100.0"));
        assert!(json.contains("\"combined_summary\""));
        // The untagged rubric serialises as the bare JSON object the model
        // returned, question groups at the top level.
        assert!(json.contains("\"Business Model\""));
    }
}
