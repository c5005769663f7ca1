//! Prompt templates and request assembly.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the rubric wording lives in exactly one
//!    place instead of being copy-pasted into each call site.
//!
//! 2. **Testability** — unit tests can inspect the assembled message
//!    sequences without a live model behind them.
//!
//! The exact wording is configuration: callers can swap in their own
//! [`PromptTemplates`]. What the pipeline does depend on is structural — the
//! scoring template must contain the `{summary}` substitution point, and the
//! shape it mandates must match what [`crate::pipeline::parse`] validates.
//! [`PromptTemplates::validate`] enforces the former at configuration time.

use crate::error::DeckScoreError;
use crate::llm::{ChatMessage, ImageData};
use crate::rubric::RubricSchema;

/// Substitution point the scoring template must contain.
pub const SUMMARY_PLACEHOLDER: &str = "{summary}";

/// System role for batch summarization calls.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a VC investment analyst.";

/// Instruction preceding each batch's slide text.
pub const SUMMARY_INSTRUCTION: &str = "\
Read the following section from a startup pitch deck and summarize key \
information related to the team, traction, and business model. Keep concrete \
facts: names, roles, metrics, customer counts, revenue figures, growth rates. \
If earlier context is provided, continue from it without repeating it.";

/// System role for the scoring call.
pub const SCORING_SYSTEM_PROMPT: &str = "You are a VC analyst.";

/// Canonical scoring template: four question groups, three categories each,
/// discrete scores, optional inferred metadata.
pub const SCORING_TEMPLATE: &str = r#"Score this startup based on the following rubric.

Question groups:
1. Founding team: relevant experience, prior collaboration, founder track record.
2. Business model: scalability, upsell potential, resilience to external shocks.
3. Traction: initial customers, growth rate, customer retention.
4. Stage fit: how investable the company looks at its apparent stage.

For every question group, assess each of the three categories "Team",
"Business Model" and "Traction". Assign a score of exactly 0, 0.5 or 1 and a
one-sentence rationale for each.

Return output in exactly this JSON shape:
{
    "1": {"Team": {"score": _, "rationale": "..."}, "Business Model": {"score": _, "rationale": "..."}, "Traction": {"score": _, "rationale": "..."}},
    "2": {"Team": {"score": _, "rationale": "..."}, "Business Model": {"score": _, "rationale": "..."}, "Traction": {"score": _, "rationale": "..."}},
    "3": {"Team": {"score": _, "rationale": "..."}, "Business Model": {"score": _, "rationale": "..."}, "Traction": {"score": _, "rationale": "..."}},
    "4": {"Team": {"score": _, "rationale": "..."}, "Business Model": {"score": _, "rationale": "..."}, "Traction": {"score": _, "rationale": "..."}},
    "vc_stage": "...",
    "region": "...",
    "industry": "..."
}

Do not wrap the JSON in markdown fences. Do not add any text outside the JSON.

Startup deck summary:
{summary}"#;

/// Older scoring template: three float-scored question maps.
pub const LEGACY_SCORING_TEMPLATE: &str = r#"Score this startup based on the following rubric:

TEAM:
1. Relevant experience?
2. Worked together before?
3. Previous founder?

BUSINESS MODEL:
1. Scalable?
2. Upsell potential?
3. Resilient to external shocks?

TRACTION:
1. Initial customers?
2. Rapid growth?
3. Customer retention?

Give a score for each question between 0 and 1.
Return output in this format:
{
    "team": {"1": _, "2": _, "3": _},
    "business_model": {"1": _, "2": _, "3": _},
    "traction": {"1": _, "2": _, "3": _},
    "total_score": _,
    "rationale": "Your explanation..."
}

Do not wrap the JSON in markdown fences.

Startup deck summary:
{summary}"#;

/// The prompt text consumed by the pipeline.
///
/// Loaded as opaque strings; only the `{summary}` substitution point and the
/// mandated output shape are contractual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub summary_system: String,
    pub summary_instruction: String,
    pub scoring_system: String,
    pub scoring_template: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::for_schema(RubricSchema::FourGroup)
    }
}

impl PromptTemplates {
    /// Built-in templates matching the given rubric schema.
    pub fn for_schema(schema: RubricSchema) -> Self {
        let scoring_template = match schema {
            RubricSchema::FourGroup => SCORING_TEMPLATE,
            RubricSchema::LegacyThreeGroup => LEGACY_SCORING_TEMPLATE,
        };
        Self {
            summary_system: SUMMARY_SYSTEM_PROMPT.to_string(),
            summary_instruction: SUMMARY_INSTRUCTION.to_string(),
            scoring_system: SCORING_SYSTEM_PROMPT.to_string(),
            scoring_template: scoring_template.to_string(),
        }
    }

    /// Check the structural contract with externally supplied templates.
    pub fn validate(&self) -> Result<(), DeckScoreError> {
        if !self.scoring_template.contains(SUMMARY_PLACEHOLDER) {
            return Err(DeckScoreError::InvalidConfig(format!(
                "scoring template must contain the {SUMMARY_PLACEHOLDER} substitution point"
            )));
        }
        Ok(())
    }

    /// Assemble the message sequence for one batch summarization call.
    ///
    /// Ordering is significant and fixed: role instruction, rubric guidance,
    /// prior context (only when non-empty), then the current batch content.
    /// The previous batch's summary is threaded as an assistant turn — that
    /// is the whole cross-batch memory mechanism; no session persists between
    /// calls.
    pub fn build_summary_request(
        &self,
        batch_text: &str,
        images: Vec<ImageData>,
        previous_context: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![
            ChatMessage::system(&self.summary_system),
            ChatMessage::user(&self.summary_instruction),
        ];
        if !previous_context.is_empty() {
            messages.push(ChatMessage::assistant(previous_context));
        }
        messages.push(if images.is_empty() {
            ChatMessage::user(batch_text)
        } else {
            ChatMessage::user_with_images(batch_text, images)
        });
        messages
    }

    /// Assemble the message sequence for the final scoring call.
    pub fn build_scoring_request(&self, combined_summary: &str) -> Vec<ChatMessage> {
        let prompt = self
            .scoring_template
            .replace(SUMMARY_PLACEHOLDER, combined_summary);
        vec![
            ChatMessage::system(&self.scoring_system),
            ChatMessage::user(prompt),
        ]
    }
}
