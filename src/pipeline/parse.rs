//! Parsing and validating the scoring response.
//!
//! The scoring prompt forbids markdown fences, but models wrap JSON in them
//! anyway often enough that the parser tolerates one outer ``` / ```json
//! fence. That is the entire extent of normalization: no markdown parsing,
//! no best-effort field recovery. A response that is not valid JSON in the
//! mandated shape is a [`DeckScoreError::MalformedResponse`] carrying the
//! raw text, and the caller surfaces it to the user rather than presenting
//! a partial rubric as if it were complete.

use crate::error::DeckScoreError;
use crate::rubric::{LegacyRubric, RubricResult, CATEGORIES, QUESTION_GROUP_COUNT};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Strip one recognized outer code fence, if present.
///
/// Anything that is not exactly a fenced block is returned unchanged
/// (trimmed), including inputs with fences in the middle.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match RE_OUTER_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

fn malformed(detail: impl Into<String>, raw: &str) -> DeckScoreError {
    DeckScoreError::MalformedResponse {
        detail: detail.into(),
        raw: raw.to_string(),
    }
}

/// Parse a canonical four-group rubric from raw model text.
///
/// Shape violations are fatal for this scoring attempt: every question group
/// `"1"`..`"4"` must be present, every group must carry all three
/// categories, and every score must be one of the three legal values (the
/// [`crate::rubric::Score`] deserializer enforces that last one).
pub fn parse_rubric(raw: &str) -> Result<RubricResult, DeckScoreError> {
    let body = strip_code_fence(raw);
    let rubric: RubricResult =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string(), raw))?;
    validate_rubric(&rubric).map_err(|detail| malformed(detail, raw))?;
    Ok(rubric)
}

fn validate_rubric(rubric: &RubricResult) -> Result<(), String> {
    for i in 1..=QUESTION_GROUP_COUNT {
        let key = i.to_string();
        let group = rubric
            .groups
            .get(&key)
            .ok_or_else(|| format!("missing question group \"{key}\""))?;
        for cat in CATEGORIES {
            if !group.contains_key(&cat) {
                return Err(format!(
                    "question group \"{key}\" is missing category \"{}\"",
                    cat.label()
                ));
            }
        }
    }
    if rubric.groups.len() != QUESTION_GROUP_COUNT {
        let extra: Vec<&str> = rubric
            .groups
            .keys()
            .filter(|k| {
                k.parse::<usize>()
                    .map(|n| n < 1 || n > QUESTION_GROUP_COUNT)
                    .unwrap_or(true)
            })
            .map(String::as_str)
            .collect();
        return Err(format!(
            "unexpected question groups: {}",
            extra.join(", ")
        ));
    }
    Ok(())
}

/// Parse the float-scored three-group legacy rubric.
///
/// Accepted only when the pipeline is configured for
/// [`crate::rubric::RubricSchema::LegacyThreeGroup`]. Scores outside
/// `[0, 1]` are rejected; an entirely empty rubric is rejected.
pub fn parse_legacy_rubric(raw: &str) -> Result<LegacyRubric, DeckScoreError> {
    let body = strip_code_fence(raw);
    let rubric: LegacyRubric =
        serde_json::from_str(body).map_err(|e| malformed(e.to_string(), raw))?;

    if rubric.leaf_count() == 0 {
        return Err(malformed("rubric contains no scored questions", raw));
    }
    for (name, map) in [
        ("team", &rubric.team),
        ("business_model", &rubric.business_model),
        ("traction", &rubric.traction),
    ] {
        for (question, score) in map {
            if !(0.0..=1.0).contains(score) {
                return Err(malformed(
                    format!("{name}.{question} score {score} is outside [0, 1]"),
                    raw,
                ));
            }
        }
    }
    Ok(rubric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::{full_rubric, Score};

    #[test]
    fn fence_stripping_is_scoped() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1}  "), "{\"a\": 1}");
        // A fence in the middle is content, not wrapping.
        let mixed = "prefix\n```json\n{}\n```";
        assert_eq!(strip_code_fence(mixed), mixed);
    }

    #[test]
    fn round_trip_without_fence() {
        let rubric = full_rubric(Score::Half);
        let json = serde_json::to_string_pretty(&rubric).unwrap();
        let parsed = parse_rubric(&json).unwrap();
        assert_eq!(parsed, rubric);
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let rubric = full_rubric(Score::Full);
        let json = serde_json::to_string(&rubric).unwrap();
        let fenced = format!("```json\n{json}\n```");
        assert_eq!(parse_rubric(&json).unwrap(), parse_rubric(&fenced).unwrap());
    }

    #[test]
    fn missing_group_is_malformed() {
        let mut rubric = full_rubric(Score::Full);
        rubric.groups.remove("4");
        let json = serde_json::to_string(&rubric).unwrap();
        let err = parse_rubric(&json).unwrap_err();
        match err {
            DeckScoreError::MalformedResponse { detail, raw } => {
                assert!(detail.contains("missing question group \"4\""));
                assert_eq!(raw, json);
            }
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn missing_category_is_malformed() {
        let mut rubric = full_rubric(Score::Full);
        rubric
            .groups
            .get_mut("2")
            .unwrap()
            .remove(&crate::rubric::Category::Traction);
        let json = serde_json::to_string(&rubric).unwrap();
        let err = parse_rubric(&json).unwrap_err();
        assert!(err.to_string().contains("Traction"));
    }

    #[test]
    fn out_of_range_score_is_malformed() {
        let json = r#"{"1": {"Team": {"score": 0.7, "rationale": "x"}}}"#;
        let err = parse_rubric(json).unwrap_err();
        assert!(err.to_string().contains("0.7"));
    }

    #[test]
    fn extra_group_is_malformed() {
        let mut rubric = full_rubric(Score::Zero);
        rubric.groups.insert("5".into(), rubric.groups["1"].clone());
        let json = serde_json::to_string(&rubric).unwrap();
        let err = parse_rubric(&json).unwrap_err();
        assert!(err.to_string().contains("unexpected question groups"));
    }

    #[test]
    fn prose_response_is_malformed_with_raw_kept() {
        let raw = "I'm sorry, I cannot score this deck.";
        let err = parse_rubric(raw).unwrap_err();
        match err {
            DeckScoreError::MalformedResponse { raw: kept, .. } => assert_eq!(kept, raw),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn legacy_rubric_parses() {
        let json = r#"{
            "team": {"1": 1.0, "2": 0.5, "3": 0.0},
            "business_model": {"1": 0.8, "2": 0.2, "3": 1.0},
            "traction": {"1": 0.0, "2": 0.3, "3": 0.6},
            "total_score": 4.4,
            "rationale": "solid team, early traction"
        }"#;
        let rubric = parse_legacy_rubric(json).unwrap();
        assert_eq!(rubric.leaf_count(), 9);
        assert!((rubric.total() - 4.4).abs() < 1e-9);
    }

    #[test]
    fn legacy_score_above_one_is_malformed() {
        let json = r#"{"team": {"1": 1.5}, "business_model": {}, "traction": {}}"#;
        let err = parse_legacy_rubric(json).unwrap_err();
        assert!(err.to_string().contains("1.5"));
    }
}
