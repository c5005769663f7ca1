//! Rubric data model and score aggregation.
//!
//! The canonical rubric is four question groups (keys `"1"`..`"4"`), each
//! assessed across the three categories Team / Business Model / Traction,
//! each assessment a discrete score in {0, 0.5, 1} plus a free-text
//! rationale. Optional metadata (inferred VC stage, region, industry) rides
//! alongside the numbered keys in the same JSON object.
//!
//! [`Score`] is an enum rather than a float so that an out-of-range numeral
//! can never survive past deserialization: 0.7 is a parse error, not a value.
//!
//! A float-scored three-group shape ([`LegacyRubric`]) is still accepted when
//! explicitly configured, for callers migrating off the older prompt.

use serde::de::Error as DeError;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Number of question groups in the canonical rubric.
pub const QUESTION_GROUP_COUNT: usize = 4;

/// Which scoring schema the model is asked for and the parser accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RubricSchema {
    /// Canonical: groups "1".."4" × three categories × discrete {0, 0.5, 1}.
    #[default]
    FourGroup,
    /// Older shape: team/business_model/traction maps of float scores in [0, 1].
    LegacyThreeGroup,
}

// ── Score ────────────────────────────────────────────────────────────────

/// A discrete rubric score. Exactly three values are legal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Score {
    Zero,
    Half,
    Full,
}

impl Score {
    pub fn value(self) -> f64 {
        match self {
            Score::Zero => 0.0,
            Score::Half => 0.5,
            Score::Full => 1.0,
        }
    }

    /// Accepts only the three legal numerals.
    pub fn from_value(v: f64) -> Option<Self> {
        if v == 0.0 {
            Some(Score::Zero)
        } else if v == 0.5 {
            Some(Score::Half)
        } else if v == 1.0 {
            Some(Score::Full)
        } else {
            None
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        Score::from_value(v)
            .ok_or_else(|| D::Error::custom(format!("score must be 0, 0.5 or 1, got {v}")))
    }
}

// ── Categories ───────────────────────────────────────────────────────────

/// The three fixed assessment categories.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Category {
    Team,
    #[serde(rename = "Business Model")]
    BusinessModel,
    Traction,
}

/// All categories in presentation order.
pub const CATEGORIES: [Category; 3] = [Category::Team, Category::BusinessModel, Category::Traction];

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Team => "Team",
            Category::BusinessModel => "Business Model",
            Category::Traction => "Traction",
        }
    }
}

// ── RubricResult ─────────────────────────────────────────────────────────

/// One category's assessment inside a question group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssessment {
    pub score: Score,
    pub rationale: String,
}

/// Category → assessment, for one question group.
pub type GroupAssessment = BTreeMap<Category, CategoryAssessment>;

/// Optional context the model may infer alongside the rubric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RubricMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vc_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl RubricMetadata {
    const KEYS: [&'static str; 3] = ["vc_stage", "region", "industry"];
}

/// The structured scoring result.
///
/// Serialises to a single JSON object whose numbered keys are the question
/// groups and whose remaining keys are the optional metadata fields, which is
/// exactly the shape the scoring prompt mandates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RubricResult {
    /// Question-group key ("1".."4") → per-category assessments.
    pub groups: BTreeMap<String, GroupAssessment>,
    pub metadata: RubricMetadata,
}

impl Serialize for RubricResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (key, group) in &self.groups {
            map.serialize_entry(key, group)?;
        }
        if let Some(ref v) = self.metadata.vc_stage {
            map.serialize_entry("vc_stage", v)?;
        }
        if let Some(ref v) = self.metadata.region {
            map.serialize_entry("region", v)?;
        }
        if let Some(ref v) = self.metadata.industry {
            map.serialize_entry("industry", v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RubricResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let mut groups = BTreeMap::new();
        let mut metadata = RubricMetadata::default();

        for (key, value) in raw {
            if RubricMetadata::KEYS.contains(&key.as_str()) {
                let field = match value {
                    serde_json::Value::Null => None,
                    serde_json::Value::String(s) => Some(s),
                    other => {
                        return Err(D::Error::custom(format!(
                            "metadata field \"{key}\" must be a string, got {other}"
                        )))
                    }
                };
                match key.as_str() {
                    "vc_stage" => metadata.vc_stage = field,
                    "region" => metadata.region = field,
                    _ => metadata.industry = field,
                }
            } else if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
                let group: GroupAssessment = serde_json::from_value(value)
                    .map_err(|e| D::Error::custom(format!("question group \"{key}\": {e}")))?;
                groups.insert(key, group);
            } else {
                return Err(D::Error::custom(format!(
                    "unexpected key \"{key}\" in rubric"
                )));
            }
        }

        Ok(RubricResult { groups, metadata })
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────

/// Derived total over a [`RubricResult`]. Never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AggregateScore {
    pub total: f64,
    pub max_total: f64,
    pub percentage: f64,
}

/// Newline-join per-batch summaries in batch order.
///
/// No truncation and no deduplication, even when adjacent batches repeat
/// content because of the carried context.
pub fn combine_summaries(summaries: &[String]) -> String {
    summaries.join("\n")
}

/// Sum every category score across every question group.
///
/// Returns `None` when the rubric has zero question groups (the percentage
/// would be undefined); callers surface that as a malformed response.
pub fn aggregate_score(rubric: &RubricResult) -> Option<AggregateScore> {
    let group_count = rubric.groups.len();
    if group_count == 0 {
        return None;
    }
    let total: f64 = rubric
        .groups
        .values()
        .flat_map(|group| group.values())
        .map(|a| a.score.value())
        .sum();
    let max_total = (CATEGORIES.len() * group_count) as f64;
    Some(AggregateScore {
        total,
        max_total,
        percentage: 100.0 * total / max_total,
    })
}

// ── Legacy schema ────────────────────────────────────────────────────────

/// The float-scored three-group shape produced by the older scoring prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRubric {
    pub team: BTreeMap<String, f64>,
    pub business_model: BTreeMap<String, f64>,
    pub traction: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl LegacyRubric {
    fn leaves(&self) -> impl Iterator<Item = f64> + '_ {
        self.team
            .values()
            .chain(self.business_model.values())
            .chain(self.traction.values())
            .copied()
    }

    pub fn leaf_count(&self) -> usize {
        self.team.len() + self.business_model.len() + self.traction.len()
    }

    pub fn total(&self) -> f64 {
        self.leaves().sum()
    }

    pub fn aggregate(&self) -> Option<AggregateScore> {
        let max_total = self.leaf_count() as f64;
        if max_total == 0.0 {
            return None;
        }
        let total = self.total();
        Some(AggregateScore {
            total,
            max_total,
            percentage: 100.0 * total / max_total,
        })
    }
}

/// A parsed scoring result in whichever schema was configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScoredRubric {
    Standard(RubricResult),
    Legacy(LegacyRubric),
}

impl ScoredRubric {
    pub fn aggregate(&self) -> Option<AggregateScore> {
        match self {
            ScoredRubric::Standard(r) => aggregate_score(r),
            ScoredRubric::Legacy(r) => r.aggregate(),
        }
    }

    /// The canonical rubric, when this result uses the canonical schema.
    pub fn as_standard(&self) -> Option<&RubricResult> {
        match self {
            ScoredRubric::Standard(r) => Some(r),
            ScoredRubric::Legacy(_) => None,
        }
    }
}

/// Build a complete canonical rubric with every score set to `score`.
/// Test helper shared across the crate's test modules.
#[cfg(test)]
pub(crate) fn full_rubric(score: Score) -> RubricResult {
    let mut groups = BTreeMap::new();
    for i in 1..=QUESTION_GROUP_COUNT {
        let mut group = BTreeMap::new();
        for cat in CATEGORIES {
            group.insert(
                cat,
                CategoryAssessment {
                    score,
                    rationale: format!("{} rationale", cat.label()),
                },
            );
        }
        groups.insert(i.to_string(), group);
    }
    RubricResult {
        groups,
        metadata: RubricMetadata::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rejects_other_numerals() {
        assert_eq!(Score::from_value(0.5), Some(Score::Half));
        assert_eq!(Score::from_value(0.7), None);
        assert_eq!(Score::from_value(-1.0), None);
        let parsed: Result<Score, _> = serde_json::from_str("0.25");
        assert!(parsed.is_err());
    }

    #[test]
    fn score_serde_round_trip() {
        for score in [Score::Zero, Score::Half, Score::Full] {
            let json = serde_json::to_string(&score).unwrap();
            let back: Score = serde_json::from_str(&json).unwrap();
            assert_eq!(score, back);
        }
    }

    #[test]
    fn category_wire_names() {
        assert_eq!(
            serde_json::to_string(&Category::BusinessModel).unwrap(),
            "\"Business Model\""
        );
        assert_eq!(serde_json::to_string(&Category::Team).unwrap(), "\"Team\"");
    }

    #[test]
    fn all_full_scores_yield_100_percent() {
        let agg = aggregate_score(&full_rubric(Score::Full)).unwrap();
        assert_eq!(agg.total, 12.0);
        assert_eq!(agg.max_total, 12.0);
        assert_eq!(agg.percentage, 100.0);
    }

    #[test]
    fn all_zero_scores_yield_zero_percent() {
        let agg = aggregate_score(&full_rubric(Score::Zero)).unwrap();
        assert_eq!(agg.total, 0.0);
        assert_eq!(agg.percentage, 0.0);
    }

    #[test]
    fn mixed_scores_sum_exactly() {
        let mut rubric = full_rubric(Score::Zero);
        // Group "1": all 1s. Group "2": all 0.5s. Rest stay 0.
        for assessment in rubric.groups.get_mut("1").unwrap().values_mut() {
            assessment.score = Score::Full;
        }
        for assessment in rubric.groups.get_mut("2").unwrap().values_mut() {
            assessment.score = Score::Half;
        }
        let agg = aggregate_score(&rubric).unwrap();
        assert_eq!(agg.total, 4.5);
        assert_eq!(agg.max_total, 12.0);
        assert_eq!(agg.percentage, 100.0 * 4.5 / 12.0);
    }

    #[test]
    fn empty_rubric_has_no_aggregate() {
        let rubric = RubricResult::default();
        assert!(aggregate_score(&rubric).is_none());
    }

    #[test]
    fn combine_summaries_newline_joins_in_order() {
        let combined = combine_summaries(&["first".into(), "second".into(), "third".into()]);
        assert_eq!(combined, "first\nsecond\nthird");
    }

    #[test]
    fn rubric_serde_round_trip_with_metadata() {
        let mut rubric = full_rubric(Score::Half);
        rubric.metadata.vc_stage = Some("Seed".into());
        rubric.metadata.industry = Some("Fintech".into());
        let json = serde_json::to_string(&rubric).unwrap();
        let back: RubricResult = serde_json::from_str(&json).unwrap();
        assert_eq!(rubric, back);
    }

    #[test]
    fn rubric_rejects_unknown_keys() {
        let json = r#"{"1": {}, "notes": "extra prose"}"#;
        let parsed: Result<RubricResult, _> = serde_json::from_str(json);
        assert!(parsed.is_err());
    }

    #[test]
    fn legacy_aggregate_over_nine_leaves() {
        let mut legacy = LegacyRubric::default();
        for key in ["1", "2", "3"] {
            legacy.team.insert(key.into(), 1.0);
            legacy.business_model.insert(key.into(), 0.5);
            legacy.traction.insert(key.into(), 0.0);
        }
        let agg = legacy.aggregate().unwrap();
        assert_eq!(agg.total, 4.5);
        assert_eq!(agg.max_total, 9.0);
    }
}
