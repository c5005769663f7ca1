//! Presenter boundary: turn a scored rubric into display-ready rows.
//!
//! Actual UI rendering happens outside this crate. What lives here is the
//! well-typed hand-off: a flat row model in fixed group/category order, a
//! total three-way colour mapping for the discrete scores, and a plain
//! pipe-table renderer the CLI (or any text surface) can reuse. Any score
//! value outside the three legal ones was already rejected at parse time,
//! so the colour mapping has no failure case.

use crate::rubric::{AggregateScore, Category, RubricResult, Score, CATEGORIES};

/// Three-way visual class for a discrete score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreColor {
    /// 0 — missing or weak.
    Red,
    /// 0.5 — partial.
    Amber,
    /// 1 — strong.
    Green,
}

impl From<Score> for ScoreColor {
    fn from(score: Score) -> Self {
        match score {
            Score::Zero => ScoreColor::Red,
            Score::Half => ScoreColor::Amber,
            Score::Full => ScoreColor::Green,
        }
    }
}

impl ScoreColor {
    /// Stable class name for style sheets.
    pub fn css_class(self) -> &'static str {
        match self {
            ScoreColor::Red => "score-low",
            ScoreColor::Amber => "score-mid",
            ScoreColor::Green => "score-high",
        }
    }
}

/// One rubric cell, flattened for display.
#[derive(Debug, Clone, PartialEq)]
pub struct RubricRow {
    pub group: String,
    pub category: Category,
    pub score: Score,
    pub color: ScoreColor,
    pub rationale: String,
}

/// Flatten a rubric into rows in group order, categories in fixed order
/// within each group.
pub fn rubric_rows(rubric: &RubricResult) -> Vec<RubricRow> {
    let mut rows = Vec::with_capacity(rubric.groups.len() * CATEGORIES.len());
    for (group, assessments) in &rubric.groups {
        for cat in CATEGORIES {
            if let Some(assessment) = assessments.get(&cat) {
                rows.push(RubricRow {
                    group: group.clone(),
                    category: cat,
                    score: assessment.score,
                    color: assessment.score.into(),
                    rationale: assessment.rationale.clone(),
                });
            }
        }
    }
    rows
}

/// Render the rubric as a GFM pipe table with a total line.
pub fn render_rubric_table(rubric: &RubricResult, aggregate: &AggregateScore) -> String {
    let mut out = String::new();
    out.push_str("| Group | Category | Score | Rationale |\n");
    out.push_str("|:------|:---------|------:|:----------|\n");
    for row in rubric_rows(rubric) {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.group,
            row.category.label(),
            format_score(row.score),
            row.rationale.replace('\n', " "),
        ));
    }
    out.push_str(&format!(
        "\nTotal: {}/{} ({:.1}%)\n",
        format_number(aggregate.total),
        format_number(aggregate.max_total),
        aggregate.percentage
    ));
    out
}

fn format_score(score: Score) -> &'static str {
    match score {
        Score::Zero => "0",
        Score::Half => "0.5",
        Score::Full => "1",
    }
}

/// Render whole totals without a trailing `.0`.
fn format_number(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v}")
    }
}
