//! Aggregate scores for one evaluator.

use std::fmt;

use serde::Serialize;

use crate::record::EvaluationRecord;

/// Score statistics for one evaluator over a results file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub evaluator: String,
    /// Records carrying a score from this evaluator.
    pub scored: usize,
    /// Records the evaluator has not scored yet.
    pub unscored: usize,
    /// Scored records whose score is not a number.
    pub non_numeric: usize,
    /// Mean of the numeric scores.
    pub mean_score: Option<f64>,
    /// Mean of `(score - 1) / 4`, mapping the 1-5 rubric onto 0-1.
    pub mean_normalized: Option<f64>,
}

/// Summarize the scores `evaluator` gave across `records`.
pub fn summarize(records: &[EvaluationRecord], evaluator: &str) -> ScoreSummary {
    let scored = records.iter().filter(|r| r.is_scored(evaluator)).count();
    let scores: Vec<f64> = records.iter().filter_map(|r| r.numeric_score(evaluator)).collect();

    let mean_score =
        (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64);

    ScoreSummary {
        evaluator: evaluator.to_string(),
        scored,
        unscored: records.len() - scored,
        non_numeric: scored - scores.len(),
        mean_score,
        mean_normalized: mean_score.map(|mean| (mean - 1.0) / 4.0),
    }
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "evaluator:       {}", self.evaluator)?;
        writeln!(f, "scored:          {}", self.scored)?;
        writeln!(f, "unscored:        {}", self.unscored)?;
        writeln!(f, "non-numeric:     {}", self.non_numeric)?;
        match (self.mean_score, self.mean_normalized) {
            (Some(mean), Some(normalized)) => {
                writeln!(f, "mean score:      {mean:.3}")?;
                write!(f, "mean normalized: {normalized:.3}")
            }
            _ => write!(f, "mean score:      n/a"),
        }
    }
}
