//! Records stored in a results file.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One labelled question from an evaluation dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalExample {
    /// The question put to the pipeline.
    pub question: String,
    /// The reference answer.
    pub answer: String,
}

impl EvalExample {
    /// Create a new example.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// A generated answer and, once judged, its evaluator verdicts.
///
/// Judge results live under flat keys `eval_score_<evaluator>` and
/// `eval_feedback_<evaluator>`, so one file can carry the verdicts of several
/// evaluators. Keys this type does not know are kept as they were read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question: String,
    pub true_answer: String,
    pub generated_answer: String,
    pub retrieved_docs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_settings: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Key holding an evaluator's score.
pub fn score_key(evaluator: &str) -> String {
    format!("eval_score_{evaluator}")
}

/// Key holding an evaluator's feedback.
pub fn feedback_key(evaluator: &str) -> String {
    format!("eval_feedback_{evaluator}")
}

impl EvaluationRecord {
    /// The raw score stored for `evaluator`, if any.
    pub fn score(&self, evaluator: &str) -> Option<&Value> {
        self.extra.get(&score_key(evaluator))
    }

    /// The feedback stored for `evaluator`, if any.
    pub fn feedback(&self, evaluator: &str) -> Option<&str> {
        self.extra.get(&feedback_key(evaluator)).and_then(Value::as_str)
    }

    /// Whether `evaluator` has already scored this record.
    pub fn is_scored(&self, evaluator: &str) -> bool {
        self.extra.contains_key(&score_key(evaluator))
    }

    /// Store a verdict for `evaluator`, replacing any previous one.
    pub fn set_verdict(&mut self, evaluator: &str, feedback: String, score: String) {
        self.extra.insert(feedback_key(evaluator), Value::String(feedback));
        self.extra.insert(score_key(evaluator), Value::String(score));
    }

    /// The score for `evaluator` as a number.
    ///
    /// Judges usually reply with a string such as `"4"`; numeric JSON values
    /// are accepted too.
    pub fn numeric_score(&self, evaluator: &str) -> Option<f64> {
        match self.score(evaluator)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
