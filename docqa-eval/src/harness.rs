//! Checkpointed answer generation over an evaluation dataset.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use docqa_rag::{RagAnswer, RagPipeline};
use tracing::{info, warn};

use crate::error::{EvalError, Result};
use crate::record::{EvalExample, EvaluationRecord};
use crate::store::{load_records, save_records};

/// Anything that can answer a question with retrieved context.
///
/// Implemented for [`RagPipeline`]; tests substitute scripted answerers.
#[async_trait]
pub trait AnswerWithRag: Send + Sync {
    /// Answer `question`, returning the text and the passages used.
    async fn answer_with_rag(&self, question: &str) -> docqa_rag::Result<RagAnswer>;
}

#[async_trait]
impl AnswerWithRag for RagPipeline {
    async fn answer_with_rag(&self, question: &str) -> docqa_rag::Result<RagAnswer> {
        self.answer(question).await
    }
}

/// What to do when a single question fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop and return the first failure.
    #[default]
    Abort,
    /// Log the failure, note it in the [`RunReport`], and go on.
    Continue,
}

/// Options for [`run_tests`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Label stored with every new record, e.g. `"chunk:500_rerank:yes"`.
    pub test_settings: Option<String>,
    /// Log question, answer and true answer for every new record.
    pub verbose: bool,
    pub error_policy: ErrorPolicy,
}

/// A question that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub question: String,
    /// The step that failed: `answer`, `judge`, or `parse`.
    pub stage: &'static str,
    pub message: String,
}

impl Failure {
    pub(crate) fn new(question: &str, error: &EvalError) -> Self {
        Self { question: question.to_string(), stage: error.stage(), message: error.to_string() }
    }
}

/// Counts for one harness run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Records newly written during this run.
    pub processed: usize,
    /// Entries left alone because they were already done.
    pub skipped: usize,
    /// Entries that failed under [`ErrorPolicy::Continue`].
    pub failures: Vec<Failure>,
}

/// Answer every dataset question not yet present in `output_path`.
///
/// Existing records are kept. Each new record is appended and the whole file
/// is checkpointed before the next question is asked, so an interrupted run
/// resumes where it stopped. Questions are matched by exact text; a question
/// repeated within the dataset is answered once.
///
/// # Errors
///
/// Fails if the results file is malformed or cannot be written, or, under
/// [`ErrorPolicy::Abort`], with [`EvalError::Answer`] for the first question
/// the answerer cannot handle.
pub async fn run_tests(
    dataset: &[EvalExample],
    answerer: &dyn AnswerWithRag,
    output_path: impl AsRef<Path>,
    options: &RunOptions,
) -> Result<RunReport> {
    let output_path = output_path.as_ref();
    let mut records = load_records(output_path)?;
    let mut seen: HashSet<String> = records.iter().map(|r| r.question.clone()).collect();
    let mut report = RunReport::default();

    info!(
        path = %output_path.display(),
        existing = records.len(),
        dataset_size = dataset.len(),
        "starting evaluation run"
    );

    for example in dataset {
        if seen.contains(&example.question) {
            report.skipped += 1;
            continue;
        }

        let answer = match answerer.answer_with_rag(&example.question).await {
            Ok(answer) => answer,
            Err(source) => {
                let error = EvalError::Answer { question: example.question.clone(), source };
                match options.error_policy {
                    ErrorPolicy::Abort => return Err(error),
                    ErrorPolicy::Continue => {
                        warn!(question = %example.question, error = %error, "skipping question");
                        report.failures.push(Failure::new(&example.question, &error));
                        continue;
                    }
                }
            }
        };

        if options.verbose {
            info!(
                question = %example.question,
                answer = %answer.answer,
                true_answer = %example.answer,
                "generated answer"
            );
        }

        records.push(EvaluationRecord {
            question: example.question.clone(),
            true_answer: example.answer.clone(),
            generated_answer: answer.answer,
            retrieved_docs: answer.context,
            test_settings: options.test_settings.clone(),
            extra: Default::default(),
        });
        save_records(output_path, &records)?;

        seen.insert(example.question.clone());
        report.processed += 1;
    }

    info!(
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failures.len(),
        "evaluation run finished"
    );
    Ok(report)
}
