//! LLM-as-judge scoring of generated answers.

use std::path::Path;

use docqa_rag::{GenerationRequest, Generator, PromptTemplate, RagError};
use tracing::{info, warn};

use crate::error::{EvalError, Result};
use crate::harness::{ErrorPolicy, Failure, RunReport};
use crate::store::{load_records, save_records};

/// Separates the judge's feedback from its score.
pub const RESULT_MARKER: &str = "[RESULT]";

/// System message for the default judge prompt.
pub const DEFAULT_JUDGE_SYSTEM: &str = "You are a fair evaluator language model.";

/// Default 1-5 correctness rubric.
pub const DEFAULT_JUDGE_TEMPLATE: &str = "###Task Description:
An instruction (might include an Input inside it), a response to evaluate, a reference answer that gets a score of 5, and a score rubric representing an evaluation criteria are given.
1. Write a detailed feedback that assesses the quality of the response strictly based on the given score rubric, not evaluating in general.
2. After writing a feedback, write a score that is an integer between 1 and 5. You should refer to the score rubric.
3. The output format should look as follows: \"Feedback: {{write a feedback for criteria}} [RESULT] {{an integer number between 1 and 5}}\"
4. Please do not generate any other opening, closing, and explanations. Be sure to include [RESULT] in your output.

###The instruction to evaluate:
{instruction}

###Response to evaluate:
{response}

###Reference Answer (Score 5):
{reference_answer}

###Score Rubrics:
[Is the response correct, accurate, and factual based on the reference answer?]
Score 1: The response is completely incorrect, inaccurate, and/or not factual.
Score 2: The response is mostly incorrect, inaccurate, and/or not factual.
Score 3: The response is somewhat correct, accurate, and/or factual.
Score 4: The response is mostly correct, accurate, and factual.
Score 5: The response is completely correct, accurate, and factual.

###Feedback:";

/// The prompt sent to the judge for each record.
///
/// The template must use `{instruction}`, `{response}` and
/// `{reference_answer}`.
#[derive(Debug, Clone)]
pub struct JudgePrompt {
    system: Option<String>,
    template: PromptTemplate,
}

impl JudgePrompt {
    /// Build a judge prompt from a template.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Template`] if the template does not parse or lacks
    /// one of the three placeholders.
    pub fn new(template: impl Into<String>) -> docqa_rag::Result<Self> {
        let template = PromptTemplate::with_required(
            template,
            &["instruction", "response", "reference_answer"],
        )?;
        Ok(Self { system: None, template })
    }

    /// Set the system message sent with every judge call.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Render the request for one record.
    pub fn request(
        &self,
        instruction: &str,
        response: &str,
        reference_answer: &str,
    ) -> docqa_rag::Result<GenerationRequest> {
        let prompt = self.template.render(&[
            ("instruction", instruction),
            ("response", response),
            ("reference_answer", reference_answer),
        ])?;
        let mut request = GenerationRequest::new(prompt).with_temperature(0.0);
        if let Some(system) = &self.system {
            request = request.with_system(system.clone());
        }
        Ok(request)
    }
}

impl Default for JudgePrompt {
    fn default() -> Self {
        Self {
            system: Some(DEFAULT_JUDGE_SYSTEM.to_string()),
            template: PromptTemplate::builtin(DEFAULT_JUDGE_TEMPLATE),
        }
    }
}

/// Parsed judge output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub feedback: String,
    pub score: String,
}

/// Split judge output on the single [`RESULT_MARKER`].
///
/// # Errors
///
/// Returns [`EvalError::JudgeFormat`] when the marker is missing or repeated.
pub fn parse_judge_output(question: &str, output: &str) -> Result<Verdict> {
    let markers = output.matches(RESULT_MARKER).count();
    match output.split_once(RESULT_MARKER) {
        Some((feedback, score)) if markers == 1 => Ok(Verdict {
            feedback: feedback.trim().to_string(),
            score: score.trim().to_string(),
        }),
        _ => Err(EvalError::JudgeFormat {
            question: question.to_string(),
            markers,
            output: output.to_string(),
        }),
    }
}

/// Options for [`evaluate_answers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EvaluateOptions {
    pub error_policy: ErrorPolicy,
}

/// Score every record in `answer_path` that `evaluator_name` has not scored.
///
/// The file is updated in place and checkpointed after each verdict. A
/// missing file means there is nothing to evaluate.
///
/// # Errors
///
/// Fails if the results file is malformed or cannot be written, or, under
/// [`ErrorPolicy::Abort`], on the first judge failure
/// ([`EvalError::Judge`]) or unparseable verdict ([`EvalError::JudgeFormat`]).
/// A record that fails stays unscored.
pub async fn evaluate_answers(
    answer_path: impl AsRef<Path>,
    judge: &dyn Generator,
    evaluator_name: &str,
    judge_prompt: &JudgePrompt,
    options: &EvaluateOptions,
) -> Result<RunReport> {
    let answer_path = answer_path.as_ref();
    let mut records = load_records(answer_path)?;
    let mut report = RunReport::default();

    info!(
        path = %answer_path.display(),
        evaluator = evaluator_name,
        judge = judge.name(),
        record_count = records.len(),
        "starting evaluation"
    );

    for i in 0..records.len() {
        if records[i].is_scored(evaluator_name) {
            report.skipped += 1;
            continue;
        }

        let record = &records[i];
        let verdict = judge_record(
            judge,
            judge_prompt,
            &record.question,
            &record.generated_answer,
            &record.true_answer,
        )
        .await;

        let verdict = match verdict {
            Ok(verdict) => verdict,
            Err(error) => match options.error_policy {
                ErrorPolicy::Abort => return Err(error),
                ErrorPolicy::Continue => {
                    warn!(question = %records[i].question, error = %error, "record left unscored");
                    report.failures.push(Failure::new(&records[i].question, &error));
                    continue;
                }
            },
        };

        records[i].set_verdict(evaluator_name, verdict.feedback, verdict.score);
        save_records(answer_path, &records)?;
        report.processed += 1;
    }

    info!(
        evaluator = evaluator_name,
        processed = report.processed,
        skipped = report.skipped,
        failed = report.failures.len(),
        "evaluation finished"
    );
    Ok(report)
}

async fn judge_record(
    judge: &dyn Generator,
    prompt: &JudgePrompt,
    question: &str,
    response: &str,
    reference: &str,
) -> Result<Verdict> {
    let judge_error = |source: RagError| EvalError::Judge { question: question.to_string(), source };

    let request = prompt.request(question, response, reference).map_err(judge_error)?;
    let output = judge.generate(&request).await.map_err(judge_error)?;
    parse_judge_output(question, &output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_feedback_and_score() {
        let verdict = parse_judge_output("q", "Good grounding.[RESULT]4").unwrap();
        assert_eq!(verdict, Verdict { feedback: "Good grounding.".into(), score: "4".into() });

        let verdict = parse_judge_output("q", "  Feedback: fine \n[RESULT]  5 \n").unwrap();
        assert_eq!(verdict.feedback, "Feedback: fine");
        assert_eq!(verdict.score, "5");
    }

    #[test]
    fn rejects_missing_or_repeated_marker() {
        for (output, expected) in [("Score: 4", 0), ("a [RESULT] 4 [RESULT] 5", 2)] {
            match parse_judge_output("q", output).unwrap_err() {
                EvalError::JudgeFormat { markers, .. } => assert_eq!(markers, expected),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn default_prompt_renders_all_fields_at_zero_temperature() {
        let request = JudgePrompt::default().request("Where is Nice?", "On the coast", "Coast").unwrap();
        assert!(request.prompt.contains("Where is Nice?"));
        assert!(request.prompt.contains("###Reference Answer (Score 5):\nCoast"));
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.system.as_deref(), Some(DEFAULT_JUDGE_SYSTEM));
    }

    #[test]
    fn custom_prompt_requires_placeholders() {
        assert!(JudgePrompt::new("{instruction} {response}").is_err());
        assert!(JudgePrompt::new("{instruction} {response} {reference_answer}").is_ok());
    }
}
