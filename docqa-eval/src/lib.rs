//! # docqa-eval
//!
//! Offline evaluation for docqa pipelines.
//!
//! A run has two passes over a JSON results file:
//!
//! 1. [`run_tests`] answers each dataset question with the pipeline and
//!    appends a record `{question, true_answer, generated_answer,
//!    retrieved_docs, test_settings?}`.
//! 2. [`evaluate_answers`] asks a judge model to grade every record and adds
//!    `eval_score_<evaluator>` and `eval_feedback_<evaluator>`.
//!
//! Both passes skip work already in the file and checkpoint after every
//! record, so an interrupted run can simply be restarted.
//!
//! ## Example
//!
//! ```rust,ignore
//! use docqa_eval::{JudgePrompt, RunOptions, evaluate_answers, load_eval_dataset, run_tests};
//!
//! let dataset = load_eval_dataset("qa.jsonl")?;
//! run_tests(&dataset, &pipeline, "results.json", &RunOptions::default()).await?;
//! evaluate_answers("results.json", &judge, "gpt4", &JudgePrompt::default(), &Default::default())
//!     .await?;
//! ```

pub mod dataset;
pub mod error;
pub mod harness;
pub mod judge;
pub mod record;
pub mod store;
pub mod summary;

pub use dataset::load_eval_dataset;
pub use error::{EvalError, Result};
pub use harness::{AnswerWithRag, ErrorPolicy, Failure, RunOptions, RunReport, run_tests};
pub use judge::{EvaluateOptions, JudgePrompt, Verdict, evaluate_answers, parse_judge_output};
pub use record::{EvalExample, EvaluationRecord};
pub use store::{load_records, save_records};
pub use summary::{ScoreSummary, summarize};
