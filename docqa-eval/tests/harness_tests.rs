//! Integration tests for answer generation and judging over results files.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_eval::{
    AnswerWithRag, ErrorPolicy, EvalError, EvalExample, EvaluateOptions, JudgePrompt, RunOptions,
    evaluate_answers, load_records, run_tests, summarize,
};
use docqa_rag::{MockGenerator, RagAnswer, RagError};
use proptest::prelude::*;

/// Answers by echoing the question; fails on questions listed in `failing`.
#[derive(Default)]
struct ScriptedAnswerer {
    failing: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAnswerer {
    fn failing_on(questions: &[&str]) -> Self {
        Self { failing: questions.iter().map(|q| q.to_string()).collect(), ..Default::default() }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerWithRag for ScriptedAnswerer {
    async fn answer_with_rag(&self, question: &str) -> docqa_rag::Result<RagAnswer> {
        self.calls.lock().unwrap().push(question.to_string());
        if self.failing.iter().any(|q| q == question) {
            return Err(RagError::Generation { model: "scripted".into(), message: "offline".into() });
        }
        Ok(RagAnswer {
            answer: format!("answer to {question}"),
            context: vec![format!("passage about {question}")],
        })
    }
}

fn dataset(questions: &[&str]) -> Vec<EvalExample> {
    questions.iter().map(|q| EvalExample::new(*q, format!("truth for {q}"))).collect()
}

#[tokio::test]
async fn second_run_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let data = dataset(&["q1", "q2", "q3"]);
    let options = RunOptions { test_settings: Some("chunk:100".into()), ..Default::default() };

    let answerer = ScriptedAnswerer::default();
    let first = run_tests(&data, &answerer, &path, &options).await.unwrap();
    assert_eq!(first.processed, 3);
    let after_first = std::fs::read_to_string(&path).unwrap();

    let second = run_tests(&data, &answerer, &path, &options).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(answerer.calls().len(), 3);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), after_first);

    let records = load_records(&path).unwrap();
    assert_eq!(records[0].question, "q1");
    assert_eq!(records[0].true_answer, "truth for q1");
    assert_eq!(records[0].generated_answer, "answer to q1");
    assert_eq!(records[0].retrieved_docs, vec!["passage about q1".to_string()]);
    assert_eq!(records[0].test_settings.as_deref(), Some("chunk:100"));
}

#[tokio::test]
async fn interrupted_run_keeps_completed_records_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let data = dataset(&["q1", "q2", "q3", "q4"]);

    let broken = ScriptedAnswerer::failing_on(&["q3"]);
    let err = run_tests(&data, &broken, &path, &RunOptions::default()).await.unwrap_err();
    match err {
        EvalError::Answer { question, .. } => assert_eq!(question, "q3"),
        other => panic!("unexpected error: {other}"),
    }
    let kept: Vec<String> = load_records(&path).unwrap().into_iter().map(|r| r.question).collect();
    assert_eq!(kept, vec!["q1", "q2"]);

    let healthy = ScriptedAnswerer::default();
    let report = run_tests(&data, &healthy, &path, &RunOptions::default()).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(healthy.calls(), vec!["q3", "q4"]);
    assert_eq!(load_records(&path).unwrap().len(), 4);
}

#[tokio::test]
async fn continue_policy_reports_failures_and_moves_on() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    let data = dataset(&["q1", "q2", "q3"]);
    let options = RunOptions { error_policy: ErrorPolicy::Continue, ..Default::default() };

    let answerer = ScriptedAnswerer::failing_on(&["q2"]);
    let report = run_tests(&data, &answerer, &path, &options).await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].question, "q2");
    assert_eq!(report.failures[0].stage, "answer");
    assert_eq!(load_records(&path).unwrap().len(), 2);
}

#[tokio::test]
async fn malformed_results_file_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    std::fs::write(&path, "[{\"question\": ").unwrap();

    let err = run_tests(&dataset(&["q1"]), &ScriptedAnswerer::default(), &path, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::Json { .. }));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{\"question\": ");
}

#[tokio::test]
async fn evaluation_scores_once_per_evaluator() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    run_tests(&dataset(&["q1", "q2"]), &ScriptedAnswerer::default(), &path, &RunOptions::default())
        .await
        .unwrap();

    let judge = MockGenerator::fixed("Good grounding.[RESULT]4");
    let prompt = JudgePrompt::default();
    let options = EvaluateOptions::default();

    let first = evaluate_answers(&path, &judge, "gpt", &prompt, &options).await.unwrap();
    assert_eq!(first.processed, 2);
    let second = evaluate_answers(&path, &judge, "gpt", &prompt, &options).await.unwrap();
    assert_eq!(second.processed, 0);
    assert_eq!(second.skipped, 2);
    assert_eq!(judge.requests().len(), 2);

    let requests = judge.requests();
    assert!(requests.iter().all(|r| r.temperature == 0.0));
    assert!(requests[0].prompt.contains("answer to q1"));
    assert!(requests[0].prompt.contains("truth for q1"));

    let records = load_records(&path).unwrap();
    assert_eq!(records[0].feedback("gpt"), Some("Good grounding."));
    assert_eq!(records[0].score("gpt").and_then(|s| s.as_str()), Some("4"));

    let other = MockGenerator::fixed("Fine.[RESULT]2");
    let report = evaluate_answers(&path, &other, "mistral", &prompt, &options).await.unwrap();
    assert_eq!(report.processed, 2);

    let records = load_records(&path).unwrap();
    assert_eq!(summarize(&records, "gpt").mean_score, Some(4.0));
    assert_eq!(summarize(&records, "mistral").mean_score, Some(2.0));
}

#[tokio::test]
async fn unparseable_verdict_leaves_record_unscored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    run_tests(&dataset(&["q1", "q2"]), &ScriptedAnswerer::default(), &path, &RunOptions::default())
        .await
        .unwrap();

    let replies = AtomicUsize::new(0);
    let judge = MockGenerator::new(move |_| {
        let reply = match replies.fetch_add(1, Ordering::SeqCst) {
            0 => "Solid.[RESULT]5",
            _ => "I forgot the marker, 3",
        };
        Ok(reply.to_string())
    });

    let err = evaluate_answers(&path, &judge, "gpt", &JudgePrompt::default(), &EvaluateOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EvalError::JudgeFormat { markers: 0, .. }));

    let records = load_records(&path).unwrap();
    assert!(records[0].is_scored("gpt"));
    assert!(!records[1].is_scored("gpt"));
}

#[tokio::test]
async fn evaluating_a_missing_file_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    let judge = MockGenerator::fixed("x[RESULT]1");

    let report = evaluate_answers(&path, &judge, "gpt", &JudgePrompt::default(), &EvaluateOptions::default())
        .await
        .unwrap();
    assert_eq!(report.processed, 0);
    assert!(!path.exists());
    assert!(judge.requests().is_empty());
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Runtime::new().unwrap().block_on(future)
}

/// *For any* dataset, possibly with repeated questions, the results file
/// holds each distinct question exactly once in first-seen order, and a
/// second run neither calls the answerer nor changes the file.
mod prop_run_idempotence {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn rerun_is_a_no_op(picks in proptest::collection::vec(0usize..6, 0..15)) {
            let questions: Vec<String> = picks.iter().map(|i| format!("question {i}")).collect();
            let data: Vec<EvalExample> =
                questions.iter().map(|q| EvalExample::new(q.as_str(), "truth")).collect();

            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("results.json");
            let answerer = ScriptedAnswerer::default();

            block_on(run_tests(&data, &answerer, &path, &RunOptions::default())).unwrap();
            let calls = answerer.calls();
            let before = std::fs::read_to_string(&path).ok();

            let report = block_on(run_tests(&data, &answerer, &path, &RunOptions::default())).unwrap();
            prop_assert_eq!(report.processed, 0);
            prop_assert_eq!(answerer.calls().len(), calls.len());
            prop_assert_eq!(std::fs::read_to_string(&path).ok(), before);

            let mut distinct: Vec<String> = Vec::new();
            for q in &questions {
                if !distinct.contains(q) {
                    distinct.push(q.clone());
                }
            }
            let stored: Vec<String> =
                load_records(&path).unwrap().into_iter().map(|r| r.question).collect();
            prop_assert_eq!(stored, distinct);
        }
    }
}
