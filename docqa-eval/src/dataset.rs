//! Evaluation dataset loading.

use std::path::Path;

use tracing::info;

use crate::error::{EvalError, Result};
use crate::record::EvalExample;

/// Load `{question, answer}` rows from a JSON array or a JSON Lines file.
///
/// The format is picked from the first non-blank character: `[` means a JSON
/// array, anything else is read as one object per line. Blank lines in JSON
/// Lines input are ignored.
pub fn load_eval_dataset(path: impl AsRef<Path>) -> Result<Vec<EvalExample>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    let invalid = |message: String| EvalError::Dataset { path: path.to_path_buf(), message };

    let examples: Vec<EvalExample> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(&raw).map_err(|e| invalid(e.to_string()))?
    } else {
        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| invalid(format!("line {}: {e}", i + 1)))
            })
            .collect::<Result<_>>()?
    };

    info!(path = %path.display(), example_count = examples.len(), "loaded evaluation dataset");
    Ok(examples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.json");
        std::fs::write(&path, r#" [{"question": "q1", "answer": "a1"}, {"question": "q2", "answer": "a2"}]"#)
            .unwrap();

        let examples = load_eval_dataset(&path).unwrap();
        assert_eq!(examples, vec![EvalExample::new("q1", "a1"), EvalExample::new("q2", "a2")]);
    }

    #[test]
    fn reads_json_lines_skipping_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        std::fs::write(&path, "{\"question\": \"q1\", \"answer\": \"a1\"}\n\n{\"question\": \"q2\", \"answer\": \"a2\"}\n")
            .unwrap();

        assert_eq!(load_eval_dataset(&path).unwrap().len(), 2);
    }

    #[test]
    fn bad_line_is_reported_by_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qa.jsonl");
        std::fs::write(&path, "{\"question\": \"q1\", \"answer\": \"a1\"}\n{\"question\": 3}\n").unwrap();

        match load_eval_dataset(&path).unwrap_err() {
            EvalError::Dataset { message, .. } => assert!(message.starts_with("line 2:")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
