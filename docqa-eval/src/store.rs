//! Loading and checkpointing results files.
//!
//! A results file is a JSON array of [`EvaluationRecord`]s. It is rewritten
//! in full after every record: the new contents go to a temporary file in the
//! same directory which then replaces the old file by rename, so a crash
//! leaves either the previous or the new checkpoint, never a torn one.

use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::record::EvaluationRecord;

/// Read all records from `path`.
///
/// A missing file is an empty result set.
pub fn load_records(path: &Path) -> Result<Vec<EvaluationRecord>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(EvalError::io(path, e)),
    };
    serde_json::from_str(&raw).map_err(|source| EvalError::Json { path: path.to_path_buf(), source })
}

/// Atomically replace the contents of `path` with `records`.
pub fn save_records(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let file = NamedTempFile::new_in(dir).map_err(|e| EvalError::io(dir, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)
        .map_err(|source| EvalError::Json { path: path.to_path_buf(), source })?;
    writer.flush().map_err(|e| EvalError::io(path, e))?;

    let file = writer.into_inner().map_err(|e| EvalError::io(path, e.into_error()))?;
    file.as_file().sync_all().map_err(|e| EvalError::io(path, e))?;
    file.persist(path).map_err(|e| EvalError::io(path, e.error))?;

    debug!(path = %path.display(), record_count = records.len(), "checkpoint written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(question: &str) -> EvaluationRecord {
        EvaluationRecord {
            question: question.to_string(),
            true_answer: "a".to_string(),
            generated_answer: "b".to_string(),
            retrieved_docs: vec!["c".to_string()],
            test_settings: Some("chunk:500".to_string()),
            extra: Default::default(),
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_records(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_records(&path), Err(EvalError::Json { .. })));
    }

    #[test]
    fn save_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        save_records(&path, &[record("one"), record("two")]).unwrap();
        save_records(&path, &[record("three")]).unwrap();

        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, vec![record("three")]);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
