//! Batch mode: answer a file of questions and write the answers once.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::answer::{QuestionRecord, StructuredAnswer};
use crate::error::{RagError, Result};
use crate::qa::QaService;

/// Outcome of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Records read from the input file.
    pub questions: usize,
    /// Answers written to the output file.
    pub answered: usize,
}

/// Read an ordered list of question records from a JSON array file.
///
/// Each element is read on its own. An element that is not a question record
/// is kept as an empty record, so it is skipped when answering and the other
/// questions are unaffected.
///
/// # Errors
///
/// Returns [`RagError::InputError`] if the file is missing or is not a JSON
/// array.
pub async fn read_questions(path: impl AsRef<Path>) -> Result<Vec<QuestionRecord>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "cannot read question file");
        RagError::InputError(format!("cannot read question file {}: {e}", path.display()))
    })?;
    let elements: Vec<Value> = serde_json::from_slice(&bytes).map_err(|e| {
        error!(path = %path.display(), error = %e, "malformed question file");
        RagError::InputError(format!("malformed question file {}: {e}", path.display()))
    })?;

    Ok(elements
        .into_iter()
        .enumerate()
        .map(|(i, element)| {
            serde_json::from_value(element).unwrap_or_else(|e| {
                warn!(record = i + 1, error = %e, "unreadable question record");
                QuestionRecord::default()
            })
        })
        .collect())
}

/// Write `answers` to `path` as a pretty-printed JSON array, creating parent
/// directories as needed.
///
/// # Errors
///
/// Returns [`RagError::Io`] or [`RagError::Json`] on failure.
pub async fn write_answers(path: impl AsRef<Path>, answers: &[StructuredAnswer]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(answers)?;
    tokio::fs::write(path, json).await?;
    info!(path = %path.display(), answers = answers.len(), "wrote answers");
    Ok(())
}

/// Answer every question in `input` and write the answers to `output`.
///
/// The output file is written once, after all questions are processed.
///
/// # Errors
///
/// Returns [`RagError::InputError`] for an unreadable or malformed input
/// file, in which case nothing is written.
pub async fn run_batch(
    service: &QaService,
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> Result<BatchSummary> {
    let questions = read_questions(input).await?;
    let answers = service.ask_batch(&questions).await;
    write_answers(output, &answers).await?;
    Ok(BatchSummary { questions: questions.len(), answered: answers.len() })
}
