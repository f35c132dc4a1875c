//! Loader for JSON records produced by the document extraction service.
//!
//! The extraction service writes one JSON file per source document. Each file
//! holds an array of blocks. Object blocks carry their text under `text`
//! (paragraphs) or `table_body` (tables) alongside layout fields such as
//! `type` and `page_idx`; any other block is taken verbatim as text.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::document::{Document, Metadata};
use crate::error::{RagError, Result};

/// Fields holding block text, in order of preference.
const CONTENT_KEYS: [&str; 2] = ["text", "table_body"];

/// Loads every `*.json` file under a directory into [`Document`]s.
///
/// Each document carries the block's other scalar fields as metadata plus `source`
/// (the file path) and `seq_num` (1-based position in the file). Blocks with
/// no text are dropped.
#[derive(Debug, Clone)]
pub struct JsonDirectoryLoader {
    root: PathBuf,
}

impl JsonDirectoryLoader {
    /// Create a loader for the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Load all documents, visiting files in sorted path order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InputError`] if the directory cannot be walked or
    /// a file is not a JSON array, and [`RagError::Io`] if a file cannot be
    /// read.
    pub async fn load(&self) -> Result<Vec<Document>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                RagError::InputError(format!("cannot read '{}': {e}", self.root.display()))
            })?;
            let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
            if entry.file_type().is_file() && is_json {
                files.push(entry.into_path());
            }
        }

        let mut documents = Vec::new();
        for path in &files {
            let bytes = tokio::fs::read(path).await?;
            let loaded = parse_records(path, &bytes)?;
            documents.extend(loaded);
        }

        if documents.is_empty() {
            warn!(root = %self.root.display(), files = files.len(), "no documents loaded");
        } else {
            info!(files = files.len(), documents = documents.len(), "loaded documents");
        }
        Ok(documents)
    }
}

/// Parse one extraction file into documents, dropping blocks without text.
pub fn parse_records(path: &Path, bytes: &[u8]) -> Result<Vec<Document>> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| {
        RagError::InputError(format!("'{}' is not valid JSON: {e}", path.display()))
    })?;
    let Value::Array(records) = value else {
        return Err(RagError::InputError(format!(
            "'{}' must contain a JSON array of records",
            path.display()
        )));
    };

    let source = path.display().to_string();
    let documents = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let (content, mut metadata) = match record {
                Value::Object(fields) => {
                    let content = CONTENT_KEYS
                        .iter()
                        .find_map(|key| fields.get(*key).and_then(non_empty_text))
                        .unwrap_or_default();
                    let metadata: Metadata = fields
                        .into_iter()
                        .filter(|(k, v)| is_scalar(v) && !CONTENT_KEYS.contains(&k.as_str()))
                        .collect();
                    (content, metadata)
                }
                Value::String(text) => (text, Metadata::new()),
                other => (other.to_string(), Metadata::new()),
            };
            metadata.insert("source".to_string(), Value::from(source.as_str()));
            metadata.insert("seq_num".to_string(), Value::from(i + 1));
            Document { content, metadata }
        })
        .filter(Document::has_content)
        .collect();

    Ok(documents)
}

fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
