//! Data types for source documents, chunks, and search results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar metadata attached to documents and carried through to answers.
pub type Metadata = BTreeMap<String, Value>;

/// A record supplied by the extraction service.
///
/// Records whose `content` is empty carry no usable text and are discarded
/// before chunking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// The extracted text.
    pub content: String,
    /// Key-value metadata describing where the text came from.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with the given content and no metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the document has any extractable text.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// A bounded-size segment of a [`Document`].
///
/// `content` is never empty. Metadata is inherited from the parent document
/// plus a `chunk_index` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub content: String,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: Metadata,
}

/// A retrieved [`Chunk`] paired with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more similar).
    pub score: f32,
}
