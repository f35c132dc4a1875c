//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps every entry behind a `tokio::sync::RwLock`.
//! A store created with [`InMemoryVectorStore::persistent`] also writes a JSON
//! snapshot to disk on each rebuild, and [`InMemoryVectorStore::open`] loads
//! such a snapshot back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::document::{Chunk, ScoredChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "InMemory";

/// A stored chunk with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
}

/// On-disk layout of a persisted index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexSnapshot {
    model: Option<String>,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use kbqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::persistent("data/vector_store/index.json");
/// store.rebuild("text-embedding-v2", chunks, vectors).await?;
///
/// // later, in another process
/// let store = InMemoryVectorStore::open("data/vector_store/index.json").await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    snapshot: RwLock<IndexSnapshot>,
    path: Option<PathBuf>,
}

impl InMemoryVectorStore {
    /// Create a new empty store that lives only in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store that writes its contents to `path` on every
    /// rebuild.
    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self { snapshot: RwLock::default(), path: Some(path.into()) }
    }

    /// Load a store previously written by a persistent store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the file is missing or does
    /// not contain a valid index.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            error!(path = %path.display(), error = %e, "failed to read index");
            RagError::index(BACKEND, format!("cannot read index at '{}': {e}", path.display()))
        })?;
        let snapshot: IndexSnapshot = serde_json::from_slice(&bytes).map_err(|e| {
            error!(path = %path.display(), error = %e, "corrupt index file");
            RagError::index(BACKEND, format!("corrupt index at '{}': {e}", path.display()))
        })?;

        info!(path = %path.display(), chunk_count = snapshot.entries.len(), "loaded index");
        Ok(Self { snapshot: RwLock::new(snapshot), path: Some(path.to_path_buf()) })
    }

    /// Location the store persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn persist(&self, path: &Path, snapshot: &IndexSnapshot) -> Result<()> {
        let write_err = |e: std::io::Error| {
            error!(path = %path.display(), error = %e, "failed to write index");
            RagError::index(BACKEND, format!("cannot write index at '{}': {e}", path.display()))
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let bytes = serde_json::to_vec(snapshot)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await.map_err(write_err)?;
        tokio::fs::rename(&tmp, path).await.map_err(write_err)?;
        Ok(())
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn rebuild(&self, model: &str, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(RagError::index(
                BACKEND,
                format!("{} chunks but {} vectors", chunks.len(), vectors.len()),
            ));
        }
        let dimensions = vectors.first().map_or(0, Vec::len);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dimensions) {
            let found = vectors[bad].len();
            return Err(RagError::index(
                BACKEND,
                format!("vector {bad} has {found} dimensions, expected {dimensions}"),
            ));
        }

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        let snapshot = IndexSnapshot { model: Some(model.to_string()), dimensions, entries };

        // Write lock is held across persistence: memory and file change together.
        let mut current = self.snapshot.write().await;
        if let Some(path) = &self.path {
            self.persist(path, &snapshot).await?;
        }
        let chunk_count = snapshot.entries.len();
        *current = snapshot;

        info!(backend = BACKEND, chunk_count, dimensions, "rebuilt index");
        Ok(())
    }

    async fn similarity_search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let snapshot = self.snapshot.read().await;
        if top_k == 0 || snapshot.entries.is_empty() {
            return Ok(Vec::new());
        }
        if embedding.len() != snapshot.dimensions {
            return Err(RagError::index(
                BACKEND,
                format!(
                    "query has {} dimensions but index has {}",
                    embedding.len(),
                    snapshot.dimensions
                ),
            ));
        }

        let mut scored: Vec<ScoredChunk> = snapshot
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(&entry.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.snapshot.read().await.entries.len())
    }

    async fn embedding_model(&self) -> Result<Option<String>> {
        Ok(self.snapshot.read().await.model.clone())
    }
}
