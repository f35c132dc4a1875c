//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! cuts text into windows of at most `chunk_size` characters, preferring to
//! end a window on a paragraph, line, sentence or word boundary. Consecutive
//! chunks of one document always share exactly `chunk_overlap` characters.

use crate::document::{Chunk, Document};

/// Boundaries a chunk may end on, in order of preference.
const SEPARATORS: [&str; 8] = ["\n\n", "\n", "。", "！", "？", ". ", "! ", "? "];
const WORD_SEPARATOR: &str = " ";

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has no content.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split every document, preserving source order.
    fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|d| self.chunk(d)).collect()
    }
}

/// Splits text into overlapping windows that prefer natural boundaries.
///
/// Lengths are counted in characters, not bytes. Each chunk inherits the
/// parent document's metadata plus a `chunk_index` field.
///
/// # Example
///
/// ```rust,ignore
/// use kbqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(500, 50);
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks;
    ///   clamped below `chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self { chunk_size, chunk_overlap: chunk_overlap.min(chunk_size - 1) }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        split_text(&document.content, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let mut metadata = document.metadata.clone();
                metadata.insert("chunk_index".to_string(), i.into());
                Chunk { content, metadata }
            })
            .collect()
    }
}

/// Split `text` into windows of at most `chunk_size` characters where each
/// window starts `chunk_overlap` characters before the previous one ended.
///
/// Requires `chunk_overlap < chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || chunk_size == 0 || chunk_overlap >= chunk_size {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut start = 0;

    loop {
        let hard_end = (start + chunk_size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            // The next window starts at `end - overlap`, so it must move past `start`.
            find_boundary(&chars, start + chunk_overlap + 1, hard_end).unwrap_or(hard_end)
        };

        pieces.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start = end - chunk_overlap;
    }

    pieces
}

/// Latest position in `lo..=hi` that directly follows a separator, trying
/// separators in order of preference.
fn find_boundary(chars: &[char], lo: usize, hi: usize) -> Option<usize> {
    if lo > hi {
        return None;
    }
    SEPARATORS.iter().chain(std::iter::once(&WORD_SEPARATOR)).find_map(|separator| {
        let sep: Vec<char> = separator.chars().collect();
        (lo..=hi).rev().find(|&end| end >= sep.len() && chars[end - sep.len()..end] == sep[..])
    })
}
