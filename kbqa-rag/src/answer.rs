//! The structured answer returned for every question.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Metadata, ScoredChunk};

/// Fallback text used when the model response cannot be parsed.
pub const PARSE_FAILURE_STEP: &str = "unable to parse model response";
/// Summary shown when the model response cannot be parsed.
pub const PARSE_FAILURE_SUMMARY: &str =
    "The model returned a response in an unexpected format. Please try again later.";
/// Final answer shown when the model response cannot be parsed.
pub const PARSE_FAILURE_ANSWER: &str = "Sorry, an error occurred while processing your request.";
/// Summary shown when retrieval found nothing.
pub const NO_RESULTS_SUMMARY: &str = "No relevant documents were found.";
/// Final answer shown when retrieval found nothing.
pub const NO_RESULTS_ANSWER: &str =
    "Sorry, I could not find any information related to your question in the knowledge base.";

/// A retrieved chunk as exposed to callers: its text plus its metadata
/// augmented with the similarity `score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContextRecord {
    /// The chunk text.
    pub page_content: String,
    /// Chunk metadata plus `score`.
    pub metadata: Metadata,
}

impl From<&ScoredChunk> for ContextRecord {
    fn from(scored: &ScoredChunk) -> Self {
        let mut metadata = scored.chunk.metadata.clone();
        metadata.insert("score".to_string(), Value::from(f64::from(scored.score)));
        Self { page_content: scored.chunk.content.clone(), metadata }
    }
}

/// The answer to one question.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredAnswer {
    /// Ordered reasoning steps.
    #[serde(default)]
    pub reasoning_steps: Vec<String>,
    /// One-paragraph summary of the reasoning.
    #[serde(default)]
    pub reasoning_summary: String,
    /// The parts of the context the answer relies on.
    #[serde(default)]
    pub relevant_context: String,
    /// The answer itself.
    #[serde(default)]
    pub final_answer: String,
    /// The chunks the answer was generated from.
    #[serde(default)]
    pub raw_context: Vec<ContextRecord>,
}

impl StructuredAnswer {
    /// The fixed answer returned when retrieval finds no chunks.
    pub fn no_results() -> Self {
        Self {
            reasoning_steps: Vec::new(),
            reasoning_summary: NO_RESULTS_SUMMARY.to_string(),
            relevant_context: String::new(),
            final_answer: NO_RESULTS_ANSWER.to_string(),
            raw_context: Vec::new(),
        }
    }

    /// The answer returned when the model response cannot be parsed.
    /// `raw_response` is kept verbatim in `relevant_context` for diagnosis.
    pub fn parse_failure(raw_response: &str, chunks: &[ScoredChunk]) -> Self {
        Self {
            reasoning_steps: vec![PARSE_FAILURE_STEP.to_string()],
            reasoning_summary: PARSE_FAILURE_SUMMARY.to_string(),
            relevant_context: raw_response.to_string(),
            final_answer: PARSE_FAILURE_ANSWER.to_string(),
            raw_context: chunks.iter().map(ContextRecord::from).collect(),
        }
    }

    /// Whether this is the parse-failure answer.
    pub fn is_parse_failure(&self) -> bool {
        self.final_answer == PARSE_FAILURE_ANSWER
            && self.reasoning_steps.first().is_some_and(|s| s == PARSE_FAILURE_STEP)
    }
}

/// One entry of a batch question file. Only `text` is read; other fields
/// are carried along untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuestionRecord {
    /// The question text.
    #[serde(default)]
    pub text: Option<String>,
    /// Any other fields of the record.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl QuestionRecord {
    /// Create a record holding only a question.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), extra: serde_json::Map::new() }
    }
}
