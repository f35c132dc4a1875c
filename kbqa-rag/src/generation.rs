//! Answer generation: prompt assembly, model call, and structured-output
//! recovery.
//!
//! [`GenerationStage::generate`] never fails. Transport errors are treated as
//! an empty response, and any response that does not parse into the expected
//! JSON object becomes [`StructuredAnswer::parse_failure`].

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::answer::{ContextRecord, StructuredAnswer};
use crate::document::ScoredChunk;
use crate::error::{RagError, Result};
use crate::prompt::PromptSpec;
use crate::provider::GenerationProvider;

/// Separator placed between chunk contents in the prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// The JSON object the model is asked to produce.
///
/// Models are loose with field types, so every field accepts `null`, numbers
/// and booleans, and `reasoning_steps` also accepts a single string.
#[derive(Debug, Deserialize)]
struct ModelAnswer {
    #[serde(default, deserialize_with = "lenient_steps")]
    reasoning_steps: Vec<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    reasoning_summary: String,
    #[serde(default, deserialize_with = "lenient_text")]
    relevant_context: String,
    #[serde(default, deserialize_with = "lenient_text")]
    final_answer: String,
}

fn value_to_text(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(value_to_text)
}

fn lenient_steps<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let steps = match Value::deserialize(deserializer)? {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().map(value_to_text).collect(),
        other => vec![value_to_text(other)],
    };
    Ok(steps.into_iter().filter(|s| !s.is_empty()).collect())
}

/// Calls the generation model and turns its output into a [`StructuredAnswer`].
#[derive(Clone)]
pub struct GenerationStage {
    provider: Arc<dyn GenerationProvider>,
}

impl GenerationStage {
    /// Create a stage backed by `provider`.
    pub fn new(provider: Arc<dyn GenerationProvider>) -> Self {
        Self { provider }
    }

    /// Generate the answer to `question` from `chunks` using `prompt`.
    pub async fn generate(
        &self,
        question: &str,
        prompt: &PromptSpec,
        chunks: &[ScoredChunk],
    ) -> StructuredAnswer {
        let context = build_context(chunks);
        let user_prompt = prompt.render(question, &context);

        info!(chunk_count = chunks.len(), prompt_len = user_prompt.len(), "generating answer");
        let raw_response =
            match self.provider.generate(&prompt.system_prompt, &user_prompt).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "generation failed, treating response as empty");
                    String::new()
                }
            };
        debug!(raw_response = %raw_response, "model response");

        parse_answer(&raw_response, chunks)
    }
}

/// Join chunk contents with [`CONTEXT_SEPARATOR`].
pub fn build_context(chunks: &[ScoredChunk]) -> String {
    chunks.iter().map(|c| c.chunk.content.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// Strip code fences and repair the invalid `\%` / `\\%` escapes some models
/// emit.
pub fn clean_response(raw: &str) -> String {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let unfenced = unfenced.strip_suffix("```").unwrap_or(unfenced);

    unfenced.trim().replace("\\\\%", "%").replace("\\%", "%")
}

fn parse_model_answer(cleaned: &str) -> Result<ModelAnswer> {
    let value: Value =
        serde_json::from_str(cleaned).map_err(|e| RagError::ParseError(e.to_string()))?;
    if !value.is_object() {
        return Err(RagError::ParseError("model response is not a JSON object".to_string()));
    }
    serde_json::from_value(value).map_err(|e| RagError::ParseError(e.to_string()))
}

/// Parse a raw model response into a [`StructuredAnswer`] carrying `chunks`
/// as its `raw_context`, falling back to the parse-failure answer.
pub fn parse_answer(raw_response: &str, chunks: &[ScoredChunk]) -> StructuredAnswer {
    match parse_model_answer(&clean_response(raw_response)) {
        Ok(parsed) => StructuredAnswer {
            reasoning_steps: parsed.reasoning_steps,
            reasoning_summary: parsed.reasoning_summary,
            relevant_context: parsed.relevant_context,
            final_answer: parsed.final_answer,
            raw_context: chunks.iter().map(ContextRecord::from).collect(),
        },
        Err(e) => {
            warn!(error = %e, "failed to parse model response");
            StructuredAnswer::parse_failure(raw_response, chunks)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_fence() {
        assert_eq!(clean_response("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(clean_response("  ```json\n{}\n```  "), "{}");
    }

    #[test]
    fn repairs_single_and_double_escaped_percent() {
        assert_eq!(clean_response(r#"{"a":"50\%","b":"7\\%"}"#), r#"{"a":"50%","b":"7%"}"#);
    }

    #[test]
    fn loose_field_types_are_coerced() {
        let parsed = parse_model_answer(
            r#"{"reasoning_steps": "one step", "reasoning_summary": true,
                "relevant_context": null, "final_answer": 3}"#,
        )
        .unwrap();
        assert_eq!(parsed.reasoning_steps, vec!["one step"]);
        assert_eq!(parsed.reasoning_summary, "true");
        assert_eq!(parsed.relevant_context, "");
        assert_eq!(parsed.final_answer, "3");
    }

    #[test]
    fn null_steps_become_empty() {
        let parsed =
            parse_model_answer(r#"{"reasoning_steps": null, "final_answer": "a"}"#).unwrap();
        assert!(parsed.reasoning_steps.is_empty());
    }

    #[test]
    fn array_payload_is_parse_error() {
        assert!(matches!(parse_model_answer("[1, 2]"), Err(RagError::ParseError(_))));
    }
}
