//! Prompt templates and their selection by question intent.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// System instruction used when no intent matches.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional assistant who answers questions \
strictly from the context provided with each question.";

/// Template used when no intent matches. It asks for the four fields of a
/// [`StructuredAnswer`](crate::StructuredAnswer).
pub const DEFAULT_TEMPLATE: &str = r#"Answer the question using only the background information below.

Background information:
---
{context}
---

Question: "{question}"

Think step by step. Return only a JSON object in exactly this shape, with no text before or after it:
{{
  "reasoning_steps": ["step 1", "step 2"],
  "reasoning_summary": "a short summary of the reasoning",
  "relevant_context": "the passages from the background information the answer relies on",
  "final_answer": "the final answer; say so if the background information does not contain it"
}}
"#;

/// A system instruction paired with a user prompt template.
///
/// Templates contain `{question}` and `{context}` placeholders; `{{` and `}}`
/// render as literal braces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PromptSpec {
    /// The system instruction.
    pub system_prompt: String,
    /// The user prompt template.
    pub template: String,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptSpec {
    /// Fill the template's placeholders. Unknown placeholders are left as-is.
    pub fn render(&self, question: &str, context: &str) -> String {
        let template = self.template.as_str();
        let mut out = String::with_capacity(template.len() + question.len() + context.len());
        let mut rest = template;

        while let Some(pos) = rest.find(['{', '}']) {
            out.push_str(&rest[..pos]);
            rest = &rest[pos..];
            if let Some(tail) = rest.strip_prefix("{{") {
                out.push('{');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("}}") {
                out.push('}');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("{question}") {
                out.push_str(question);
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("{context}") {
                out.push_str(context);
                rest = tail;
            } else {
                out.push_str(&rest[..1]);
                rest = &rest[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Chooses the prompt for a question.
pub trait PromptSelector: Send + Sync {
    /// Return the prompt to use for `question`.
    fn select(&self, question: &str) -> PromptSpec;
}

/// A keyword-triggered prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Intent {
    /// Name used in logs.
    pub name: String,
    /// Keywords looked for in the lowercased question.
    pub keywords: Vec<String>,
    /// Require every keyword instead of any one of them.
    #[serde(default)]
    pub match_all: bool,
    /// Prompt used when the intent matches.
    pub prompt: PromptSpec,
}

impl Intent {
    fn matches(&self, question: &str) -> bool {
        let mut hits = self.keywords.iter().map(|k| question.contains(&k.to_lowercase()));
        if self.match_all { hits.all(|hit| hit) } else { hits.any(|hit| hit) }
    }
}

/// Selects the first [`Intent`] whose keywords match, or the default prompt.
#[derive(Debug, Clone, Default)]
pub struct KeywordPromptSelector {
    intents: Vec<Intent>,
    default: PromptSpec,
}

impl KeywordPromptSelector {
    /// Create a selector with no intents and the default prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an intent. Intents are tried in insertion order.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intents.push(intent);
        self
    }

    /// Replace the default prompt.
    pub fn with_default(mut self, prompt: PromptSpec) -> Self {
        self.default = prompt;
        self
    }
}

impl PromptSelector for KeywordPromptSelector {
    fn select(&self, question: &str) -> PromptSpec {
        let question = question.to_lowercase();
        match self.intents.iter().find(|intent| intent.matches(&question)) {
            Some(intent) => {
                debug!(intent = %intent.name, "matched prompt intent");
                intent.prompt.clone()
            }
            None => self.default.clone(),
        }
    }
}
