//! Prompt assembly for grounded answers.
//!
//! The generation request is a single turn made of fixed instructions, the
//! retrieved context block, and the user's question. Nothing from earlier
//! turns is forwarded.

use crate::models::MatchedChunk;

/// Context block used when retrieval produced nothing.
pub const NO_CONTEXT_MARKER: &str = "No specific information was found.";

/// Default persona line.
pub const DEFAULT_ASSISTANT_NAME: &str = "Operations Assistant";

/// Length of each source preview, in characters.
pub const PREVIEW_CHARS: usize = 100;

const RULES: [&str; 4] = [
    "Use ONLY the information under \"RETRIEVED CONTEXT\".",
    "Explain in plain language, with simple analogies when they help.",
    "ALWAYS cite the source (e.g. Art. 203).",
    "If you do not know, say so honestly.",
];

/// Static instructional prompt with a configurable persona.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub assistant_name: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            assistant_name: DEFAULT_ASSISTANT_NAME.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(assistant_name: impl Into<String>) -> Self {
        Self {
            assistant_name: assistant_name.into(),
        }
    }

    /// Instructions plus the context block.
    pub fn system_instructions(&self, context_block: &str) -> String {
        let mut out = format!("You are {}.\nINSTRUCTIONS:\n", self.assistant_name);
        for (i, rule) in RULES.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, rule));
        }
        out.push_str("\nRETRIEVED CONTEXT:\n");
        out.push_str(context_block);
        out
    }
}

/// Concatenate retrieved chunks, each preceded by a `---` separator line.
pub fn build_context_block(chunks: &[MatchedChunk]) -> String {
    if chunks.is_empty() {
        return NO_CONTEXT_MARKER.to_string();
    }
    chunks
        .iter()
        .map(|c| format!("---\n{}\n", c.content))
        .collect()
}

/// The single message sent to the model.
pub fn single_turn_message(system: &str, question: &str) -> String {
    format!("System: {}\n\nUser: {}", system, question)
}

/// First `max_chars` characters of a chunk, newlines flattened, with an ellipsis.
pub fn source_preview(content: &str, max_chars: usize) -> String {
    let head: String = content.chars().take(max_chars).collect();
    format!("{}...", head.replace('\n', " "))
}

/// One preview per retrieved chunk, in retrieval order.
pub fn source_previews(chunks: &[MatchedChunk], max_chars: usize) -> Vec<String> {
    chunks
        .iter()
        .map(|c| source_preview(&c.content, max_chars))
        .collect()
}
