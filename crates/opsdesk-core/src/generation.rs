//! Answer generation provider trait.

use async_trait::async_trait;

/// Why a generation request failed.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("generation provider is disabled")]
    Disabled,
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation API error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed generation response: {0}")]
    Malformed(String),
}

/// A single-turn text generator.
///
/// Receives the full system instructions (rules plus retrieved context) and
/// the user's question. No conversation history is forwarded.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier (e.g. `"gemini-2.0-flash"`).
    fn model_name(&self) -> &str;
    async fn generate(&self, system: &str, question: &str) -> Result<String, GenerateError>;
}
