//! Generation provider implementations.
//!
//! The Gemini generator sends one `user` message containing the system
//! instructions and the question (see
//! [`single_turn_message`](opsdesk_core::prompt::single_turn_message)) and
//! returns the text of the first candidate.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use opsdesk_core::generation::{GenerateError, Generator};
use opsdesk_core::prompt::single_turn_message;

use crate::config::GenerationConfig;
use crate::gemini::{
    CallError, Content, GeminiClient, GenerateContentRequest, GenerateContentResponse,
};
use crate::secrets::{Secrets, GOOGLE_API_KEY};

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _system: &str, _question: &str) -> Result<String, GenerateError> {
        Err(GenerateError::Disabled)
    }
}

pub struct GeminiGenerator {
    client: GeminiClient,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(
                &config.base_url,
                &config.model,
                api_key,
                config.timeout_secs,
            )?,
        })
    }
}

impl From<CallError> for GenerateError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Request(msg) => GenerateError::Request(msg),
            CallError::Status { status, body } => GenerateError::Status { status, body },
            CallError::Malformed(msg) => GenerateError::Malformed(msg),
        }
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        self.client.model()
    }

    async fn generate(&self, system: &str, question: &str) -> Result<String, GenerateError> {
        let request = GenerateContentRequest {
            contents: vec![Content::text(
                Some("user"),
                &single_turn_message(system, question),
            )],
        };
        let response: GenerateContentResponse =
            self.client.call("generateContent", &request).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| GenerateError::Malformed("response has no candidates".to_string()))
    }
}

/// Build the configured generator. Requires `GOOGLE_API_KEY` for Gemini.
pub fn create_generator(
    config: &GenerationConfig,
    secrets: &Secrets,
) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(
            config,
            secrets.require(GOOGLE_API_KEY)?,
        )?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
