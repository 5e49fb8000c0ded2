//! Embedding provider implementations.
//!
//! - **[`DisabledEmbedder`]**: fails every request; used when `embedding.provider = "disabled"`.
//! - **[`GeminiEmbedder`]**: calls `models/{model}:embedContent` with a `taskType`
//!   matching the [`EmbedIntent`].
//!
//! Use [`create_embedder`] to build the configured one.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use opsdesk_core::embedding::{check_dims, EmbedError, EmbedIntent, Embedder};

use crate::config::EmbeddingConfig;
use crate::gemini::{CallError, Content, EmbedContentRequest, EmbedContentResponse, GeminiClient};
use crate::secrets::{Secrets, GOOGLE_API_KEY};

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _text: &str, _intent: EmbedIntent) -> Result<Vec<f32>, EmbedError> {
        Err(EmbedError::Disabled)
    }
}

pub struct GeminiEmbedder {
    client: GeminiClient,
    dims: usize,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: GeminiClient::new(
                &config.base_url,
                &config.model,
                api_key,
                config.timeout_secs,
            )?,
            dims: config.dims,
        })
    }
}

impl From<CallError> for EmbedError {
    fn from(e: CallError) -> Self {
        match e {
            CallError::Request(msg) => EmbedError::Request(msg),
            CallError::Status { status, body } => EmbedError::Status { status, body },
            CallError::Malformed(msg) => EmbedError::Malformed(msg),
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        self.client.model()
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str, intent: EmbedIntent) -> Result<Vec<f32>, EmbedError> {
        let request = EmbedContentRequest {
            model: format!("models/{}", self.client.model()),
            content: Content::text(None, text),
            task_type: intent.task_type(),
        };
        let response: EmbedContentResponse = self.client.call("embedContent", &request).await?;
        let values = response
            .embedding
            .map(|e| e.values)
            .ok_or_else(|| EmbedError::Malformed("missing embedding".to_string()))?;
        check_dims(values, self.dims)
    }
}

/// Build the configured embedder. Requires `GOOGLE_API_KEY` for Gemini.
pub fn create_embedder(config: &EmbeddingConfig, secrets: &Secrets) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(
            config,
            secrets.require(GOOGLE_API_KEY)?,
        )?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
