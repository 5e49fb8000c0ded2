//! Query pipeline: embed the question, retrieve chunks, generate a grounded answer.
//!
//! Retrieval never fails from the caller's point of view. An embedding or
//! search error is logged and the answer is generated with the no-context
//! marker instead. Generation errors are returned so the front end can
//! report them and leave the question pending.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::embedding::{EmbedError, EmbedIntent, Embedder};
use crate::generation::{GenerateError, Generator};
use crate::models::MatchedChunk;
use crate::prompt::{build_context_block, source_previews, PromptTemplate, PREVIEW_CHARS};
use crate::session::ChatSession;
use crate::store::Store;

/// Retrieval knobs.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalParams {
    pub match_threshold: f64,
    pub match_count: usize,
    pub preview_chars: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            match_threshold: 0.4,
            match_count: 5,
            preview_chars: PREVIEW_CHARS,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embed(#[from] EmbedError),
    #[error("similarity search failed: {0}")]
    Search(anyhow::Error),
}

/// A generated answer and the previews of the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Wires an embedder, a store, and a generator into the question/answer flow.
pub struct Assistant {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn Store>,
    generator: Arc<dyn Generator>,
    params: RetrievalParams,
    prompt: PromptTemplate,
}

impl Assistant {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn Store>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            embedder,
            store,
            generator,
            params: RetrievalParams::default(),
            prompt: PromptTemplate::default(),
        }
    }

    pub fn with_params(mut self, params: RetrievalParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Embed the question as a query and run the similarity search.
    pub async fn try_retrieve(&self, question: &str) -> Result<Vec<MatchedChunk>, RetrievalError> {
        let query = self.embedder.embed(question, EmbedIntent::Query).await?;
        let mut hits = self
            .store
            .match_chunks(&query, self.params.match_threshold, self.params.match_count)
            .await
            .map_err(RetrievalError::Search)?;
        hits.truncate(self.params.match_count);
        Ok(hits)
    }

    /// Like [`try_retrieve`](Self::try_retrieve), but any failure yields an empty list.
    pub async fn retrieve(&self, question: &str) -> Vec<MatchedChunk> {
        match self.try_retrieve(question).await {
            Ok(hits) => {
                tracing::debug!(hits = hits.len(), store = self.store.name(), "retrieved context");
                hits
            }
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed, answering without context");
                Vec::new()
            }
        }
    }

    /// Generate an answer from already retrieved chunks.
    pub async fn answer_with(
        &self,
        question: &str,
        chunks: &[MatchedChunk],
    ) -> Result<Answer, GenerateError> {
        let system = self.prompt.system_instructions(&build_context_block(chunks));
        let answer = self.generator.generate(&system, question).await?;
        Ok(Answer {
            answer,
            sources: source_previews(chunks, self.params.preview_chars),
        })
    }

    /// Full single-turn pipeline for one question.
    pub async fn ask(&self, question: &str) -> Result<Answer, GenerateError> {
        let chunks = self.retrieve(question).await;
        self.answer_with(question, &chunks).await
    }

    /// Answer the session's pending question, if any, and record the reply.
    ///
    /// Returns `Ok(None)` when the last turn is not an unanswered question.
    /// On error the question stays pending.
    pub async fn respond(&self, session: &mut ChatSession) -> Result<Option<Answer>, GenerateError> {
        let Some(question) = session.pending_question().map(str::to_string) else {
            return Ok(None);
        };
        let answer = self.ask(&question).await?;
        session.record_answer(answer.answer.clone());
        Ok(Some(answer))
    }
}
