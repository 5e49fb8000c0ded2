//! Storage abstraction for the chunk table.
//!
//! The [`Store`] trait covers the three operations the pipelines need:
//! the ingestion dedup check, chunk inserts, and similarity search.
//! Backends: hosted PostgREST and SQLite (in the app crate) and
//! [`memory::InMemoryStore`] for tests.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChunkRecord, MatchedChunk};

/// Abstract chunk store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`source_exists`](Store::source_exists) | Has any chunk been stored for this filename? |
/// | [`insert_chunk`](Store::insert_chunk) | Append one chunk row |
/// | [`match_chunks`](Store::match_chunks) | Similarity search above a threshold |
#[async_trait]
pub trait Store: Send + Sync {
    /// Backend name for logs (e.g. `"sqlite"`).
    fn name(&self) -> &str;

    /// Whether at least one chunk has `metadata.source == source`.
    async fn source_exists(&self, source: &str) -> Result<bool>;

    /// Insert a single chunk row.
    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()>;

    /// Return at most `match_count` chunks whose similarity to `query`
    /// exceeds `match_threshold`. Ordering is backend-defined.
    async fn match_chunks(
        &self,
        query: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<MatchedChunk>>;
}

/// Sort by similarity (desc) and keep the top `match_count` rows above the threshold.
///
/// Shared by the backends that score locally.
pub fn rank_matches(
    mut scored: Vec<MatchedChunk>,
    match_threshold: f64,
    match_count: usize,
) -> Vec<MatchedChunk> {
    scored.retain(|m| m.similarity.unwrap_or(f64::MIN) > match_threshold);
    scored.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(match_count);
    scored
}
