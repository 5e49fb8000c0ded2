//! In-memory [`Store`] implementation for testing and WASM targets.
//!
//! Rows live in a `Vec` behind `std::sync::RwLock`. Similarity search is
//! brute-force cosine over every stored embedding.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkRecord, MatchedChunk};

use super::{rank_matches, Store};

/// In-memory chunk store.
pub struct InMemoryStore {
    rows: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every stored row, in insertion order.
    pub fn rows(&self) -> Vec<ChunkRecord> {
        self.rows.read().unwrap().clone()
    }

    /// Rows cut from a given file.
    pub fn rows_for_source(&self, source: &str) -> Vec<ChunkRecord> {
        self.rows
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.source() == source)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn source_exists(&self, source: &str) -> Result<bool> {
        Ok(self
            .rows
            .read()
            .unwrap()
            .iter()
            .any(|r| r.source() == source))
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        self.rows.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn match_chunks(
        &self,
        query: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<MatchedChunk>> {
        let rows = self.rows.read().unwrap();
        let scored = rows
            .iter()
            .map(|r| MatchedChunk {
                id: Some(r.id.clone()),
                content: r.content.clone(),
                metadata: Some(r.metadata.clone()),
                category: Some(r.category.clone()),
                similarity: Some(cosine_similarity(query, &r.embedding) as f64),
            })
            .collect();
        Ok(rank_matches(scored, match_threshold, match_count))
    }
}
