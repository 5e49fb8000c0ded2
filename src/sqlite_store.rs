//! SQLite-backed [`Store`] implementation.
//!
//! Chunks live in a single `documents` table created by `opsdesk init`.
//! Embeddings are little-endian `f32` BLOBs and similarity search is a
//! brute-force cosine scan, ranked with [`rank_matches`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use opsdesk_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use opsdesk_core::models::{ChunkMetadata, ChunkRecord, MatchedChunk};
use opsdesk_core::store::{rank_matches, Store};

/// Open the database at `path` in WAL mode, creating the file and its
/// parent directory when missing.
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn source_exists(&self, source: &str) -> Result<bool> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE source = ? LIMIT 1")
                .bind(source)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.is_some())
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let metadata_json = serde_json::to_string(&record.metadata)?;
        sqlx::query(
            r#"
            INSERT INTO documents (id, content, source, metadata_json, category, embedding, dims, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.content)
        .bind(record.source())
        .bind(&metadata_json)
        .bind(&record.category)
        .bind(vec_to_blob(&record.embedding))
        .bind(record.embedding.len() as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert chunk for {}", record.source()))?;
        Ok(())
    }

    async fn match_chunks(
        &self,
        query: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<MatchedChunk>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata_json, category, embedding FROM documents WHERE dims = ?",
        )
        .bind(query.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let metadata_json: String = row.get("metadata_json");
            let metadata: Option<ChunkMetadata> = serde_json::from_str(&metadata_json).ok();
            scored.push(MatchedChunk {
                id: Some(row.get("id")),
                content: row.get("content"),
                metadata,
                category: Some(row.get("category")),
                similarity: Some(cosine_similarity(query, &blob_to_vec(&blob)) as f64),
            });
        }

        Ok(rank_matches(scored, match_threshold, match_count))
    }
}
