//! Hosted [`Store`] backed by a Supabase project (PostgREST).
//!
//! | Operation | Request |
//! |-----------|---------|
//! | dedup | `GET /rest/v1/{table}?select=id&metadata->>source=eq.{file}&limit=1` |
//! | insert | `POST /rest/v1/{table}` with `Prefer: return=minimal` |
//! | search | `POST /rest/v1/rpc/{match_function}` |
//!
//! Every request carries the `apikey` header and a bearer token with the
//! same key. Ranking for search is done by the database function.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use opsdesk_core::models::{ChunkMetadata, ChunkRecord, MatchedChunk};
use opsdesk_core::store::Store;

use crate::config::StoreConfig;

pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
    key: String,
    table: String,
    match_function: String,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    content: &'a str,
    metadata: &'a ChunkMetadata,
    category: &'a str,
    embedding: &'a [f32],
}

#[derive(Serialize)]
struct MatchRequest<'a> {
    query_embedding: &'a [f32],
    match_threshold: f64,
    match_count: usize,
}

impl SupabaseStore {
    pub fn new(config: &StoreConfig, url: &str, key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            key: key.to_string(),
            table: config.table.clone(),
            match_function: config.match_function.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }
}

async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    bail!("Supabase {} failed with {}: {}", what, status, body)
}

#[async_trait]
impl Store for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn source_exists(&self, source: &str) -> Result<bool> {
        let filter = format!("eq.{}", source);
        let response = self
            .request(reqwest::Method::GET, &self.table)
            .query(&[
                ("select", "id"),
                ("metadata->>source", filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let rows: Vec<serde_json::Value> = check(response, "dedup lookup").await?.json().await?;
        Ok(!rows.is_empty())
    }

    async fn insert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let row = InsertRow {
            content: &record.content,
            metadata: &record.metadata,
            category: &record.category,
            embedding: &record.embedding,
        };
        let response = self
            .request(reqwest::Method::POST, &self.table)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        check(response, "insert").await?;
        Ok(())
    }

    async fn match_chunks(
        &self,
        query: &[f32],
        match_threshold: f64,
        match_count: usize,
    ) -> Result<Vec<MatchedChunk>> {
        let body = MatchRequest {
            query_embedding: query,
            match_threshold,
            match_count,
        };
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("rpc/{}", self.match_function),
            )
            .json(&body)
            .send()
            .await?;
        let rows: Vec<MatchedChunk> = check(response, "similarity search").await?.json().await?;
        Ok(rows)
    }
}
