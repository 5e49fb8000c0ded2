//! Core data models shared by the ingestion and query pipelines.
//!
//! [`ChunkRecord`] is the persisted row written by ingestion; [`MatchedChunk`]
//! is what a similarity search hands back to the query pipeline.

use serde::{Deserialize, Serialize};

/// Category label attached to every ingested chunk unless configured otherwise.
pub const DEFAULT_CATEGORY: &str = "corporativo";

/// Metadata stored alongside a chunk.
///
/// `source` is the original filename and doubles as the deduplication key
/// for the ingestion pipeline. Unknown keys written by other tools are kept
/// in `extra` so that rows read back from a shared table round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChunkMetadata {
    pub fn for_source(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            chunk_index: None,
            strategy: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// A document chunk ready to be written to the store.
///
/// Created once by ingestion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub category: String,
    pub embedding: Vec<f32>,
}

impl ChunkRecord {
    pub fn new(
        content: impl Into<String>,
        metadata: ChunkMetadata,
        category: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            metadata,
            category: category.into(),
            embedding,
        }
    }

    /// Filename this chunk was cut from.
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

/// A stored chunk returned by a similarity search.
///
/// Backends are only required to return `content`; the remaining fields are
/// filled in when the backend provides them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedChunk {
    #[serde(default, deserialize_with = "id_as_string")]
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<ChunkMetadata>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
}

impl MatchedChunk {
    pub fn source(&self) -> Option<&str> {
        self.metadata.as_ref().map(|m| m.source.as_str())
    }
}

/// Hosted tables use either bigint or uuid primary keys.
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
