//! Gemini and Supabase clients against a local mock server.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use opsdesk::config::{EmbeddingConfig, GenerationConfig, StoreConfig};
use opsdesk::embedding::GeminiEmbedder;
use opsdesk::generation::GeminiGenerator;
use opsdesk::supabase::SupabaseStore;
use opsdesk_core::embedding::{EmbedError, EmbedIntent, Embedder};
use opsdesk_core::generation::{GenerateError, Generator};
use opsdesk_core::models::{ChunkMetadata, ChunkRecord};
use opsdesk_core::store::Store;

const API_KEY: &str = "test-google-key";
const SUPABASE_KEY: &str = "test-service-key";

/// One request as seen by the mock.
#[derive(Debug, Clone)]
struct Seen {
    path: String,
    headers: HeaderMap,
    query: HashMap<String, String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Mock {
    seen: Arc<Mutex<Vec<Seen>>>,
    /// Sources the fake `documents` table already holds.
    known_sources: Arc<Vec<String>>,
}

impl Mock {
    fn record(&self, path: String, headers: HeaderMap, query: HashMap<String, String>, body: Value) {
        self.seen.lock().unwrap().push(Seen {
            path,
            headers,
            query,
            body,
        });
    }

    fn last(&self) -> Seen {
        self.seen.lock().unwrap().last().cloned().unwrap()
    }
}

async fn gemini(
    State(mock): State<Mock>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let authorized = headers.get("x-goog-api-key").map(|v| v.as_bytes()) == Some(API_KEY.as_bytes());
    mock.record(call.clone(), headers, HashMap::new(), body.clone());
    if !authorized {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"})));
    }

    let (model, method) = call.split_once(':').unwrap_or((call.as_str(), ""));
    match (model, method) {
        ("quota-model", _) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": {"message": "quota exceeded"}})),
        ),
        ("short-model", "embedContent") => (
            StatusCode::OK,
            Json(json!({"embedding": {"values": [0.1, 0.2]}})),
        ),
        (_, "embedContent") => (
            StatusCode::OK,
            Json(json!({"embedding": {"values": [0.1, 0.2, 0.3]}})),
        ),
        ("empty-model", "generateContent") => (StatusCode::OK, Json(json!({"candidates": []}))),
        (_, "generateContent") => (
            StatusCode::OK,
            Json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "Según el Art. 3, sí."}]}}]
            })),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({}))),
    }
}

async fn table_get(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    mock.record(format!("GET {}", table), headers, query.clone(), Value::Null);
    if table == "broken" {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "boom"})));
    }
    let source = query
        .get("metadata->>source")
        .and_then(|f| f.strip_prefix("eq."))
        .unwrap_or_default();
    if mock.known_sources.iter().any(|s| s == source) {
        (StatusCode::OK, Json(json!([{"id": 7}])))
    } else {
        (StatusCode::OK, Json(json!([])))
    }
}

async fn table_post(
    State(mock): State<Mock>,
    Path(table): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    mock.record(format!("POST {}", table), headers, HashMap::new(), body);
    if table == "broken" {
        StatusCode::CONFLICT
    } else {
        StatusCode::CREATED
    }
}

async fn rpc(
    State(mock): State<Mock>,
    Path(function): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.record(format!("RPC {}", function), headers, HashMap::new(), body);
    Json(json!([
        {
            "id": 12,
            "content": "Artículo 3 Las regalías se pagan sobre el valor bruto.",
            "metadata": {"source": "ley.pdf", "chunk_index": 2},
            "category": "corporativo",
            "similarity": 0.83
        },
        {
            "id": "9b7c",
            "content": "Artículo 9 El informe técnico es anual.",
            "similarity": 0.51
        }
    ]))
}

async fn spawn_mock(known_sources: &[&str]) -> (String, Mock) {
    let mock = Mock {
        seen: Arc::default(),
        known_sources: Arc::new(known_sources.iter().map(|s| s.to_string()).collect()),
    };
    let app = Router::new()
        .route("/models/{call}", post(gemini))
        .route("/rest/v1/rpc/{function}", post(rpc))
        .route("/rest/v1/{table}", get(table_get).post(table_post))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), mock)
}

fn embedding_config(base_url: &str, model: &str) -> EmbeddingConfig {
    EmbeddingConfig {
        model: model.to_string(),
        dims: 3,
        base_url: base_url.to_string(),
        ..Default::default()
    }
}

fn generation_config(base_url: &str, model: &str) -> GenerationConfig {
    GenerationConfig {
        model: model.to_string(),
        base_url: base_url.to_string(),
        ..Default::default()
    }
}

fn store_config(table: &str) -> StoreConfig {
    StoreConfig {
        table: table.to_string(),
        ..Default::default()
    }
}

// ============ Gemini ============

#[tokio::test]
async fn test_embed_sends_task_type_per_intent() {
    let (base, mock) = spawn_mock(&[]).await;
    let embedder = GeminiEmbedder::new(&embedding_config(&base, "embed-model"), API_KEY).unwrap();

    let v = embedder.embed("Artículo 1", EmbedIntent::Document).await.unwrap();
    assert_eq!(v, vec![0.1, 0.2, 0.3]);
    let seen = mock.last();
    assert_eq!(seen.path, "embed-model:embedContent");
    assert_eq!(seen.body["model"], "models/embed-model");
    assert_eq!(seen.body["taskType"], "RETRIEVAL_DOCUMENT");
    assert_eq!(seen.body["content"]["parts"][0]["text"], "Artículo 1");

    embedder.embed("¿regalías?", EmbedIntent::Query).await.unwrap();
    assert_eq!(mock.last().body["taskType"], "RETRIEVAL_QUERY");
}

#[tokio::test]
async fn test_embed_rejects_wrong_dimension() {
    let (base, _mock) = spawn_mock(&[]).await;
    let embedder = GeminiEmbedder::new(&embedding_config(&base, "short-model"), API_KEY).unwrap();

    let err = embedder.embed("hola", EmbedIntent::Query).await.unwrap_err();
    assert!(matches!(err, EmbedError::DimensionMismatch { .. }), "{:?}", err);
}

#[tokio::test]
async fn test_embed_status_error_is_not_retried() {
    let (base, mock) = spawn_mock(&[]).await;
    let embedder = GeminiEmbedder::new(&embedding_config(&base, "quota-model"), API_KEY).unwrap();

    let err = embedder.embed("hola", EmbedIntent::Document).await.unwrap_err();
    match err {
        EmbedError::Status { status, body } => {
            assert_eq!(status, 429);
            assert!(body.contains("quota"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(mock.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_embed_wrong_key_is_status_error() {
    let (base, _mock) = spawn_mock(&[]).await;
    let embedder = GeminiEmbedder::new(&embedding_config(&base, "embed-model"), "nope").unwrap();

    let err = embedder.embed("hola", EmbedIntent::Query).await.unwrap_err();
    assert!(matches!(err, EmbedError::Status { status: 403, .. }));
}

#[tokio::test]
async fn test_generate_sends_one_user_message() {
    let (base, mock) = spawn_mock(&[]).await;
    let generator = GeminiGenerator::new(&generation_config(&base, "chat-model"), API_KEY).unwrap();

    let answer = generator
        .generate("You are a helper.", "¿Qué dice el Art. 3?")
        .await
        .unwrap();
    assert_eq!(answer, "Según el Art. 3, sí.");

    let seen = mock.last();
    assert_eq!(seen.path, "chat-model:generateContent");
    let contents = seen.body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 1);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(
        contents[0]["parts"][0]["text"],
        "System: You are a helper.\n\nUser: ¿Qué dice el Art. 3?"
    );
}

#[tokio::test]
async fn test_generate_errors_surface() {
    let (base, _mock) = spawn_mock(&[]).await;

    let quota = GeminiGenerator::new(&generation_config(&base, "quota-model"), API_KEY).unwrap();
    let err = quota.generate("s", "q").await.unwrap_err();
    assert!(matches!(err, GenerateError::Status { status: 429, .. }));

    let empty = GeminiGenerator::new(&generation_config(&base, "empty-model"), API_KEY).unwrap();
    let err = empty.generate("s", "q").await.unwrap_err();
    assert!(matches!(err, GenerateError::Malformed(_)));
}

#[tokio::test]
async fn test_unreachable_provider_is_request_error() {
    let embedder = GeminiEmbedder::new(
        &embedding_config("http://127.0.0.1:9", "embed-model"),
        API_KEY,
    )
    .unwrap();
    let err = embedder.embed("hola", EmbedIntent::Query).await.unwrap_err();
    assert!(matches!(err, EmbedError::Request(_)));
}

// ============ Supabase ============

#[tokio::test]
async fn test_dedup_lookup_filters_on_metadata_source() {
    let (base, mock) = spawn_mock(&["ley.pdf"]).await;
    let store = SupabaseStore::new(&store_config("documents"), &base, SUPABASE_KEY).unwrap();

    assert!(store.source_exists("ley.pdf").await.unwrap());
    let seen = mock.last();
    assert_eq!(seen.path, "GET documents");
    assert_eq!(seen.query.get("metadata->>source").unwrap(), "eq.ley.pdf");
    assert_eq!(seen.query.get("limit").unwrap(), "1");
    assert_eq!(seen.headers.get("apikey").unwrap(), SUPABASE_KEY);
    assert_eq!(
        seen.headers.get("authorization").unwrap(),
        &format!("Bearer {}", SUPABASE_KEY)
    );

    assert!(!store.source_exists("otro.pdf").await.unwrap());
}

#[tokio::test]
async fn test_insert_posts_row_with_minimal_return() {
    let (base, mock) = spawn_mock(&[]).await;
    let store = SupabaseStore::new(&store_config("documents"), &base, SUPABASE_KEY).unwrap();

    let mut metadata = ChunkMetadata::for_source("ley.pdf");
    metadata.chunk_index = Some(4);
    let record = ChunkRecord::new("Artículo 5 ...", metadata, "corporativo", vec![0.5, 0.5]);
    store.insert_chunk(&record).await.unwrap();

    let seen = mock.last();
    assert_eq!(seen.path, "POST documents");
    assert_eq!(seen.headers.get("prefer").unwrap(), "return=minimal");
    assert_eq!(seen.body["content"], "Artículo 5 ...");
    assert_eq!(seen.body["metadata"]["source"], "ley.pdf");
    assert_eq!(seen.body["metadata"]["chunk_index"], 4);
    assert_eq!(seen.body["category"], "corporativo");
    assert_eq!(seen.body["embedding"], json!([0.5, 0.5]));
}

#[tokio::test]
async fn test_match_calls_rpc_and_parses_rows() {
    let (base, mock) = spawn_mock(&[]).await;
    let store = SupabaseStore::new(&store_config("documents"), &base, SUPABASE_KEY).unwrap();

    let hits = store.match_chunks(&[1.0, 0.0], 0.4, 5).await.unwrap();

    let seen = mock.last();
    assert_eq!(seen.path, "RPC match_documents");
    assert_eq!(seen.body["match_threshold"], 0.4);
    assert_eq!(seen.body["match_count"], 5);
    assert_eq!(seen.body["query_embedding"], json!([1.0, 0.0]));

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id.as_deref(), Some("12"));
    assert_eq!(hits[0].source(), Some("ley.pdf"));
    assert_eq!(hits[0].similarity, Some(0.83));
    assert_eq!(hits[1].id.as_deref(), Some("9b7c"));
    assert_eq!(hits[1].source(), None);
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let (base, _mock) = spawn_mock(&[]).await;
    let store = SupabaseStore::new(&store_config("broken"), &base, SUPABASE_KEY).unwrap();

    let err = store.source_exists("ley.pdf").await.unwrap_err();
    assert!(err.to_string().contains("dedup lookup"));

    let record = ChunkRecord::new(
        "x",
        ChunkMetadata::for_source("ley.pdf"),
        "corporativo",
        vec![1.0],
    );
    let err = store.insert_chunk(&record).await.unwrap_err();
    assert!(err.to_string().contains("409"));
}
