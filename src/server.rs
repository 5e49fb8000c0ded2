//! HTTP API for the assistant.
//!
//! Each client opens a session (passing the passphrase when a gate is
//! configured) and then posts questions to it. A session's turns are
//! answered one at a time; distinct sessions run independently. At most
//! `[server].max_sessions` sessions are kept; opening one more drops the
//! oldest.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/suggestions` | Suggested starter questions |
//! | `POST` | `/sessions` | Open a session: `{ "passphrase": "..." }` |
//! | `DELETE` | `/sessions/{id}` | Close a session |
//! | `GET`  | `/sessions/{id}/messages` | Conversation so far |
//! | `POST` | `/sessions/{id}/messages` | Ask: `{ "content": "..." }` → `{ "answer", "sources" }` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "unauthorized", "message": "incorrect passphrase" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `generation_failed` (502).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

use opsdesk_core::assistant::{Answer, Assistant};
use opsdesk_core::auth::AccessGate;
use opsdesk_core::session::{ChatSession, Turn};

use crate::auth::build_gate;
use crate::config::Config;
use crate::runtime::assistant_from_config;

type SharedSession = Arc<tokio::sync::Mutex<ChatSession>>;

/// Open sessions in insertion order, bounded by `capacity`.
struct SessionMap {
    by_id: HashMap<String, SharedSession>,
    order: VecDeque<String>,
    capacity: usize,
}

impl SessionMap {
    fn new(capacity: usize) -> Self {
        Self {
            by_id: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Insert a session, returning the ids evicted to make room.
    fn insert(&mut self, id: String, session: SharedSession) -> Vec<String> {
        let mut evicted = Vec::new();
        while self.by_id.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    if self.by_id.remove(&oldest).is_some() {
                        evicted.push(oldest);
                    }
                }
                None => break,
            }
        }
        self.order.push_back(id.clone());
        self.by_id.insert(id, session);
        evicted
    }

    fn get(&self, id: &str) -> Option<SharedSession> {
        self.by_id.get(id).cloned()
    }

    fn remove(&mut self, id: &str) -> bool {
        if self.by_id.remove(id).is_none() {
            return false;
        }
        self.order.retain(|k| k != id);
        true
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    assistant: Arc<Assistant>,
    gate: Arc<dyn AccessGate>,
    suggestions: Arc<Vec<String>>,
    sessions: Arc<Mutex<SessionMap>>,
}

impl AppState {
    pub fn new(assistant: Assistant, gate: Arc<dyn AccessGate>, suggestions: Vec<String>) -> Self {
        Self {
            assistant: Arc::new(assistant),
            gate,
            suggestions: Arc::new(suggestions),
            sessions: Arc::new(Mutex::new(SessionMap::new(1000))),
        }
    }

    /// Keep at most `max` open sessions (minimum 1).
    pub fn with_max_sessions(self, max: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(SessionMap::new(max))),
            ..self
        }
    }

    fn session(&self, id: &str) -> Option<SharedSession> {
        self.sessions.lock().unwrap().get(id)
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/suggestions", get(handle_suggestions))
        .route("/sessions", post(handle_create_session))
        .route("/sessions/{id}", delete(handle_delete_session))
        .route(
            "/sessions/{id}/messages",
            get(handle_list_messages).post(handle_post_message),
        )
        .layer(cors)
        .with_state(state)
}

/// `opsdesk serve`: bind to `[server].bind` and serve until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let assistant = assistant_from_config(config).await?;
    let gate = build_gate(&config.access)?;
    let state = AppState::new(assistant, gate, config.assistant.suggestions.clone())
        .with_max_sessions(config.server.max_sessions);

    let bind_addr = config.server.bind.clone();
    println!("opsdesk server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn generation_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "generation_failed",
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /suggestions ============

#[derive(Serialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

async fn handle_suggestions(State(state): State<AppState>) -> Json<SuggestionsResponse> {
    Json(SuggestionsResponse {
        suggestions: state.suggestions.as_ref().clone(),
    })
}

// ============ POST /sessions ============

#[derive(Deserialize)]
struct CreateSessionRequest {
    #[serde(default)]
    passphrase: String,
}

#[derive(Serialize)]
struct CreateSessionResponse {
    session_id: String,
}

async fn handle_create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let mut session = ChatSession::new();
    if !session.authenticate(state.gate.as_ref(), &req.passphrase) {
        return Err(unauthorized("incorrect passphrase"));
    }

    let session_id = session.id().to_string();
    let evicted = state
        .sessions
        .lock()
        .unwrap()
        .insert(session_id.clone(), Arc::new(tokio::sync::Mutex::new(session)));
    for old in evicted {
        tracing::info!(session = %old, "session evicted");
    }
    tracing::info!(session = %session_id, "session opened");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse { session_id }),
    ))
}

// ============ DELETE /sessions/{id} ============

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if !state.sessions.lock().unwrap().remove(&id) {
        return Err(not_found(format!("no session with id: {}", id)));
    }
    tracing::info!(session = %id, "session closed");
    Ok(StatusCode::NO_CONTENT)
}

// ============ GET /sessions/{id}/messages ============

#[derive(Serialize)]
struct MessagesResponse {
    session_id: String,
    messages: Vec<Turn>,
}

async fn handle_list_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessagesResponse>, AppError> {
    let session = state
        .session(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;
    let session = session.lock().await;
    Ok(Json(MessagesResponse {
        session_id: id,
        messages: session.turns().to_vec(),
    }))
}

// ============ POST /sessions/{id}/messages ============

#[derive(Deserialize)]
struct PostMessageRequest {
    content: String,
}

async fn handle_post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<PostMessageRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let Json(req) = body.map_err(|e| bad_request(e.body_text()))?;
    let question = req.content.trim();
    if question.is_empty() {
        return Err(bad_request("content must not be empty"));
    }

    let session = state
        .session(&id)
        .ok_or_else(|| not_found(format!("no session with id: {}", id)))?;
    let mut session = session.lock().await;
    if !session.is_authenticated() {
        return Err(unauthorized("session is not authenticated"));
    }

    session.push_user(question);
    match state.assistant.respond(&mut session).await {
        Ok(Some(answer)) => Ok(Json(answer)),
        Ok(None) => Err(bad_request("no question to answer")),
        Err(e) => {
            tracing::error!(session = %id, error = %e, "generation failed");
            Err(generation_failed(e.to_string()))
        }
    }
}
