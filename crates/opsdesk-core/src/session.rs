//! Per-session conversation state.
//!
//! A [`ChatSession`] is owned by whichever front end is serving a user (the
//! terminal chat loop, or one entry in the HTTP server's session map) and is
//! passed explicitly to the query pipeline. History is append-only and lives
//! only as long as the session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AccessGate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in the conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Conversation history and authentication flag for one user.
#[derive(Debug, Clone)]
pub struct ChatSession {
    id: String,
    turns: Vec<Turn>,
    authenticated: bool,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            turns: Vec::new(),
            authenticated: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Check `attempt` against the gate; a success sticks for the session.
    pub fn authenticate(&mut self, gate: &dyn AccessGate, attempt: &str) -> bool {
        if !self.authenticated && gate.verify(attempt) {
            self.authenticated = true;
        }
        self.authenticated
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    /// The last turn's text if it is a user question awaiting an answer.
    pub fn pending_question(&self) -> Option<&str> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => Some(&turn.content),
            _ => None,
        }
    }

    /// Append the assistant's reply. Ignored when no question is pending.
    pub fn record_answer(&mut self, content: impl Into<String>) -> bool {
        if self.pending_question().is_none() {
            return false;
        }
        self.push(Role::Assistant, content.into());
        true
    }

    fn push(&mut self, role: Role, content: String) {
        self.turns.push(Turn {
            role,
            content,
            at: Utc::now(),
        });
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
