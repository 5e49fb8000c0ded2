//! # opsdesk
//!
//! A retrieval-augmented question answering desk over a folder of PDF
//! regulations.
//!
//! PDFs are split into article-sized chunks (or fixed windows for
//! non-legal text), embedded, and stored in a vector-capable table.
//! Questions are embedded, matched against the stored chunks, and
//! answered by a language model that sees only the retrieved context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ documentos/ │──▶│ Chunk+Embed  │──▶│ Supabase/SQLite │
//! │   *.pdf     │   │  (ingest)    │   │   documents     │
//! └─────────────┘   └──────────────┘   └────────┬────────┘
//!                                               │ match
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!                  ┌──────────┐           ┌──────────┐
//!                  │ ask/chat │           │   HTTP   │
//!                  │  (CLI)   │           │  (serve) │
//!                  └──────────┘           └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! opsdesk ingest                           # ingest ./documentos/*.pdf
//! opsdesk ask "¿Cómo se calculan las regalías?"
//! opsdesk chat                             # interactive, passphrase gated
//! opsdesk serve                            # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`secrets`] | Credential lookup (secrets file, env, `.env`) |
//! | [`connector_fs`] | Ingest folder scanning |
//! | [`extract`] | PDF page extraction |
//! | [`ingest`] | Ingestion pipeline |
//! | [`embedding`] / [`generation`] | Gemini providers |
//! | [`supabase`] / [`sqlite_store`] | Store backends |
//! | [`server`] | HTTP API |
//! | [`chat`] | Terminal chat |
//! | [`migrate`] | Local SQLite schema |

pub mod ask;
pub mod auth;
pub mod chat;
pub mod config;
pub mod connector_fs;
pub mod embedding;
pub mod extract;
pub mod gemini;
pub mod generation;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod runtime;
pub mod secrets;
pub mod server;
pub mod sqlite_store;
pub mod supabase;

pub use opsdesk_core as core;
