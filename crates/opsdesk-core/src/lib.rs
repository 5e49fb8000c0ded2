//! # opsdesk core
//!
//! Runtime-agnostic logic for opsdesk: data models, chunking strategies,
//! provider traits for embedding and generation, the store abstraction,
//! prompt assembly, chat sessions, and the query pipeline that ties them
//! together.
//!
//! This crate contains no HTTP client, database driver, or filesystem I/O.
//! Concrete providers and stores live in the `opsdesk` crate.

pub mod assistant;
pub mod auth;
pub mod chunk;
pub mod embedding;
pub mod generation;
pub mod models;
pub mod prompt;
pub mod session;
pub mod store;
