//! TOML configuration.
//!
//! Every section is optional and falls back to the defaults below, so an
//! empty file is a valid configuration (Supabase store, Gemini providers,
//! `./documentos` as the ingest folder). Secrets are not stored here; see
//! [`crate::secrets`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use opsdesk_core::assistant::RetrievalParams;
use opsdesk_core::chunk::ChunkingOptions;
use opsdesk_core::models::DEFAULT_CATEGORY;
use opsdesk_core::prompt::{DEFAULT_ASSISTANT_NAME, PREVIEW_CHARS};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// All defaults. Used when a command can run without a config file.
    pub fn minimal() -> Self {
        Self::default()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    /// `supabase`, `sqlite`, or `memory`.
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_match_function")]
    pub match_function: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: default_sqlite_path(),
            table: default_table(),
            match_function: default_match_function(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_backend() -> String {
    "supabase".to_string()
}
fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./data/opsdesk.sqlite")
}
fn default_table() -> String {
    "documents".to_string()
}
fn default_match_function() -> String {
    "match_documents".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecretsConfig {
    /// TOML file holding `SUPABASE_URL`, `SUPABASE_KEY`, `GOOGLE_API_KEY`.
    #[serde(default = "default_secrets_file")]
    pub file: PathBuf,
    /// Dotenv file loaded into the environment before lookups.
    #[serde(default = "default_env_file")]
    pub env_file: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            file: default_secrets_file(),
            env_file: default_env_file(),
        }
    }
}

fn default_secrets_file() -> PathBuf {
    PathBuf::from("./config/secrets.toml")
}
fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_folder")]
    pub folder: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
            include_globs: default_include_globs(),
            category: default_category(),
        }
    }
}

fn default_folder() -> PathBuf {
    PathBuf::from("./documentos")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.pdf".to_string()]
}
fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
    #[serde(default = "default_structural_marker")]
    pub structural_marker: String,
    #[serde(default = "default_structural_threshold")]
    pub structural_threshold: usize,
    #[serde(default)]
    pub keep_preamble: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window_chars: default_window_chars(),
            overlap_chars: default_overlap_chars(),
            min_chunk_chars: default_min_chunk_chars(),
            structural_marker: default_structural_marker(),
            structural_threshold: default_structural_threshold(),
            keep_preamble: false,
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkingOptions {
        ChunkingOptions {
            window_chars: self.window_chars,
            overlap_chars: self.overlap_chars,
            min_chunk_chars: self.min_chunk_chars,
            structural_marker: self.structural_marker.clone(),
            structural_threshold: self.structural_threshold,
            keep_preamble: self.keep_preamble,
        }
    }
}

fn default_window_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    100
}
fn default_min_chunk_chars() -> usize {
    50
}
fn default_structural_marker() -> String {
    "artículo".to_string()
}
fn default_structural_threshold() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            preview_chars: default_preview_chars(),
        }
    }
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            match_threshold: self.match_threshold,
            match_count: self.match_count,
            preview_chars: self.preview_chars,
        }
    }
}

fn default_match_threshold() -> f64 {
    0.4
}
fn default_match_count() -> usize {
    5
}
fn default_preview_chars() -> usize {
    PREVIEW_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `gemini` or `disabled`.
    #[serde(default = "default_gemini")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_gemini(),
            model: default_embedding_model(),
            dims: default_dims(),
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `gemini` or `disabled`.
    #[serde(default = "default_gemini")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_gemini(),
            model: default_generation_model(),
            timeout_secs: default_generation_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_gemini() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_base_url() -> String {
    GEMINI_BASE_URL.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default = "default_suggestions")]
    pub suggestions: Vec<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            suggestions: default_suggestions(),
        }
    }
}

fn default_assistant_name() -> String {
    DEFAULT_ASSISTANT_NAME.to_string()
}
fn default_suggestions() -> Vec<String> {
    vec![
        "¿Qué tipos de licencias mineras existen?".to_string(),
        "¿Cómo se calculan las regalías?".to_string(),
        "¿Qué normas de seguridad aplican en minería subterránea?".to_string(),
    ]
}

/// Passphrase gate settings. No digest means the gate is open.
#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    #[serde(default)]
    pub passphrase_digest: Option<String>,
    #[serde(default = "default_salt")]
    pub salt: String,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            passphrase_digest: None,
            salt: default_salt(),
        }
    }
}

fn default_salt() -> String {
    "opsdesk".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Open sessions kept in memory; the oldest is dropped past this.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_sessions: default_max_sessions(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

fn default_max_sessions() -> usize {
    1000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.window_chars == 0 {
        anyhow::bail!("chunking.window_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.window_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.window_chars");
    }

    // Validate retrieval
    if config.retrieval.match_count < 1 {
        anyhow::bail!("retrieval.match_count must be >= 1");
    }
    if !(-1.0..=1.0).contains(&config.retrieval.match_threshold) {
        anyhow::bail!("retrieval.match_threshold must be in [-1.0, 1.0]");
    }

    // Validate providers
    match config.embedding.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.dims == 0 {
        anyhow::bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }
    match config.generation.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    match config.store.backend.as_str() {
        "supabase" | "sqlite" | "memory" => {}
        other => anyhow::bail!(
            "Unknown store backend: '{}'. Must be supabase, sqlite, or memory.",
            other
        ),
    }

    if config.server.max_sessions == 0 {
        anyhow::bail!("server.max_sessions must be >= 1");
    }

    if let Some(digest) = &config.access.passphrase_digest {
        if hex::decode(digest).is_err() {
            anyhow::bail!("access.passphrase_digest must be a hex string");
        }
    }

    Ok(())
}
