//! Builds the store, providers, and assistant from configuration.

use anyhow::{bail, Result};
use std::sync::Arc;

use opsdesk_core::assistant::Assistant;
use opsdesk_core::prompt::PromptTemplate;
use opsdesk_core::store::memory::InMemoryStore;
use opsdesk_core::store::Store;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::secrets::{Secrets, SUPABASE_KEY, SUPABASE_URL};
use crate::sqlite_store::{connect, SqliteStore};
use crate::supabase::SupabaseStore;

/// Open the configured store backend.
pub async fn open_store(config: &Config, secrets: &Secrets) -> Result<Arc<dyn Store>> {
    match config.store.backend.as_str() {
        "supabase" => Ok(Arc::new(SupabaseStore::new(
            &config.store,
            secrets.require(SUPABASE_URL)?,
            secrets.require(SUPABASE_KEY)?,
        )?)),
        "sqlite" => {
            let path = &config.store.sqlite_path;
            if !path.exists() {
                bail!(
                    "Database not found at {}. Run `opsdesk init` first.",
                    path.display()
                );
            }
            Ok(Arc::new(SqliteStore::new(connect(path).await?)))
        }
        "memory" => Ok(Arc::new(InMemoryStore::new())),
        other => bail!("Unknown store backend: {}", other),
    }
}

/// Assistant wired to `store` and the configured providers.
pub fn build_assistant(
    config: &Config,
    secrets: &Secrets,
    store: Arc<dyn Store>,
) -> Result<Assistant> {
    let embedder = create_embedder(&config.embedding, secrets)?;
    let generator = create_generator(&config.generation, secrets)?;
    Ok(Assistant::new(embedder, store, generator)
        .with_params(config.retrieval.params())
        .with_prompt(PromptTemplate::new(config.assistant.name.clone())))
}

/// Load secrets, check the required ones, open the store and build the assistant.
pub async fn assistant_from_config(config: &Config) -> Result<Assistant> {
    let secrets = Secrets::load(config)?;
    secrets.check_required(config)?;
    let store = open_store(config, &secrets).await?;
    build_assistant(config, &secrets, store)
}
