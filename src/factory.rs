//! Wiring: turn a [`Config`] into a ready [`SnippetService`] and
//! [`Assistant`].

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use snipvault_core::cache::memory::InMemoryCache;
use snipvault_core::cache::CacheBackend;
use snipvault_core::SnippetService;

use crate::assist::{self, Assistant};
use crate::cache::SqliteCache;
use crate::config::Config;
use crate::sqlite_store::SqliteSnippetStore;
use crate::vector_index::SqliteVectorIndex;
use crate::{db, embedding, migrate};

/// Everything a front end (HTTP or CLI) needs.
#[derive(Clone)]
pub struct AppContext {
    pub service: Arc<SnippetService>,
    pub assistant: Assistant,
}

pub struct AppFactory;

impl AppFactory {
    /// Open the database, make sure the schema exists, and assemble the
    /// service with the configured cache backend and embedder.
    pub async fn create_context(config: &Config) -> Result<AppContext> {
        let pool = db::connect(config).await?;
        migrate::apply(&pool)
            .await
            .context("Failed to apply database schema")?;
        Self::create_context_with_pool(config, pool)
    }

    pub fn create_context_with_pool(config: &Config, pool: SqlitePool) -> Result<AppContext> {
        let embedder = embedding::create_embedder(&config.embedding)
            .context("Failed to create embedding provider")?;
        tracing::debug!(
            provider = %config.embedding.provider,
            model = embedder.model_name(),
            "embedding provider ready"
        );

        let cache: Arc<dyn CacheBackend> = match config.cache.backend.as_str() {
            "memory" => Arc::new(InMemoryCache::new()),
            _ => Arc::new(SqliteCache::new(pool.clone())),
        };

        let service = SnippetService::new(
            Arc::new(SqliteSnippetStore::new(pool.clone())),
            Arc::new(SqliteVectorIndex::new(pool, embedder)),
            cache,
            config.service_settings(),
        );

        let assistant = assist::create_assistant(&config.assistant)
            .context("Failed to create AI assistant")?;

        Ok(AppContext {
            service: Arc::new(service),
            assistant,
        })
    }
}
