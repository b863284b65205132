//! Cached retrieval and write orchestration.
//!
//! [`SnippetService`] reconciles three collaborators into one read/write path:
//!
//! - the [`SnippetStore`], authoritative for every record;
//! - the [`VectorIndex`], a derived similarity index kept in step on writes;
//! - the [`CacheLayer`], a short-TTL read-through cache namespaced per owner.
//!
//! Reads consult the cache first and write through on a miss. Every
//! successful write invalidates the whole owner namespace, so the next read
//! after a write returns fresh data unless a concurrent reader repopulated
//! the entry in between (bounded by the cache TTL).
//!
//! All collaborators are injected through [`SnippetService::new`]. The
//! service holds no other state.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheBackend, CacheLayer};
use crate::cache_key;
use crate::error::{SnippetError, SnippetResult, ValidationError};
use crate::models::{
    ListQuery, NewSnippet, Pagination, SemanticQuery, Snippet, SnippetFilter, SnippetPage,
    SnippetPatch,
};
use crate::store::SnippetStore;
use crate::validate;
use crate::vector::VectorIndex;

/// Tunables for the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub cache_ttl: Duration,
    pub page_size: u32,
    pub max_page_size: u32,
    pub semantic_top_k: usize,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(60),
            page_size: 15,
            max_page_size: 100,
            semantic_top_k: 15,
        }
    }
}

/// A listing request after defaults and bounds have been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedListing {
    pub filter: SnippetFilter,
    pub pagination: Pagination,
}

impl ListQuery {
    /// Blank `q`/`tag` mean "no filter"; `page` is at least 1; `limit`
    /// defaults to the page size and is clamped to `1..=max_page_size`.
    pub fn normalize(&self, settings: &ServiceSettings) -> NormalizedListing {
        let limit = self
            .limit
            .unwrap_or(settings.page_size)
            .clamp(1, settings.max_page_size.max(1));
        NormalizedListing {
            filter: SnippetFilter {
                query: non_blank(self.q.as_deref()),
                tag: non_blank(self.tag.as_deref()),
            },
            pagination: Pagination {
                page: self.page.unwrap_or(1).max(1),
                limit,
            },
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub struct SnippetService {
    store: Arc<dyn SnippetStore>,
    index: Arc<dyn VectorIndex>,
    cache: CacheLayer,
    settings: ServiceSettings,
}

impl SnippetService {
    pub fn new(
        store: Arc<dyn SnippetStore>,
        index: Arc<dyn VectorIndex>,
        cache_backend: Arc<dyn CacheBackend>,
        settings: ServiceSettings,
    ) -> Self {
        let cache = CacheLayer::new(cache_backend, settings.cache_ttl);
        Self {
            store,
            index,
            cache,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Persist a new snippet and index it.
    ///
    /// If indexing fails the stored record is deleted again and the failure
    /// is returned as [`SnippetError::Upstream`], so a snippet is never left
    /// invisible to semantic search.
    pub async fn create_snippet(&self, owner_id: &str, input: NewSnippet) -> SnippetResult<Snippet> {
        let owner_id = validate::owner_id(owner_id)?;
        input.validate()?;

        let snippet = self
            .store
            .create(owner_id, &input)
            .await
            .map_err(|e| backend_error("create", owner_id, e))?;

        if let Err(e) = self.index.upsert(owner_id, snippet.vector_record()).await {
            tracing::error!(
                owner_id,
                id = %snippet.id,
                error = %format!("{e:#}"),
                "indexing new snippet failed; rolling back"
            );
            if let Err(rollback) = self.store.delete_one(owner_id, &snippet.id).await {
                tracing::error!(
                    owner_id,
                    id = %snippet.id,
                    error = %format!("{rollback:#}"),
                    "rollback of unindexed snippet failed"
                );
            }
            return Err(SnippetError::Upstream(e.context("indexing new snippet")));
        }

        self.cache.invalidate_owner(owner_id).await;
        tracing::info!(owner_id, id = %snippet.id, "created snippet");
        Ok(snippet)
    }

    /// Keyword listing, newest first, served from cache when possible.
    pub async fn get_all_snippets(
        &self,
        owner_id: &str,
        query: ListQuery,
    ) -> SnippetResult<SnippetPage> {
        let owner_id = validate::owner_id(owner_id)?;
        let NormalizedListing { filter, pagination } = query.normalize(&self.settings);
        let key = cache_key::listing_key(
            owner_id,
            filter.query.as_deref(),
            filter.tag.as_deref(),
            pagination.page,
            pagination.limit,
        );

        if let Some(page) = self.cache.get_page(&key, owner_id).await {
            return Ok(page);
        }

        let (snippets, total_count) = self
            .store
            .find_many(owner_id, &filter, pagination)
            .await
            .map_err(|e| backend_error("find_many", owner_id, e))?;
        let page = SnippetPage {
            snippets,
            total_count,
        };
        self.cache.put_page(&key, &page).await;
        Ok(page)
    }

    /// Similarity search over the owner's snippets.
    ///
    /// Results keep the index's ranking. Ids the index returns but the store
    /// no longer holds are dropped.
    pub async fn semantic_search(
        &self,
        owner_id: &str,
        query: SemanticQuery,
    ) -> SnippetResult<SnippetPage> {
        let owner_id = validate::owner_id(owner_id)?;
        let Some(q) = non_blank(query.q.as_deref()) else {
            return Err(ValidationError::single("Search query is required").into());
        };
        let top_k = self.settings.semantic_top_k;
        let key = cache_key::semantic_key(owner_id, &q, top_k);

        if let Some(page) = self.cache.get_page(&key, owner_id).await {
            return Ok(page);
        }

        let ids = self
            .index
            .search(owner_id, &q, top_k)
            .await
            .map_err(|e| upstream("vector_search", owner_id, e))?;
        let found = self
            .store
            .find_by_ids(owner_id, &ids)
            .await
            .map_err(|e| backend_error("find_by_ids", owner_id, e))?;

        let snippets = reorder(&ids, found);
        if snippets.len() < ids.len() {
            tracing::debug!(
                owner_id,
                dropped = ids.len() - snippets.len(),
                "index returned ids missing from the store"
            );
        }
        let page = SnippetPage {
            total_count: snippets.len() as u64,
            snippets,
        };
        self.cache.put_page(&key, &page).await;
        Ok(page)
    }

    pub async fn get_snippet_by_id(&self, owner_id: &str, id: &str) -> SnippetResult<Snippet> {
        let owner_id = validate::owner_id(owner_id)?;
        let key = cache_key::record_key(owner_id, id);

        if let Some(snippet) = self.cache.get_snippet(&key, owner_id).await {
            if snippet.id == id {
                return Ok(snippet);
            }
        }

        let snippet = self
            .store
            .find_one(owner_id, id)
            .await
            .map_err(|e| backend_error("find_one", owner_id, e))?
            .ok_or(SnippetError::NotFound)?;
        self.cache.put_snippet(&key, &snippet).await;
        Ok(snippet)
    }

    /// Apply a partial update.
    ///
    /// The store is authoritative: a failure to re-index is logged and the
    /// updated record is still returned.
    pub async fn update_snippet(
        &self,
        owner_id: &str,
        id: &str,
        patch: SnippetPatch,
    ) -> SnippetResult<Snippet> {
        let owner_id = validate::owner_id(owner_id)?;
        patch.validate()?;

        let snippet = self
            .store
            .update_one(owner_id, id, &patch)
            .await
            .map_err(|e| backend_error("update_one", owner_id, e))?
            .ok_or(SnippetError::NotFound)?;

        if patch.touches_index() {
            if let Err(e) = self.index.upsert(owner_id, snippet.vector_record()).await {
                tracing::warn!(
                    owner_id,
                    id,
                    error = %format!("{e:#}"),
                    "re-indexing updated snippet failed; index is stale for this record"
                );
            }
        }

        self.cache.invalidate_owner(owner_id).await;
        tracing::info!(owner_id, id, "updated snippet");
        Ok(snippet)
    }

    pub async fn delete_snippet(&self, owner_id: &str, id: &str) -> SnippetResult<()> {
        let owner_id = validate::owner_id(owner_id)?;

        let deleted = self
            .store
            .delete_one(owner_id, id)
            .await
            .map_err(|e| backend_error("delete_one", owner_id, e))?;
        if !deleted {
            return Err(SnippetError::NotFound);
        }

        if let Err(e) = self.index.remove(owner_id, id).await {
            tracing::warn!(
                owner_id,
                id,
                error = %format!("{e:#}"),
                "removing snippet from index failed; search drops it on read"
            );
        }

        self.cache.invalidate_owner(owner_id).await;
        tracing::info!(owner_id, id, "deleted snippet");
        Ok(())
    }
}

/// Put store results back into the index's ranking, skipping missing ids.
fn reorder(ids: &[String], found: Vec<Snippet>) -> Vec<Snippet> {
    let mut by_id: std::collections::HashMap<String, Snippet> =
        found.into_iter().map(|s| (s.id.clone(), s)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

fn backend_error(op: &'static str, owner_id: &str, err: anyhow::Error) -> SnippetError {
    match SnippetError::from_backend(err) {
        SnippetError::Upstream(e) => upstream(op, owner_id, e),
        other => other,
    }
}

fn upstream(op: &'static str, owner_id: &str, err: anyhow::Error) -> SnippetError {
    tracing::error!(op, owner_id, error = %format!("{err:#}"), "upstream failure");
    SnippetError::Upstream(err.context(op))
}
