//! Short-TTL cache fronting listing queries and single-record lookups.
//!
//! [`CacheBackend`] is the raw key/value contract (the shape of a Redis-like
//! store: string values, per-key TTL, glob key enumeration, batch delete).
//! [`CacheLayer`] sits on top and owns the typed payload schema:
//!
//! - values are written as a versioned envelope `{"v", "kind", "data"}`;
//! - reads that fail to decode, carry the wrong version or kind, or hold a
//!   record violating snippet invariants are treated as a miss;
//! - backend failures are logged and degrade to a miss (reads) or a no-op
//!   (writes and invalidation). The cache is never required for correctness.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache_key;
use crate::models::{Snippet, SnippetPage};

/// Current envelope version. Bump when a payload schema changes so entries
/// written by older builds read as misses.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Raw key/value cache with TTL and pattern enumeration.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Unconditional overwrite.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Live keys matching a glob pattern (`*` wildcard).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Delete a batch of keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize>;
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    v: u32,
    kind: String,
    data: Value,
}

const KIND_PAGE: &str = "page";
const KIND_SNIPPET: &str = "snippet";

/// Typed cache access with defensive decoding.
#[derive(Clone)]
pub struct CacheLayer {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl CacheLayer {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get_page(&self, key: &str, owner_id: &str) -> Option<SnippetPage> {
        let data = self.read_envelope(key, KIND_PAGE).await?;
        let page: SnippetPage = match serde_json::from_value(data) {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed cached page");
                return None;
            }
        };
        if !page.snippets.iter().all(|s| is_sound(s, owner_id)) {
            tracing::warn!(key, "discarding cached page with invalid records");
            return None;
        }
        Some(page)
    }

    pub async fn get_snippet(&self, key: &str, owner_id: &str) -> Option<Snippet> {
        let data = self.read_envelope(key, KIND_SNIPPET).await?;
        let snippet: Snippet = match serde_json::from_value(data) {
            Ok(snippet) => snippet,
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding malformed cached snippet");
                return None;
            }
        };
        if !is_sound(&snippet, owner_id) {
            tracing::warn!(key, "discarding cached snippet that fails invariants");
            return None;
        }
        Some(snippet)
    }

    pub async fn put_page(&self, key: &str, page: &SnippetPage) {
        self.write_envelope(key, KIND_PAGE, serde_json::to_value(page))
            .await;
    }

    pub async fn put_snippet(&self, key: &str, snippet: &Snippet) {
        self.write_envelope(key, KIND_SNIPPET, serde_json::to_value(snippet))
            .await;
    }

    /// Delete every entry in the owner's namespace (listings, semantic
    /// results and single records). Returns the number of deleted keys.
    pub async fn invalidate_owner(&self, owner_id: &str) -> usize {
        let pattern = cache_key::owner_pattern(owner_id);
        let keys = match self.backend.keys(&pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "cache key enumeration failed; entries expire by TTL");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match self.backend.delete(&keys).await {
            Ok(n) => {
                tracing::debug!(owner_id, deleted = n, "invalidated cached entries");
                n
            }
            Err(e) => {
                tracing::warn!(owner_id, error = %e, "cache invalidation failed; entries expire by TTL");
                0
            }
        }
    }

    async fn read_envelope(&self, key: &str, kind: &str) -> Option<Value> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                tracing::debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache read failed; falling back to source");
                return None;
            }
        };
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                return None;
            }
        };
        if envelope.v != CACHE_SCHEMA_VERSION || envelope.kind != kind {
            tracing::debug!(key, v = envelope.v, kind = %envelope.kind, "cache entry shape mismatch");
            return None;
        }
        tracing::debug!(key, "cache hit");
        Some(envelope.data)
    }

    async fn write_envelope(&self, key: &str, kind: &str, data: serde_json::Result<Value>) {
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode cache payload");
                return;
            }
        };
        let envelope = Envelope {
            v: CACHE_SCHEMA_VERSION,
            kind: kind.to_string(),
            data,
        };
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to encode cache envelope");
                return;
            }
        };
        if let Err(e) = self.backend.set(key, raw, self.ttl).await {
            tracing::warn!(key, error = %e, "cache write failed");
        }
    }
}

fn is_sound(snippet: &Snippet, owner_id: &str) -> bool {
    !snippet.id.is_empty()
        && snippet.owner_id == owner_id
        && !snippet.title.trim().is_empty()
        && !snippet.code.trim().is_empty()
}
