//! In-memory [`SnippetStore`] implementation for testing and embedded use.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Each record also
//! carries an insertion sequence number used to break `created_at` ties, so
//! "newest first" is total even when two snippets share a timestamp.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;

use crate::models::{NewSnippet, Pagination, Snippet, SnippetFilter, SnippetPatch};

use super::SnippetStore;

struct StoredSnippet {
    seq: u64,
    snippet: Snippet,
}

#[derive(Default)]
struct Inner {
    next_seq: u64,
    records: HashMap<String, StoredSnippet>,
}

/// In-memory store for tests and single-process deployments.
pub struct InMemorySnippetStore {
    inner: RwLock<Inner>,
}

impl InMemorySnippetStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Total number of records across all owners.
    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySnippetStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("snippet store lock poisoned")
}

#[async_trait]
impl SnippetStore for InMemorySnippetStore {
    async fn create(&self, owner_id: &str, input: &NewSnippet) -> Result<Snippet> {
        input.validate()?;
        let snippet = input.clone().into_snippet(
            owner_id,
            uuid::Uuid::new_v4().to_string(),
            Utc::now(),
        );

        let mut inner = self.inner.write().map_err(poisoned)?;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.insert(
            snippet.id.clone(),
            StoredSnippet {
                seq,
                snippet: snippet.clone(),
            },
        );
        Ok(snippet)
    }

    async fn find_many(
        &self,
        owner_id: &str,
        filter: &SnippetFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Snippet>, u64)> {
        let inner = self.inner.read().map_err(poisoned)?;
        let mut matching: Vec<&StoredSnippet> = inner
            .records
            .values()
            .filter(|s| s.snippet.owner_id == owner_id && filter.matches(&s.snippet))
            .collect();
        matching.sort_by(|a, b| {
            b.snippet
                .created_at
                .cmp(&a.snippet.created_at)
                .then(b.seq.cmp(&a.seq))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit as usize)
            .map(|s| s.snippet.clone())
            .collect();
        Ok((page, total))
    }

    async fn find_one(&self, owner_id: &str, id: &str) -> Result<Option<Snippet>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .records
            .get(id)
            .filter(|s| s.snippet.owner_id == owner_id)
            .map(|s| s.snippet.clone()))
    }

    async fn find_by_ids(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Snippet>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|s| s.snippet.owner_id == owner_id)
            .map(|s| s.snippet.clone())
            .collect())
    }

    async fn update_one(
        &self,
        owner_id: &str,
        id: &str,
        patch: &SnippetPatch,
    ) -> Result<Option<Snippet>> {
        patch.validate()?;
        let mut inner = self.inner.write().map_err(poisoned)?;
        let Some(stored) = inner
            .records
            .get_mut(id)
            .filter(|s| s.snippet.owner_id == owner_id)
        else {
            return Ok(None);
        };
        stored.snippet.apply_patch(patch, Utc::now());
        Ok(Some(stored.snippet.clone()))
    }

    async fn delete_one(&self, owner_id: &str, id: &str) -> Result<bool> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let owned = inner
            .records
            .get(id)
            .is_some_and(|s| s.snippet.owner_id == owner_id);
        if owned {
            inner.records.remove(id);
        }
        Ok(owned)
    }
}
