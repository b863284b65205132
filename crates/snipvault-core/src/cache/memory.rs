//! In-memory [`CacheBackend`] for tests and single-process deployments.
//!
//! Entries live in a `HashMap` behind `std::sync::RwLock`. Expiry is lazy:
//! expired entries are invisible to reads and are swept on the next write.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use globset::GlobBuilder;

use super::CacheBackend;

struct Entry {
    value: String,
    /// `None` when the TTL is too large to represent; the entry never expires.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

pub struct InMemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|e| e.is_live(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("cache lock poisoned")
}

#[async_trait]
impl CacheBackend for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.retain(|_, e| e.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now.checked_add(ttl),
            },
        );
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(false)
            .build()?
            .compile_matcher();
        let now = Instant::now();
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && matcher.is_match(k.as_str()))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        let now = Instant::now();
        let mut entries = self.entries.write().map_err(poisoned)?;
        let mut removed = 0;
        for key in keys {
            if let Some(entry) = entries.remove(key) {
                if entry.is_live(now) {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}
