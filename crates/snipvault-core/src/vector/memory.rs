//! In-memory [`VectorIndex`] for tests and single-process deployments.
//!
//! Each owner gets its own namespace: a `Vec` of records kept in insertion
//! order, so equal similarity scores rank in storage order.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{
    cosine_similarity, embed_one, rank, Embedder, VectorIndex, VectorMetadata, VectorRecord,
};

struct IndexedVector {
    id: String,
    vector: Vec<f32>,
    metadata: VectorMetadata,
}

pub struct InMemoryVectorIndex {
    embedder: Arc<dyn Embedder>,
    namespaces: RwLock<HashMap<String, Vec<IndexedVector>>>,
}

impl InMemoryVectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    /// Number of records in the owner's namespace.
    pub fn count(&self, owner_id: &str) -> usize {
        self.namespaces
            .read()
            .map(|ns| ns.get(owner_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    pub fn contains(&self, owner_id: &str, id: &str) -> bool {
        self.metadata(owner_id, id).is_some()
    }

    /// Metadata stored for a record, if indexed.
    pub fn metadata(&self, owner_id: &str, id: &str) -> Option<VectorMetadata> {
        let ns = self.namespaces.read().ok()?;
        ns.get(owner_id)?
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.metadata.clone())
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("vector index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, owner_id: &str, record: VectorRecord) -> Result<()> {
        let vector = embed_one(self.embedder.as_ref(), &record.text).await?;
        let entry = IndexedVector {
            id: record.id,
            vector,
            metadata: record.metadata,
        };

        let mut ns = self.namespaces.write().map_err(poisoned)?;
        let records = ns.entry(owner_id.to_string()).or_default();
        match records.iter_mut().find(|r| r.id == entry.id) {
            Some(existing) => *existing = entry,
            None => records.push(entry),
        }
        Ok(())
    }

    async fn search(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<String>> {
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;
        let ns = self.namespaces.read().map_err(poisoned)?;
        let Some(records) = ns.get(owner_id) else {
            return Ok(Vec::new());
        };
        let scored = records
            .iter()
            .map(|r| (r.id.clone(), cosine_similarity(&query_vec, &r.vector)))
            .collect();
        Ok(rank(scored, top_k))
    }

    async fn remove(&self, owner_id: &str, id: &str) -> Result<()> {
        let mut ns = self.namespaces.write().map_err(poisoned)?;
        if let Some(records) = ns.get_mut(owner_id) {
            records.retain(|r| r.id != id);
        }
        Ok(())
    }
}
