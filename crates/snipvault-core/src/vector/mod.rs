//! Vector index abstraction and embedding helpers.
//!
//! The [`VectorIndex`] trait is a derived, rebuildable index over snippets,
//! namespaced per owner. Embedding is a capability of the index: concrete
//! indexes hold an injected [`Embedder`] and turn [`VectorRecord::text`] into
//! a vector on upsert and the query text into a vector on search.
//!
//! Concrete embedders that call a network API (OpenAI, Ollama) or run a local
//! model live in the `snipvault` app crate. [`HashingEmbedder`] is a
//! deterministic offline fallback.

pub mod hashing;
pub mod memory;

pub use hashing::HashingEmbedder;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorMetadata {
    pub title: String,
    pub code: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A record to index, keyed by snippet id within the owner's namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    /// The text that gets embedded.
    pub text: String,
    pub metadata: VectorMetadata,
}

/// Turns text into fixed-width vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text.
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let mut vectors = embedder.embed(&[text.to_string()]).await?;
    match vectors.pop() {
        Some(v) if vectors.is_empty() => Ok(v),
        _ => anyhow::bail!(
            "embedder {} returned an unexpected number of vectors",
            embedder.model_name()
        ),
    }
}

/// Owner-namespaced similarity index.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert`](VectorIndex::upsert) | Embed and store, replacing any record with the same id |
/// | [`search`](VectorIndex::search) | Ids by descending similarity, at most `top_k` |
/// | [`remove`](VectorIndex::remove) | Drop a record if present |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, owner_id: &str, record: VectorRecord) -> Result<()>;

    async fn search(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<String>>;

    async fn remove(&self, owner_id: &str, id: &str) -> Result<()>;
}

/// Rank scored ids by descending score and keep the first `top_k`.
///
/// The sort is stable, so equal scores keep the order they were stored in.
/// NaN scores rank below every finite score.
pub fn rank(mut scored: Vec<(String, f32)>, top_k: usize) -> Vec<String> {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    scored.sort_by(|a, b| key(b.1).total_cmp(&key(a.1)));
    scored.truncate(top_k);
    scored.into_iter().map(|(id, _)| id).collect()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors, zero vectors, or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
