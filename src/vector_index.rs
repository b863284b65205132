//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as little-endian f32 BLOBs in `snippet_vectors`, keyed
//! by `(owner_id, snippet_id)`. Search is brute force: load the owner's
//! vectors in storage order, score each by cosine similarity, and keep the
//! top `k`. Rows embedded with a different model or width than the current
//! embedder are skipped.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use snipvault_core::vector::{
    blob_to_vec, cosine_similarity, embed_one, rank, vec_to_blob, Embedder, VectorIndex,
    VectorRecord,
};

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, owner_id: &str, record: VectorRecord) -> Result<()> {
        let vector = embed_one(self.embedder.as_ref(), &record.text).await?;
        let blob = vec_to_blob(&vector);

        sqlx::query(
            r#"
            INSERT INTO snippet_vectors (owner_id, snippet_id, embedding, model, dims,
                                         text, metadata_json, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_id, snippet_id) DO UPDATE SET
                embedding = excluded.embedding,
                model = excluded.model,
                dims = excluded.dims,
                text = excluded.text,
                metadata_json = excluded.metadata_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(owner_id)
        .bind(&record.id)
        .bind(&blob)
        .bind(self.embedder.model_name())
        .bind(vector.len() as i64)
        .bind(&record.text)
        .bind(serde_json::to_string(&record.metadata)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn search(&self, owner_id: &str, query: &str, top_k: usize) -> Result<Vec<String>> {
        let query_vec = embed_one(self.embedder.as_ref(), query).await?;

        let rows = sqlx::query(
            r#"
            SELECT snippet_id, embedding
            FROM snippet_vectors
            WHERE owner_id = ? AND model = ? AND dims = ?
            ORDER BY rowid
            "#,
        )
        .bind(owner_id)
        .bind(self.embedder.model_name())
        .bind(query_vec.len() as i64)
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob));
                (row.get::<String, _>("snippet_id"), similarity)
            })
            .collect();

        Ok(rank(scored, top_k))
    }

    async fn remove(&self, owner_id: &str, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM snippet_vectors WHERE owner_id = ? AND snippet_id = ?")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
