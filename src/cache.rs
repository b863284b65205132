//! SQLite-backed [`CacheBackend`].
//!
//! Entries live in `cache_entries` with an absolute expiry in Unix
//! milliseconds. Expired rows are invisible to reads and are purged on every
//! write. Key enumeration uses SQLite's `GLOB`, which has the same `*`
//! semantics as the in-memory backend.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use snipvault_core::cache::CacheBackend;

pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove expired rows, returning how many were deleted.
    pub async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries WHERE expires_at <= ?")
            .bind(now_ms())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheBackend for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_ms())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        self.purge_expired().await?;
        let expires_at = now_ms().saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT key FROM cache_entries WHERE key GLOB ? AND expires_at > ?",
        )
        .bind(pattern)
        .bind(now_ms())
        .fetch_all(&self.pool)
        .await?;
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let mut removed = 0;
        for key in keys {
            let result = sqlx::query("DELETE FROM cache_entries WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_ms())
                .execute(&mut *tx)
                .await?;
            removed += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(removed)
    }
}
