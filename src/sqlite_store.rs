//! SQLite-backed [`SnippetStore`] implementation.
//!
//! Every statement filters on `owner_id` together with the record id, so a
//! foreign record is indistinguishable from a missing one. Timestamps are
//! stored as Unix milliseconds; `seq` breaks ties between snippets created in
//! the same millisecond.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use snipvault_core::models::{NewSnippet, Pagination, Snippet, SnippetFilter, SnippetPatch};
use snipvault_core::store::SnippetStore;

const SNIPPET_COLUMNS: &str =
    "id, owner_id, title, code, language, framework, tags, summary, created_at, updated_at";

/// Matches rows of one owner, optionally narrowed by tag and by a
/// case-insensitive substring of title or code. Binds: owner, tag, tag,
/// query, query, query.
const FILTER_CLAUSE: &str = r#"
    owner_id = ?
    AND (? IS NULL OR EXISTS (SELECT 1 FROM json_each(snippets.tags) WHERE json_each.value = ?))
    AND (? IS NULL OR instr(lower(title), lower(?)) > 0 OR instr(lower(code), lower(?)) > 0)
"#;

pub struct SqliteSnippetStore {
    pool: SqlitePool,
}

impl SqliteSnippetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Current time truncated to the stored precision, so the record returned by
/// a write equals the record read back later.
fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).with_context(|| format!("invalid timestamp {ms}"))
}

fn row_to_snippet(row: &SqliteRow) -> Result<Snippet> {
    let tags_json: String = row.get("tags");
    let tags: Vec<String> =
        serde_json::from_str(&tags_json).with_context(|| "corrupt tags column")?;
    Ok(Snippet {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        code: row.get("code"),
        language: row.get("language"),
        framework: row.get("framework"),
        tags,
        summary: row.get("summary"),
        created_at: from_millis(row.get("created_at"))?,
        updated_at: from_millis(row.get("updated_at"))?,
    })
}

#[async_trait]
impl SnippetStore for SqliteSnippetStore {
    async fn create(&self, owner_id: &str, input: &NewSnippet) -> Result<Snippet> {
        input.validate()?;
        let snippet =
            input
                .clone()
                .into_snippet(owner_id, uuid::Uuid::new_v4().to_string(), now_millis());

        sqlx::query(
            r#"
            INSERT INTO snippets (id, owner_id, title, code, language, framework, tags,
                                  summary, created_at, updated_at, seq)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM snippets))
            "#,
        )
        .bind(&snippet.id)
        .bind(&snippet.owner_id)
        .bind(&snippet.title)
        .bind(&snippet.code)
        .bind(&snippet.language)
        .bind(&snippet.framework)
        .bind(serde_json::to_string(&snippet.tags)?)
        .bind(&snippet.summary)
        .bind(snippet.created_at.timestamp_millis())
        .bind(snippet.updated_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(snippet)
    }

    async fn find_many(
        &self,
        owner_id: &str,
        filter: &SnippetFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Snippet>, u64)> {
        let tag = filter.tag.as_deref();
        let query = filter.query.as_deref();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM snippets WHERE {FILTER_CLAUSE}"
        ))
        .bind(owner_id)
        .bind(tag)
        .bind(tag)
        .bind(query)
        .bind(query)
        .bind(query)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(&format!(
            "SELECT {SNIPPET_COLUMNS} FROM snippets WHERE {FILTER_CLAUSE} \
             ORDER BY created_at DESC, seq DESC LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(tag)
        .bind(tag)
        .bind(query)
        .bind(query)
        .bind(query)
        .bind(i64::from(pagination.limit))
        .bind(pagination.offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let snippets = rows.iter().map(row_to_snippet).collect::<Result<Vec<_>>>()?;
        Ok((snippets, total.max(0) as u64))
    }

    async fn find_one(&self, owner_id: &str, id: &str) -> Result<Option<Snippet>> {
        let row = sqlx::query(&format!(
            "SELECT {SNIPPET_COLUMNS} FROM snippets WHERE owner_id = ? AND id = ?"
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_snippet).transpose()
    }

    async fn find_by_ids(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Snippet>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {SNIPPET_COLUMNS} FROM snippets WHERE owner_id = ? AND id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql).bind(owner_id);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_snippet).collect()
    }

    async fn update_one(
        &self,
        owner_id: &str,
        id: &str,
        patch: &SnippetPatch,
    ) -> Result<Option<Snippet>> {
        patch.validate()?;
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {SNIPPET_COLUMNS} FROM snippets WHERE owner_id = ? AND id = ?"
        ))
        .bind(owner_id)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut snippet = row_to_snippet(&row)?;
        snippet.apply_patch(patch, now_millis());

        sqlx::query(
            r#"
            UPDATE snippets
            SET title = ?, code = ?, language = ?, framework = ?, tags = ?,
                summary = ?, updated_at = ?
            WHERE owner_id = ? AND id = ?
            "#,
        )
        .bind(&snippet.title)
        .bind(&snippet.code)
        .bind(&snippet.language)
        .bind(&snippet.framework)
        .bind(serde_json::to_string(&snippet.tags)?)
        .bind(&snippet.summary)
        .bind(snippet.updated_at.timestamp_millis())
        .bind(owner_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(snippet))
    }

    async fn delete_one(&self, owner_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM snippets WHERE owner_id = ? AND id = ?")
            .bind(owner_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
