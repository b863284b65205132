//! The SQLite adapters against a real database file.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tempfile::TempDir;

use snipvault::cache::SqliteCache;
use snipvault::sqlite_store::SqliteSnippetStore;
use snipvault::vector_index::SqliteVectorIndex;
use snipvault::{db, migrate};
use snipvault_core::cache::CacheBackend;
use snipvault_core::models::{NewSnippet, Pagination, SnippetFilter, SnippetPatch};
use snipvault_core::store::SnippetStore;
use snipvault_core::vector::hashing::HashingEmbedder;
use snipvault_core::vector::{VectorIndex, VectorMetadata, VectorRecord};

async fn test_pool(tmp: &TempDir) -> SqlitePool {
    let pool = db::connect_path(&tmp.path().join("data/test.sqlite"))
        .await
        .unwrap();
    migrate::apply(&pool).await.unwrap();
    pool
}

fn page(page: u32, limit: u32) -> Pagination {
    Pagination { page, limit }
}

fn record(id: &str, text: &str) -> VectorRecord {
    VectorRecord {
        id: id.to_string(),
        text: text.to_string(),
        metadata: VectorMetadata {
            title: id.to_string(),
            code: text.to_string(),
            tags: Vec::new(),
            language: None,
        },
    }
}

// ─── Snippet store ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_migrations_idempotent() {
    let tmp = TempDir::new().unwrap();
    let pool = test_pool(&tmp).await;
    migrate::apply(&pool).await.unwrap();
}

#[tokio::test]
async fn test_store_pagination_newest_first() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteSnippetStore::new(test_pool(&tmp).await);

    for i in 0..32 {
        store
            .create("alice", &NewSnippet::new(format!("snippet {i}"), "code"))
            .await
            .unwrap();
    }

    let filter = SnippetFilter::default();
    let (first, total) = store.find_many("alice", &filter, page(1, 15)).await.unwrap();
    assert_eq!(total, 32);
    assert_eq!(first.len(), 15);
    assert_eq!(first[0].title, "snippet 31");

    let (last, _) = store.find_many("alice", &filter, page(3, 15)).await.unwrap();
    assert_eq!(last.len(), 2);
    assert_eq!(last[1].title, "snippet 0");
}

#[tokio::test]
async fn test_store_filters() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteSnippetStore::new(test_pool(&tmp).await);

    let tagged = NewSnippet {
        tags: Some(vec!["http".to_string(), "retry".to_string()]),
        ..NewSnippet::new("Backoff", "sleep(delay)")
    };
    store.create("alice", &tagged).await.unwrap();
    store
        .create("alice", &NewSnippet::new("Parser", "fn parse_HTTP_line()"))
        .await
        .unwrap();

    let by_tag = SnippetFilter {
        tag: Some("retry".to_string()),
        ..Default::default()
    };
    let (found, total) = store.find_many("alice", &by_tag, page(1, 15)).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(found[0].title, "Backoff");

    // Tag match is exact, not a substring
    let partial_tag = SnippetFilter {
        tag: Some("ret".to_string()),
        ..Default::default()
    };
    let (_, total) = store.find_many("alice", &partial_tag, page(1, 15)).await.unwrap();
    assert_eq!(total, 0);

    let by_query = SnippetFilter {
        query: Some("http".to_string()),
        ..Default::default()
    };
    let (found, _) = store.find_many("alice", &by_query, page(1, 15)).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "Parser");
}

#[tokio::test]
async fn test_store_owner_scoping() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteSnippetStore::new(test_pool(&tmp).await);

    let mine = store
        .create("alice", &NewSnippet::new("Mine", "a"))
        .await
        .unwrap();

    assert!(store.find_one("bob", &mine.id).await.unwrap().is_none());
    assert!(store
        .find_by_ids("bob", &[mine.id.clone()])
        .await
        .unwrap()
        .is_empty());

    let patch = SnippetPatch {
        title: Some("Stolen".to_string()),
        ..Default::default()
    };
    assert!(store.update_one("bob", &mine.id, &patch).await.unwrap().is_none());
    assert!(!store.delete_one("bob", &mine.id).await.unwrap());

    let still = store.find_one("alice", &mine.id).await.unwrap().unwrap();
    assert_eq!(still, mine);
}

#[tokio::test]
async fn test_store_update_and_delete() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteSnippetStore::new(test_pool(&tmp).await);

    let created = store
        .create(
            "alice",
            &NewSnippet {
                language: Some("rust".to_string()),
                ..NewSnippet::new("Old", "x")
            },
        )
        .await
        .unwrap();

    let patch = SnippetPatch {
        title: Some("New".to_string()),
        language: Some(None),
        tags: Some(vec!["a".to_string(), " a ".to_string()]),
        ..Default::default()
    };
    let updated = store
        .update_one("alice", &created.id, &patch)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "New");
    assert_eq!(updated.language, None);
    assert_eq!(updated.tags, vec!["a", " a "]);
    assert_eq!(updated.created_at, created.created_at);

    let reread = store.find_one("alice", &created.id).await.unwrap().unwrap();
    assert_eq!(reread, updated);

    assert!(store.delete_one("alice", &created.id).await.unwrap());
    assert!(store.find_one("alice", &created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_rejects_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let store = SqliteSnippetStore::new(test_pool(&tmp).await);

    let err = store
        .create("alice", &NewSnippet::new("", "code"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Title must not be empty"));
}

// ─── Cache ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_glob_keys_and_delete() {
    let tmp = TempDir::new().unwrap();
    let cache = SqliteCache::new(test_pool(&tmp).await);
    let ttl = Duration::from_secs(60);

    cache.set("snippets:alice:a", "1".into(), ttl).await.unwrap();
    cache.set("snippets:alice:b", "2".into(), ttl).await.unwrap();
    cache.set("snippets:alicia:c", "3".into(), ttl).await.unwrap();

    let mut keys = cache.keys("snippets:alice:*").await.unwrap();
    keys.sort();
    assert_eq!(keys, vec!["snippets:alice:a", "snippets:alice:b"]);

    assert_eq!(cache.delete(&keys).await.unwrap(), 2);
    assert_eq!(cache.get("snippets:alice:a").await.unwrap(), None);
    assert_eq!(
        cache.get("snippets:alicia:c").await.unwrap().as_deref(),
        Some("3")
    );
}

#[tokio::test]
async fn test_cache_overwrite_and_expiry() {
    let tmp = TempDir::new().unwrap();
    let cache = SqliteCache::new(test_pool(&tmp).await);

    cache
        .set("k", "old".into(), Duration::from_secs(60))
        .await
        .unwrap();
    cache
        .set("k", "new".into(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));

    cache
        .set("short", "v".into(), Duration::from_millis(1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(cache.get("short").await.unwrap(), None);
    assert!(cache.keys("*").await.unwrap().iter().all(|k| k != "short"));
    assert_eq!(cache.purge_expired().await.unwrap(), 1);
}

// ─── Vector index ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_vector_index_search_and_remove() {
    let tmp = TempDir::new().unwrap();
    let index = SqliteVectorIndex::new(test_pool(&tmp).await, Arc::new(HashingEmbedder::default()));

    index
        .upsert("alice", record("a", "binary search over sorted slice"))
        .await
        .unwrap();
    index
        .upsert("alice", record("b", "http retry with exponential backoff"))
        .await
        .unwrap();
    index
        .upsert("bob", record("c", "http retry with exponential backoff"))
        .await
        .unwrap();

    let hits = index.search("alice", "exponential backoff retry", 5).await.unwrap();
    assert_eq!(hits[0], "b");
    assert!(!hits.contains(&"c".to_string()));

    let top1 = index.search("alice", "binary search", 1).await.unwrap();
    assert_eq!(top1, vec!["a"]);

    index.remove("alice", "b").await.unwrap();
    let hits = index.search("alice", "exponential backoff retry", 5).await.unwrap();
    assert!(!hits.contains(&"b".to_string()));
}

#[tokio::test]
async fn test_vector_index_upsert_replaces() {
    let tmp = TempDir::new().unwrap();
    let index = SqliteVectorIndex::new(test_pool(&tmp).await, Arc::new(HashingEmbedder::default()));

    index.upsert("alice", record("a", "css grid layout")).await.unwrap();
    index.upsert("alice", record("a", "tokio task spawn")).await.unwrap();

    let hits = index.search("alice", "tokio spawn", 5).await.unwrap();
    assert_eq!(hits, vec!["a"]);
}

#[tokio::test]
async fn test_vector_index_skips_other_models() {
    let tmp = TempDir::new().unwrap();
    let pool = test_pool(&tmp).await;

    let wide = SqliteVectorIndex::new(pool.clone(), Arc::new(HashingEmbedder::new(64)));
    wide.upsert("alice", record("a", "tokio spawn")).await.unwrap();

    let narrow = SqliteVectorIndex::new(pool, Arc::new(HashingEmbedder::new(32)));
    assert!(narrow.search("alice", "tokio spawn", 5).await.unwrap().is_empty());
}
