//! Behavioural tests for `SnippetService` over the in-memory backends.
//!
//! Fakes wrap or replace individual collaborators so each test can observe
//! exactly which backend calls a service operation makes.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;

use snipvault_core::cache::memory::InMemoryCache;
use snipvault_core::cache::CacheBackend;
use snipvault_core::cache_key;
use snipvault_core::models::{
    ListQuery, NewSnippet, Pagination, SemanticQuery, Snippet, SnippetFilter, SnippetPatch,
};
use snipvault_core::store::memory::InMemorySnippetStore;
use snipvault_core::store::SnippetStore;
use snipvault_core::vector::memory::InMemoryVectorIndex;
use snipvault_core::vector::{HashingEmbedder, VectorIndex, VectorRecord};
use snipvault_core::{ServiceSettings, SnippetError, SnippetService};

// ─── Fakes ──────────────────────────────────────────────────────────

/// Delegates to an in-memory store and counts read calls.
#[derive(Default)]
struct CountingStore {
    inner: InMemorySnippetStore,
    find_many_calls: AtomicUsize,
    find_one_calls: AtomicUsize,
    find_by_ids_calls: AtomicUsize,
}

impl CountingStore {
    fn reads(&self) -> usize {
        self.find_many_calls.load(Ordering::SeqCst)
            + self.find_one_calls.load(Ordering::SeqCst)
            + self.find_by_ids_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnippetStore for CountingStore {
    async fn create(&self, owner_id: &str, input: &NewSnippet) -> Result<Snippet> {
        self.inner.create(owner_id, input).await
    }

    async fn find_many(
        &self,
        owner_id: &str,
        filter: &SnippetFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Snippet>, u64)> {
        self.find_many_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_many(owner_id, filter, pagination).await
    }

    async fn find_one(&self, owner_id: &str, id: &str) -> Result<Option<Snippet>> {
        self.find_one_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(owner_id, id).await
    }

    async fn find_by_ids(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Snippet>> {
        self.find_by_ids_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.find_by_ids(owner_id, ids).await
    }

    async fn update_one(
        &self,
        owner_id: &str,
        id: &str,
        patch: &SnippetPatch,
    ) -> Result<Option<Snippet>> {
        self.inner.update_one(owner_id, id, patch).await
    }

    async fn delete_one(&self, owner_id: &str, id: &str) -> Result<bool> {
        self.inner.delete_one(owner_id, id).await
    }
}

/// Returns a preset ranking from `search`; optionally fails writes.
#[derive(Default)]
struct ScriptedIndex {
    ranking: Mutex<Vec<String>>,
    fail_upsert: AtomicBool,
    fail_remove: AtomicBool,
    removed: Mutex<Vec<String>>,
}

impl ScriptedIndex {
    fn ranking(&self, ids: &[&str]) {
        *self.ranking.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    async fn upsert(&self, _owner_id: &str, _record: VectorRecord) -> Result<()> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            bail!("vector index unavailable");
        }
        Ok(())
    }

    async fn search(&self, _owner_id: &str, _query: &str, top_k: usize) -> Result<Vec<String>> {
        let mut ids = self.ranking.lock().unwrap().clone();
        ids.truncate(top_k);
        Ok(ids)
    }

    async fn remove(&self, _owner_id: &str, id: &str) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            bail!("vector index unavailable");
        }
        self.removed.lock().unwrap().push(id.to_string());
        Ok(())
    }
}

/// Every call fails.
struct BrokenCache;

#[async_trait]
impl CacheBackend for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        bail!("connection refused")
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<()> {
        bail!("connection refused")
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        bail!("connection refused")
    }

    async fn delete(&self, _keys: &[String]) -> Result<usize> {
        bail!("connection refused")
    }
}

// ─── Harness ────────────────────────────────────────────────────────

struct Harness {
    store: Arc<CountingStore>,
    index: Arc<ScriptedIndex>,
    cache: Arc<InMemoryCache>,
    service: SnippetService,
}

fn harness() -> Harness {
    let store = Arc::new(CountingStore::default());
    let index = Arc::new(ScriptedIndex::default());
    let cache = Arc::new(InMemoryCache::new());
    let service = SnippetService::new(
        store.clone(),
        index.clone(),
        cache.clone(),
        ServiceSettings::default(),
    );
    Harness {
        store,
        index,
        cache,
        service,
    }
}

fn new_snippet(title: &str) -> NewSnippet {
    NewSnippet::new(title, format!("// {title}\nfn main() {{}}"))
}

fn list(q: Option<&str>, page: Option<u32>) -> ListQuery {
    ListQuery {
        q: q.map(str::to_string),
        page,
        ..Default::default()
    }
}

fn semantic(q: &str) -> SemanticQuery {
    SemanticQuery {
        q: Some(q.to_string()),
    }
}

async fn owner_keys(cache: &InMemoryCache, owner: &str) -> Vec<String> {
    cache.keys(&cache_key::owner_pattern(owner)).await.unwrap()
}

// ─── Read-through caching ───────────────────────────────────────────

#[tokio::test]
async fn test_listing_is_served_from_cache_on_repeat() {
    let h = harness();
    h.service.create_snippet("u1", new_snippet("one")).await.unwrap();

    let first = h.service.get_all_snippets("u1", list(None, None)).await.unwrap();
    let second = h.service.get_all_snippets("u1", list(None, None)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total_count, 1);
    assert_eq!(h.store.find_many_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_record_lookup_is_served_from_cache_on_repeat() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("one")).await.unwrap();

    let a = h.service.get_snippet_by_id("u1", &s.id).await.unwrap();
    let b = h.service.get_snippet_by_id("u1", &s.id).await.unwrap();

    assert_eq!(a, b);
    assert_eq!(h.store.find_one_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cached_listing_never_leaks_across_owners() {
    let h = harness();
    h.service.create_snippet("u1", new_snippet("mine")).await.unwrap();
    h.service.get_all_snippets("u1", list(None, None)).await.unwrap();

    let other = h.service.get_all_snippets("u2", list(None, None)).await.unwrap();
    assert!(other.snippets.is_empty());
    assert_eq!(other.total_count, 0);
}

// ─── Invalidation ───────────────────────────────────────────────────

async fn warm_every_shape(h: &Harness, owner: &str, id: &str) {
    h.index.ranking(&[id]);
    h.service.get_all_snippets(owner, list(None, None)).await.unwrap();
    h.service.get_all_snippets(owner, list(Some("fn"), Some(1))).await.unwrap();
    h.service.get_snippet_by_id(owner, id).await.unwrap();
    h.service.semantic_search(owner, semantic("main")).await.unwrap();
    assert_eq!(owner_keys(&h.cache, owner).await.len(), 4);
}

#[tokio::test]
async fn test_create_invalidates_owner_namespace() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("a")).await.unwrap();
    warm_every_shape(&h, "u1", &s.id).await;

    h.service.create_snippet("u1", new_snippet("b")).await.unwrap();
    assert!(owner_keys(&h.cache, "u1").await.is_empty());

    let page = h.service.get_all_snippets("u1", list(None, None)).await.unwrap();
    assert_eq!(page.total_count, 2);
    assert_eq!(page.snippets[0].title, "b");
}

#[tokio::test]
async fn test_update_invalidates_listing_and_record() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("before")).await.unwrap();
    warm_every_shape(&h, "u1", &s.id).await;

    let patch = SnippetPatch::from_json(&json!({ "title": "after" })).unwrap();
    h.service.update_snippet("u1", &s.id, patch).await.unwrap();
    assert!(owner_keys(&h.cache, "u1").await.is_empty());

    let fetched = h.service.get_snippet_by_id("u1", &s.id).await.unwrap();
    assert_eq!(fetched.title, "after");
    let page = h.service.get_all_snippets("u1", list(None, None)).await.unwrap();
    assert_eq!(page.snippets[0].title, "after");
}

#[tokio::test]
async fn test_writes_leave_other_owners_cache_alone() {
    let h = harness();
    let theirs = h.service.create_snippet("u2", new_snippet("theirs")).await.unwrap();
    warm_every_shape(&h, "u2", &theirs.id).await;

    h.service.create_snippet("u1", new_snippet("mine")).await.unwrap();
    assert_eq!(owner_keys(&h.cache, "u2").await.len(), 4);
}

// ─── Ownership ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_foreign_records_are_not_found() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("private")).await.unwrap();

    let get = h.service.get_snippet_by_id("u2", &s.id).await;
    assert!(matches!(get, Err(SnippetError::NotFound)));

    let patch = SnippetPatch::from_json(&json!({ "title": "hijacked" })).unwrap();
    let update = h.service.update_snippet("u2", &s.id, patch).await;
    assert!(matches!(update, Err(SnippetError::NotFound)));

    let delete = h.service.delete_snippet("u2", &s.id).await;
    assert!(matches!(delete, Err(SnippetError::NotFound)));

    let still_there = h.service.get_snippet_by_id("u1", &s.id).await.unwrap();
    assert_eq!(still_there.title, "private");
}

#[tokio::test]
async fn test_not_found_message_is_identical_for_missing_and_foreign() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("private")).await.unwrap();

    let foreign = h.service.get_snippet_by_id("u2", &s.id).await.unwrap_err();
    let missing = h.service.get_snippet_by_id("u2", "no-such-id").await.unwrap_err();
    assert_eq!(foreign.to_string(), missing.to_string());
}

// ─── Semantic search ────────────────────────────────────────────────

#[tokio::test]
async fn test_semantic_results_follow_index_order_and_drop_missing() {
    let h = harness();
    let a = h.service.create_snippet("u1", new_snippet("a")).await.unwrap();
    let b = h.service.create_snippet("u1", new_snippet("b")).await.unwrap();
    let c = h.service.create_snippet("u1", new_snippet("c")).await.unwrap();
    h.index.ranking(&[c.id.as_str(), "deleted-elsewhere", a.id.as_str(), b.id.as_str()]);

    let page = h.service.semantic_search("u1", semantic("anything")).await.unwrap();
    let ids: Vec<_> = page.snippets.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![c.id.as_str(), a.id.as_str(), b.id.as_str()]);
    assert_eq!(page.total_count, 3);
}

#[tokio::test]
async fn test_semantic_results_are_cached() {
    let h = harness();
    let a = h.service.create_snippet("u1", new_snippet("a")).await.unwrap();
    h.index.ranking(&[a.id.as_str()]);

    h.service.semantic_search("u1", semantic("q")).await.unwrap();
    h.service.semantic_search("u1", semantic("q")).await.unwrap();
    assert_eq!(h.store.find_by_ids_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_semantic_and_keyword_results_do_not_share_entries() {
    let h = harness();
    h.service.create_snippet("u1", new_snippet("a")).await.unwrap();
    h.index.ranking(&[]);

    let keyword = h.service.get_all_snippets("u1", list(Some("a"), None)).await.unwrap();
    let semantic_page = h.service.semantic_search("u1", semantic("a")).await.unwrap();
    assert_eq!(keyword.total_count, 1);
    assert_eq!(semantic_page.total_count, 0);
}

#[tokio::test]
async fn test_semantic_search_with_real_index_ranks_related_first() {
    let store = Arc::new(InMemorySnippetStore::new());
    let index = Arc::new(InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default())));
    let service = SnippetService::new(
        store,
        index,
        Arc::new(InMemoryCache::new()),
        ServiceSettings::default(),
    );
    service
        .create_snippet(
            "u1",
            NewSnippet::new("Window query", "SELECT rank() OVER (PARTITION BY team)"),
        )
        .await
        .unwrap();
    service
        .create_snippet(
            "u1",
            NewSnippet::new("Debounce", "function debounce(fn, wait) { clearTimeout(t) }"),
        )
        .await
        .unwrap();

    let page = service
        .semantic_search("u1", semantic("debounce wait function"))
        .await
        .unwrap();
    assert_eq!(page.snippets[0].title, "Debounce");
}

// ─── Validation ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_invalid_create_touches_nothing() {
    let h = harness();
    let err = h
        .service
        .create_snippet("u1", NewSnippet::new("   ", "code"))
        .await
        .unwrap_err();
    match err {
        SnippetError::Validation(v) => assert_eq!(v.problems, vec!["Title must not be empty"]),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(h.store.inner.is_empty());
    assert_eq!(h.store.reads(), 0);
}

#[tokio::test]
async fn test_invalid_update_leaves_record_unchanged() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("keep")).await.unwrap();

    let patch = SnippetPatch {
        code: Some("  ".to_string()),
        ..Default::default()
    };
    let err = h.service.update_snippet("u1", &s.id, patch).await.unwrap_err();
    assert!(matches!(err, SnippetError::Validation(_)));
    assert_eq!(h.service.get_snippet_by_id("u1", &s.id).await.unwrap(), s);
}

#[tokio::test]
async fn test_blank_semantic_query_and_owner_are_rejected() {
    let h = harness();
    let blank_q = h.service.semantic_search("u1", semantic("  ")).await;
    assert!(matches!(blank_q, Err(SnippetError::Validation(_))));
    let missing_q = h.service.semantic_search("u1", SemanticQuery::default()).await;
    assert!(matches!(missing_q, Err(SnippetError::Validation(_))));

    let blank_owner = h.service.get_all_snippets(" ", ListQuery::default()).await;
    assert!(matches!(blank_owner, Err(SnippetError::Validation(_))));
    assert_eq!(h.store.reads(), 0);
}

// ─── Pagination ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_thirty_two_items_paginate_fifteen_fifteen_two() {
    let h = harness();
    for i in 0..32 {
        h.service
            .create_snippet("u1", new_snippet(&format!("s{i:02}")))
            .await
            .unwrap();
    }

    let p1 = h.service.get_all_snippets("u1", list(None, Some(1))).await.unwrap();
    let p3 = h.service.get_all_snippets("u1", list(None, Some(3))).await.unwrap();
    let p4 = h.service.get_all_snippets("u1", list(None, Some(4))).await.unwrap();

    assert_eq!(p1.snippets.len(), 15);
    assert_eq!(p1.snippets[0].title, "s31");
    assert_eq!(p3.snippets.len(), 2);
    assert_eq!(p3.total_count, 32);
    assert_eq!(p3.snippets[1].title, "s00");
    assert!(p4.snippets.is_empty());
}

// ─── Delete ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_then_get_is_not_found_even_after_caching() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("doomed")).await.unwrap();
    h.service.get_snippet_by_id("u1", &s.id).await.unwrap();

    h.service.delete_snippet("u1", &s.id).await.unwrap();

    let err = h.service.get_snippet_by_id("u1", &s.id).await.unwrap_err();
    assert!(matches!(err, SnippetError::NotFound));
    assert_eq!(h.index.removed.lock().unwrap().as_slice(), [s.id.clone()]);

    let again = h.service.delete_snippet("u1", &s.id).await;
    assert!(matches!(again, Err(SnippetError::NotFound)));
}

// ─── Partial failures ───────────────────────────────────────────────

#[tokio::test]
async fn test_index_failure_on_create_rolls_back_store() {
    let h = harness();
    h.index.fail_upsert.store(true, Ordering::SeqCst);

    let err = h
        .service
        .create_snippet("u1", new_snippet("orphan"))
        .await
        .unwrap_err();
    assert!(matches!(err, SnippetError::Upstream(_)));
    assert!(h.store.inner.is_empty());
}

#[tokio::test]
async fn test_index_failure_on_update_and_delete_is_tolerated() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("x")).await.unwrap();
    h.index.fail_upsert.store(true, Ordering::SeqCst);
    h.index.fail_remove.store(true, Ordering::SeqCst);

    let patch = SnippetPatch::from_json(&json!({ "summary": "changed" })).unwrap();
    let updated = h.service.update_snippet("u1", &s.id, patch).await.unwrap();
    assert_eq!(updated.summary.as_deref(), Some("changed"));

    h.service.delete_snippet("u1", &s.id).await.unwrap();
    assert!(h.store.inner.is_empty());
}

#[tokio::test]
async fn test_cache_outage_degrades_to_store_reads() {
    let store = Arc::new(CountingStore::default());
    let service = SnippetService::new(
        store.clone(),
        Arc::new(ScriptedIndex::default()),
        Arc::new(BrokenCache),
        ServiceSettings::default(),
    );

    let s = service.create_snippet("u1", new_snippet("x")).await.unwrap();
    service.get_all_snippets("u1", ListQuery::default()).await.unwrap();
    service.get_all_snippets("u1", ListQuery::default()).await.unwrap();
    assert_eq!(store.find_many_calls.load(Ordering::SeqCst), 2);

    service.get_snippet_by_id("u1", &s.id).await.unwrap();
    service.delete_snippet("u1", &s.id).await.unwrap();
}

#[tokio::test]
async fn test_malformed_cache_entry_falls_back_to_store() {
    let h = harness();
    let s = h.service.create_snippet("u1", new_snippet("real")).await.unwrap();
    let key = cache_key::record_key("u1", &s.id);
    h.cache
        .set(&key, r#"{"title":"forged"}"#.to_string(), Duration::from_secs(60))
        .await
        .unwrap();

    let fetched = h.service.get_snippet_by_id("u1", &s.id).await.unwrap();
    assert_eq!(fetched.title, "real");
    assert_eq!(h.store.find_one_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_update_refreshes_real_index_metadata() {
    let index = Arc::new(InMemoryVectorIndex::new(Arc::new(HashingEmbedder::default())));
    let service = SnippetService::new(
        Arc::new(InMemorySnippetStore::new()),
        index.clone(),
        Arc::new(InMemoryCache::new()),
        ServiceSettings::default(),
    );
    let s = service.create_snippet("u1", new_snippet("old")).await.unwrap();
    let patch = SnippetPatch::from_json(&json!({ "title": "new", "tags": ["t"] })).unwrap();
    service.update_snippet("u1", &s.id, patch).await.unwrap();

    let meta = index.metadata("u1", &s.id).unwrap();
    assert_eq!(meta.title, "new");
    assert_eq!(meta.tags, vec!["t"]);

    service.delete_snippet("u1", &s.id).await.unwrap();
    assert!(!index.contains("u1", &s.id));
}

// ─── Stored values ──────────────────────────────────────────────────

#[tokio::test]
async fn test_title_and_tags_are_stored_as_given() {
    let h = harness();
    let input = NewSnippet::from_json(&json!({
        "title": "  t  ",
        "code": "c",
        "tags": ["b", "a", "b", " x "]
    }))
    .unwrap();
    let created = h.service.create_snippet("u1", input).await.unwrap();
    assert_eq!(created.title, "  t  ");
    assert_eq!(created.tags, vec!["b", "a", "b", " x "]);

    // Once from the store, once from the cache
    for _ in 0..2 {
        let fetched = h.service.get_snippet_by_id("u1", &created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    let patch = SnippetPatch::from_json(&json!({ "tags": ["z", "z"] })).unwrap();
    let updated = h.service.update_snippet("u1", &created.id, patch).await.unwrap();
    assert_eq!(updated.tags, vec!["z", "z"]);
}

#[tokio::test]
async fn test_long_titles_and_many_tags_are_accepted() {
    let h = harness();
    let tags: Vec<String> = (0..40).map(|i| format!("tag-{i}")).collect();
    let input = NewSnippet::from_json(&json!({
        "title": "t".repeat(500),
        "code": "c",
        "tags": tags
    }))
    .unwrap();
    let created = h.service.create_snippet("u1", input).await.unwrap();
    assert_eq!(created.title.len(), 500);
    assert_eq!(created.tags.len(), 40);
}
