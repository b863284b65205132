//! Storage abstraction for snippets.
//!
//! The [`SnippetStore`] trait is the authoritative record. Every method takes
//! the owner identifier and applies it in the same filter as the id lookup,
//! so the ownership check is atomic with the operation: there is no
//! fetch-then-compare step for callers to get wrong.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{NewSnippet, Pagination, Snippet, SnippetFilter, SnippetPatch};

/// Abstract snippet store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create`](SnippetStore::create) | Validate, assign id and timestamps, persist |
/// | [`find_many`](SnippetStore::find_many) | Filtered page, newest first, plus total count |
/// | [`find_one`](SnippetStore::find_one) | Single owned record |
/// | [`find_by_ids`](SnippetStore::find_by_ids) | Batch lookup, order not preserved |
/// | [`update_one`](SnippetStore::update_one) | Validate and apply a patch atomically |
/// | [`delete_one`](SnippetStore::delete_one) | Remove an owned record |
///
/// Validation failures are returned as a wrapped
/// [`ValidationError`](crate::error::ValidationError) so callers can tell
/// them apart from infrastructure errors.
#[async_trait]
pub trait SnippetStore: Send + Sync {
    async fn create(&self, owner_id: &str, input: &NewSnippet) -> Result<Snippet>;

    async fn find_many(
        &self,
        owner_id: &str,
        filter: &SnippetFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Snippet>, u64)>;

    async fn find_one(&self, owner_id: &str, id: &str) -> Result<Option<Snippet>>;

    async fn find_by_ids(&self, owner_id: &str, ids: &[String]) -> Result<Vec<Snippet>>;

    /// Returns `None` when no record with this id belongs to the owner.
    async fn update_one(
        &self,
        owner_id: &str,
        id: &str,
        patch: &SnippetPatch,
    ) -> Result<Option<Snippet>>;

    /// Returns `false` when nothing was deleted.
    async fn delete_one(&self, owner_id: &str, id: &str) -> Result<bool>;
}
