//! Core data models used throughout Snipvault.
//!
//! [`Snippet`] is the authoritative record. [`NewSnippet`] and
//! [`SnippetPatch`] are validated inputs for create and update (see
//! [`crate::validate`]). [`SnippetPage`] is the response shape shared by
//! keyword listing and semantic search, and is also what gets cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored code snippet.
///
/// JSON field names follow the wire format consumed by clients
/// (`_id`, `userId`, camelCase timestamps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub title: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Snippet {
    /// Text handed to the vector index: title, code, and summary.
    pub fn embedding_text(&self) -> String {
        let mut parts = vec![self.title.as_str(), self.code.as_str()];
        if let Some(summary) = self.summary.as_deref() {
            if !summary.trim().is_empty() {
                parts.push(summary);
            }
        }
        parts.join("\n\n")
    }

    /// Build the derived vector index record for this snippet.
    pub fn vector_record(&self) -> crate::vector::VectorRecord {
        crate::vector::VectorRecord {
            id: self.id.clone(),
            text: self.embedding_text(),
            metadata: crate::vector::VectorMetadata {
                title: self.title.clone(),
                code: self.code.clone(),
                tags: self.tags.clone(),
                language: self.language.clone(),
            },
        }
    }

    /// Apply a validated patch in place and bump `updated_at`.
    ///
    /// `id`, `owner_id` and `created_at` are never touched.
    pub fn apply_patch(&mut self, patch: &SnippetPatch, now: DateTime<Utc>) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(code) = &patch.code {
            self.code = code.clone();
        }
        if let Some(language) = &patch.language {
            self.language = language.clone();
        }
        if let Some(framework) = &patch.framework {
            self.framework = framework.clone();
        }
        if let Some(summary) = &patch.summary {
            self.summary = summary.clone();
        }
        if let Some(tags) = &patch.tags {
            self.tags = tags.clone();
        }
        self.updated_at = now;
    }
}

/// Input for creating a snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSnippet {
    pub title: String,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl NewSnippet {
    pub fn new(title: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            code: code.into(),
            ..Default::default()
        }
    }

    /// Materialize the stored record. Callers validate first; field values,
    /// tag order and duplicate tags are kept exactly as given.
    pub fn into_snippet(self, owner_id: &str, id: String, now: DateTime<Utc>) -> Snippet {
        Snippet {
            id,
            owner_id: owner_id.to_string(),
            title: self.title,
            code: self.code,
            language: self.language,
            framework: self.framework,
            tags: self.tags.unwrap_or_default(),
            summary: self.summary,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update.
///
/// Outer `None` leaves a field unchanged. For the optional attributes,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnippetPatch {
    pub title: Option<String>,
    pub code: Option<String>,
    pub language: Option<Option<String>>,
    pub framework: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub summary: Option<Option<String>>,
}

impl SnippetPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.code.is_none()
            && self.language.is_none()
            && self.framework.is_none()
            && self.tags.is_none()
            && self.summary.is_none()
    }

    /// True if the patch changes any field that feeds the embedding text or
    /// the index metadata.
    pub fn touches_index(&self) -> bool {
        self.title.is_some()
            || self.code.is_some()
            || self.summary.is_some()
            || self.tags.is_some()
            || self.language.is_some()
    }
}

/// One page of snippets plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnippetPage {
    pub snippets: Vec<Snippet>,
    pub total_count: u64,
}

/// Keyword listing request as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Semantic search request. `q` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticQuery {
    #[serde(default)]
    pub q: Option<String>,
}

/// Store-level filter. Both conditions must hold when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnippetFilter {
    /// Case-insensitive substring matched against title OR code.
    pub query: Option<String>,
    /// Exact match against any element of `tags`.
    pub tag: Option<String>,
}

impl SnippetFilter {
    pub fn matches(&self, snippet: &Snippet) -> bool {
        if let Some(tag) = &self.tag {
            if !snippet.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(query) = &self.query {
            let needle = query.to_lowercase();
            if !snippet.title.to_lowercase().contains(&needle)
                && !snippet.code.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        true
    }
}

/// 1-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}
