//! Deterministic cache keys.
//!
//! | Shape | Key |
//! |-------|-----|
//! | keyword listing | `snippets:{owner}:{query}:{tag}:{page}:{limit}` |
//! | single record | `snippets:{owner}:{id}` |
//! | semantic search | `snippets:{owner}:semantic:{query}:{top_k}` |
//!
//! Free-form components are percent-escaped so `:` and glob metacharacters
//! never appear unescaped inside a segment. Each shape has a distinct segment
//! count, so two different shapes cannot produce the same key.
//!
//! Every key for an owner starts with `snippets:{owner}:`, so
//! [`owner_pattern`] enumerates all of them for invalidation.

const PREFIX: &str = "snippets";

/// The query shape a cache entry was computed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryShape<'a> {
    Listing {
        query: Option<&'a str>,
        tag: Option<&'a str>,
        page: u32,
        limit: u32,
    },
    Semantic {
        query: &'a str,
        top_k: usize,
    },
    Record {
        id: &'a str,
    },
}

pub fn build_key(owner_id: &str, shape: &QueryShape<'_>) -> String {
    let owner = escape(owner_id);
    match shape {
        QueryShape::Listing {
            query,
            tag,
            page,
            limit,
        } => format!(
            "{PREFIX}:{owner}:{}:{}:{page}:{limit}",
            escape(query.unwrap_or("")),
            escape(tag.unwrap_or("")),
        ),
        QueryShape::Semantic { query, top_k } => {
            format!("{PREFIX}:{owner}:semantic:{}:{top_k}", escape(query))
        }
        QueryShape::Record { id } => format!("{PREFIX}:{owner}:{}", escape(id)),
    }
}

pub fn listing_key(
    owner_id: &str,
    query: Option<&str>,
    tag: Option<&str>,
    page: u32,
    limit: u32,
) -> String {
    build_key(
        owner_id,
        &QueryShape::Listing {
            query,
            tag,
            page,
            limit,
        },
    )
}

pub fn semantic_key(owner_id: &str, query: &str, top_k: usize) -> String {
    build_key(owner_id, &QueryShape::Semantic { query, top_k })
}

pub fn record_key(owner_id: &str, id: &str) -> String {
    build_key(owner_id, &QueryShape::Record { id })
}

/// Glob pattern matching every key in the owner's namespace.
pub fn owner_pattern(owner_id: &str) -> String {
    format!("{PREFIX}:{}:*", escape(owner_id))
}

fn escape(component: &str) -> String {
    let mut out = String::with_capacity(component.len());
    for ch in component.chars() {
        match ch {
            '%' | ':' | '*' | '?' | '[' | ']' | '{' | '}' | '\\' => {
                out.push_str(&format!("%{:02X}", ch as u32));
            }
            _ => out.push(ch),
        }
    }
    out
}
