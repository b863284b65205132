//! # Snipvault Core
//!
//! Runtime-agnostic logic for Snipvault: snippet models and validation, the
//! error taxonomy, cache key builder, typed cache layer, store and vector
//! index abstractions with in-memory implementations, and the
//! [`SnippetService`](service::SnippetService) that ties them together.
//!
//! This crate contains no sqlx, HTTP, or filesystem code. SQLite adapters,
//! network embedders and the HTTP server live in the `snipvault` app crate.

pub mod cache;
pub mod cache_key;
pub mod error;
pub mod models;
pub mod service;
pub mod store;
pub mod validate;
pub mod vector;

pub use error::{SnippetError, SnippetResult, ValidationError};
pub use service::{ServiceSettings, SnippetService};
