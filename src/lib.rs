//! # Snipvault
//!
//! A personal code-snippet manager: keyword listing, semantic search, and an
//! AI assistant over each user's own snippets.
//!
//! The retrieval and caching logic lives in the `snipvault-core` crate. This
//! crate supplies the SQLite adapters behind its traits, the embedding and
//! chat providers, and the two front ends (HTTP API and CLI).
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────┐   ┌──────────┐
//!  │   CLI    │   │   HTTP   │
//!  └────┬─────┘   └────┬─────┘
//!       └──────┬───────┘
//!              ▼
//!      ┌───────────────┐      ┌───────────┐
//!      │ SnippetService│─────▶│ Assistant │──▶ chat API
//!      └───┬─────┬───┬─┘      └───────────┘
//!          ▼     ▼   ▼
//!      store  index  cache ──▶ SQLite (snippets / snippet_vectors / cache_entries)
//!               │
//!               ▼
//!           Embedder ──▶ hash / OpenAI / Ollama / fastembed
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |
//! | [`sqlite_store`] | `SnippetStore` over SQLite |
//! | [`vector_index`] | `VectorIndex` over SQLite blobs |
//! | [`cache`] | `CacheBackend` over SQLite |
//! | [`embedding`] | Embedding providers |
//! | [`http`] | JSON POST with retry |
//! | [`assist`] | AI explain / translate |
//! | [`factory`] | Wiring from config |
//! | [`server`] | HTTP API |

pub mod assist;
pub mod cache;
pub mod config;
pub mod db;
pub mod embedding;
pub mod factory;
pub mod http;
pub mod migrate;
pub mod server;
pub mod sqlite_store;
pub mod vector_index;
