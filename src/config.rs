//! TOML configuration.
//!
//! Every section has serde defaults, so an empty file is a valid config.
//! [`load_config`] parses the file and rejects out-of-range or unknown
//! values before anything is opened.
//!
//! ```toml
//! [db]
//! path = "./data/snipvault.sqlite"
//!
//! [cache]
//! backend = "sqlite"     # "memory" | "sqlite"
//! ttl_secs = 60
//!
//! [retrieval]
//! page_size = 15
//! max_page_size = 100
//! semantic_top_k = 15
//!
//! [embedding]
//! provider = "hash"      # "hash" | "openai" | "ollama" | "local" | "disabled"
//!
//! [assistant]
//! provider = "groq"      # "disabled" | "groq" | "openai"
//!
//! [server]
//! bind = "127.0.0.1:5001"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use snipvault_core::ServiceSettings;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/snipvault.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: String,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_cache_backend() -> String {
    "sqlite".to_string()
}
fn default_ttl_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    #[serde(default = "default_semantic_top_k")]
    pub semantic_top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            semantic_top_k: default_semantic_top_k(),
        }
    }
}

fn default_page_size() -> u32 {
    15
}
fn default_max_page_size() -> u32 {
    100
}
fn default_semantic_top_k() -> usize {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Override for the chat-completions base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: default_assistant_provider(),
            model: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_assistant_provider() -> String {
    "disabled".to_string()
}

impl AssistantConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5001".to_string()
}

impl Config {
    /// Service tunables derived from `[cache]` and `[retrieval]`.
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            cache_ttl: Duration::from_secs(self.cache.ttl_secs),
            page_size: self.retrieval.page_size,
            max_page_size: self.retrieval.max_page_size,
            semantic_top_k: self.retrieval.semantic_top_k,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }
    match config.cache.backend.as_str() {
        "memory" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown cache backend: '{}'. Must be memory or sqlite.",
            other
        ),
    }

    if config.retrieval.page_size == 0 {
        anyhow::bail!("retrieval.page_size must be > 0");
    }
    if config.retrieval.max_page_size < config.retrieval.page_size {
        anyhow::bail!("retrieval.max_page_size must be >= retrieval.page_size");
    }
    if config.retrieval.semantic_top_k == 0 {
        anyhow::bail!("retrieval.semantic_top_k must be > 0");
    }

    match config.embedding.provider.as_str() {
        "hash" | "openai" | "ollama" | "local" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, local, or disabled.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama")
        && config.embedding.model.is_none()
    {
        anyhow::bail!(
            "embedding.model must be specified when provider is '{}'",
            config.embedding.provider
        );
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.assistant.provider.as_str() {
        "disabled" | "groq" | "openai" => {}
        other => anyhow::bail!(
            "Unknown assistant provider: '{}'. Must be disabled, groq, or openai.",
            other
        ),
    }

    Ok(config)
}
