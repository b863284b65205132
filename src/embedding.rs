//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations selected by `[embedding].provider`:
//! - **`hash`**: [`HashingEmbedder`] from the core crate. Offline, deterministic.
//! - **`openai`**: [`OpenAiEmbedder`], the OpenAI embeddings API with batching and retry.
//! - **`ollama`**: [`OllamaEmbedder`], a local Ollama instance's `/api/embed` endpoint.
//! - **`local`**: `FastEmbedEmbedder`, in-process models via fastembed
//!   (feature `local-embeddings-fastembed`).
//! - **`disabled`**: [`DisabledEmbedder`], which fails every call. Create and
//!   update then fail or degrade according to the service's rules.
//!
//! Use [`create_embedder`] to build the one the config asks for.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use snipvault_core::vector::{Embedder, HashingEmbedder};

use crate::config::EmbeddingConfig;
use crate::http::{self, ApiError, JsonEndpoint};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ============ Disabled ============

/// Fails every call with a descriptive error.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled")
    }
}

// ============ OpenAI ============

/// Calls `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAiEmbedder {
    model: String,
    dims: Option<usize>,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims: config.dims,
            api_key,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims.unwrap_or(0)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = JsonEndpoint {
            provider: "OpenAI",
            url: OPENAI_EMBEDDINGS_URL,
            bearer: Some(&self.api_key),
            max_retries: self.max_retries,
        };
        let json = endpoint.post(&self.client, &body).await?;
        let vectors = parse_openai_response(&json)?;
        check_shape(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| ApiError::malformed("OpenAI", "missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| ApiError::malformed("OpenAI", "missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map_or(position, |i| i as usize);
        indexed.push((index, parse_vector("OpenAI", embedding)?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Calls `POST /api/embed` on a local Ollama instance.
pub struct OllamaEmbedder {
    model: String,
    dims: Option<usize>,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);

        Ok(Self {
            model,
            dims: config.dims,
            url: format!("{}/api/embed", base.trim_end_matches('/')),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims.unwrap_or(0)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = JsonEndpoint {
            provider: "Ollama",
            url: &self.url,
            bearer: None,
            max_retries: self.max_retries,
        };
        let json = endpoint
            .post(&self.client, &body)
            .await
            .with_context(|| format!("Ollama embedding failed (is Ollama running at {}?)", self.url))?;
        let vectors = parse_ollama_response(&json)?;
        check_shape(&vectors, texts.len(), self.dims)?;
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| ApiError::malformed("Ollama", "missing embeddings array"))?
        .iter()
        .map(|embedding| parse_vector("Ollama", embedding))
        .collect()
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::FastEmbedEmbedder;

#[cfg(feature = "local-embeddings-fastembed")]
mod local {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, bail, Result};
    use async_trait::async_trait;
    use fastembed::{InitOptions, TextEmbedding};

    use snipvault_core::vector::Embedder;

    use crate::config::EmbeddingConfig;

    /// Runs a fastembed model in-process. The model is downloaded on first
    /// use and loaded once; `embed` needs `&mut`, hence the mutex.
    pub struct FastEmbedEmbedder {
        model_name: String,
        dims: usize,
        model: Arc<Mutex<Option<TextEmbedding>>>,
    }

    impl FastEmbedEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
            // Validate the name up front so a typo fails at startup.
            to_fastembed_model(&model_name)?;
            let dims = config.dims.unwrap_or(match model_name.as_str() {
                "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
                "bge-large-en-v1.5" => 1024,
                _ => 384,
            });
            Ok(Self {
                model_name,
                dims,
                model: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5",
                other
            ),
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }

        fn dims(&self) -> usize {
            self.dims
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let model = self.model.clone();
            let model_name = self.model_name.clone();
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut guard = model
                    .lock()
                    .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
                if guard.is_none() {
                    let options = InitOptions::new(to_fastembed_model(&model_name)?)
                        .with_show_download_progress(false);
                    let loaded = TextEmbedding::try_new(options).map_err(|e| {
                        anyhow!("Failed to initialize local embedding model: {}", e)
                    })?;
                    *guard = Some(loaded);
                }
                let Some(loaded) = guard.as_mut() else {
                    bail!("local embedding model unavailable");
                };
                loaded
                    .embed(texts, None)
                    .map_err(|e| anyhow!("Local embedding failed: {}", e))
            })
            .await?
        }
    }
}

// ============ Shared helpers ============

fn parse_vector(provider: &'static str, value: &Value) -> Result<Vec<f32>, ApiError> {
    value
        .as_array()
        .ok_or_else(|| ApiError::malformed(provider, "embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| ApiError::malformed(provider, "embedding holds a non-number"))
        })
        .collect()
}

fn check_shape(vectors: &[Vec<f32>], expected: usize, dims: Option<usize>) -> Result<()> {
    if vectors.len() != expected {
        bail!(
            "embedding provider returned {} vectors for {} inputs",
            vectors.len(),
            expected
        );
    }
    if let Some(dims) = dims {
        if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "embedding has {} dimensions, configured embedding.dims is {}",
                v.len(),
                dims
            );
        }
    }
    Ok(())
}

/// Build the [`Embedder`] selected by configuration.
///
/// | Config Value | Embedder |
/// |-------------|----------|
/// | `"hash"` | [`HashingEmbedder`] |
/// | `"openai"` | [`OpenAiEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `FastEmbedEmbedder` (feature `local-embeddings-fastembed`) |
/// | `"disabled"` | [`DisabledEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(match config.dims {
            Some(dims) => HashingEmbedder::new(dims),
            None => HashingEmbedder::default(),
        })),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(FastEmbedEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
