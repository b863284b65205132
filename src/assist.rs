//! AI code assistant: explain a snippet, or translate it to another language.
//!
//! [`Assistant`] builds the prompts and validates input; the model call goes
//! through the [`TextGenerator`] trait. [`ChatCompletionsClient`] implements
//! it against any OpenAI-compatible `/chat/completions` endpoint (Groq by
//! default).

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::AssistantConfig;
use crate::http::{self, ApiError, JsonEndpoint};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

const EXPLAIN_SYSTEM_PROMPT: &str = "You are a senior software engineer. Explain the user's code \
clearly and briefly. Assume the reader knows the language, so skip syntax. Describe what the code \
is for, its key parts, and how they fit together, as a high-level overview rather than a \
line-by-line walkthrough.";

const TRANSLATE_SYSTEM_PROMPT: &str = "You are a software engineer fluent in many languages. \
Translate the user's code into the requested language, keeping its behaviour and structure. \
Reply with the translated code only, adding a short one-line comment only where a construct \
needs it.";

/// A single-turn text completion.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("AI assistant is not configured")]
    Disabled,

    #[error("{0}")]
    InvalidInput(String),

    #[error("assistant request failed: {0:#}")]
    Upstream(#[from] anyhow::Error),
}

#[derive(Clone)]
pub struct Assistant {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Assistant {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    pub fn disabled() -> Self {
        Self { generator: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn explain(&self, code: &str) -> Result<String, AssistError> {
        let generator = self.generator()?;
        let code = required("code", code)?;
        let text = generator
            .complete(
                EXPLAIN_SYSTEM_PROMPT,
                &format!("Explain the following code:\n\n{code}"),
            )
            .await?;
        Ok(text)
    }

    pub async fn translate(
        &self,
        code: &str,
        source_language: Option<&str>,
        target_language: &str,
    ) -> Result<String, AssistError> {
        let generator = self.generator()?;
        let code = required("code", code)?;
        let target = required("targetLanguage", target_language)?;
        let user = match source_language.map(str::trim).filter(|s| !s.is_empty()) {
            Some(source) => format!("Translate this {source} code to {target}:\n\n{code}"),
            None => format!("Translate this code to {target}:\n\n{code}"),
        };
        let text = generator.complete(TRANSLATE_SYSTEM_PROMPT, &user).await?;
        Ok(text)
    }

    fn generator(&self) -> Result<&Arc<dyn TextGenerator>, AssistError> {
        self.generator.as_ref().ok_or(AssistError::Disabled)
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, AssistError> {
    if value.trim().is_empty() {
        return Err(AssistError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Client for an OpenAI-compatible chat-completions API.
pub struct ChatCompletionsClient {
    provider: &'static str,
    url: String,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Build from `[assistant]`. The API key comes from `GROQ_API_KEY` or
    /// `OPENAI_API_KEY` depending on the provider.
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let (provider, key_var, base, model) = match config.provider.as_str() {
            "groq" => ("Groq", "GROQ_API_KEY", GROQ_BASE_URL, GROQ_DEFAULT_MODEL),
            "openai" => ("OpenAI", "OPENAI_API_KEY", OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL),
            other => anyhow::bail!("Unknown assistant provider: {}", other),
        };
        let api_key =
            std::env::var(key_var).map_err(|_| anyhow!("{key_var} environment variable not set"))?;
        let base = config.base_url.as_deref().unwrap_or(base);

        Ok(Self {
            provider,
            url: format!("{}/chat/completions", base.trim_end_matches('/')),
            model: config.model.clone().unwrap_or_else(|| model.to_string()),
            api_key,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        let endpoint = JsonEndpoint {
            provider: self.provider,
            url: &self.url,
            bearer: Some(&self.api_key),
            max_retries: 2,
        };
        let json = endpoint.post(&self.client, &body).await?;
        Ok(parse_completion(self.provider, &json)?)
    }
}

fn parse_completion(provider: &'static str, json: &Value) -> Result<String, ApiError> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::malformed(provider, "no completion content"))
}

/// Build the assistant selected by configuration.
pub fn create_assistant(config: &AssistantConfig) -> Result<Assistant> {
    if !config.is_enabled() {
        return Ok(Assistant::disabled());
    }
    let client = ChatCompletionsClient::from_config(config)?;
    Ok(Assistant::new(Arc::new(client)))
}
