//! JSON-over-HTTP calls with bounded retry, shared by the embedding
//! providers and the assistant client.
//!
//! Retry strategy:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{provider} API error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} request failed: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid {provider} response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },
}

impl ApiError {
    pub fn malformed(provider: &'static str, reason: impl Into<String>) -> Self {
        ApiError::Malformed {
            provider,
            reason: reason.into(),
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Transport { .. } => true,
            ApiError::Malformed { .. } => false,
        }
    }
}

/// A JSON POST endpoint.
pub struct JsonEndpoint<'a> {
    pub provider: &'static str,
    pub url: &'a str,
    pub bearer: Option<&'a str>,
    pub max_retries: u32,
}

impl JsonEndpoint<'_> {
    /// POST `body` and decode the JSON response, retrying transient failures.
    pub async fn post(&self, client: &reqwest::Client, body: &Value) -> Result<Value, ApiError> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(provider = self.provider, attempt, ?delay, "retrying request");
                tokio::time::sleep(delay).await;
            }

            match self.post_once(client, body).await {
                Ok(json) => return Ok(json),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    tracing::warn!(provider = self.provider, error = %e, "transient API failure");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn post_once(&self, client: &reqwest::Client, body: &Value) -> Result<Value, ApiError> {
        let mut request = client.post(self.url).json(body);
        if let Some(token) = self.bearer {
            request = request.bearer_auth(token);
        }

        let transport = |source: reqwest::Error| ApiError::Transport {
            provider: self.provider,
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                provider: self.provider,
                status: status.as_u16(),
                body,
            });
        }
        response.json::<Value>().await.map_err(transport)
    }
}

pub fn client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}
