//! autopipe HTTP - chat-completions task executor
//!
//! Implements [`TaskExecutor`] against any OpenAI-compatible
//! `POST {base_url}/chat/completions` endpoint.
//!
//! # Example
//!
//! ```rust,ignore
//! use autopipe_http::{HttpExecutorConfig, HttpTaskExecutor};
//!
//! let executor = HttpTaskExecutor::new(HttpExecutorConfig::default())?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod wire;

use async_trait::async_trait;
use autopipe_core::{CompletionRequest, CompletionResponse, ExecutorError, TaskExecutor};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP executor settings (the `[executor]` table of the CLI config)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpExecutorConfig {
    /// API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the bearer token
    pub api_key_env: String,
    /// Transport-level timeout, independent of the stage timeout
    pub request_timeout_secs: u64,
}

impl Default for HttpExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            request_timeout_secs: 600,
        }
    }
}

impl HttpExecutorConfig {
    /// Full chat-completions URL
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// With base URL
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Task executor backed by a chat-completions HTTP API
#[derive(Clone)]
pub struct HttpTaskExecutor {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for HttpTaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTaskExecutor")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

impl HttpTaskExecutor {
    /// Build an executor, reading the API key from `config.api_key_env`
    ///
    /// A missing key is allowed; local servers often need none.
    ///
    /// # Errors
    /// Returns `ExecutorError::Transport` if the HTTP client cannot be built.
    pub fn new(config: HttpExecutorConfig) -> Result<Self, ExecutorError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty());
        if api_key.is_none() {
            tracing::warn!(
                env = %config.api_key_env,
                "No API key found, sending unauthenticated requests"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            model: config.model,
            api_key,
        })
    }

    /// Override the API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TaskExecutor for HttpTaskExecutor {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ExecutorError> {
        let body = wire::build_body(&self.model, &request);

        let mut http = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "Completion request rejected");
            return Err(ExecutorError::Provider {
                status: status.as_u16(),
                message: wire::error_message(&text),
            });
        }

        wire::parse_response(&text).map(CompletionResponse::new)
    }
}
