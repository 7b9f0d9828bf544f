//! Completion service client.
//!
//! Single-shot POST of a prompt to a remote text-completion endpoint; returns
//! the first choice's trimmed text. No retry, no streaming, no caching.

use crate::config::CompletionConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client for the remote completion HTTP API.
#[derive(Clone)]
pub struct CompletionClient {
    endpoint: String,
    api_key: Option<String>,
    max_tokens: u32,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("completion api error: {0}")]
    Api(String),
    #[error("completion response contained no choices")]
    NoChoices,
}

impl CompletionError {
    /// Stable tag for the client-facing error event.
    pub fn kind(&self) -> &'static str {
        match self {
            CompletionError::Request(e) if e.is_timeout() => "timeout",
            CompletionError::Request(e) if e.is_decode() => "malformed",
            CompletionError::Request(_) => "network",
            CompletionError::Api(_) => "status",
            CompletionError::NoChoices => "malformed",
        }
    }
}

impl CompletionClient {
    /// Build a client from config and the credential resolved at startup.
    /// The credential is passed in explicitly; the client never reads the environment.
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Self {
        Self {
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        }
    }

    /// True when a bearer credential is configured.
    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST the prompt with the configured token cap; returns the first
    /// choice's text, whitespace-trimmed. The request is bounded by the
    /// configured timeout.
    pub async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let body = CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens: self.max_tokens,
        };
        let mut req = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(CompletionError::Api(format!("{} {}", status, body)));
        }
        let data: CompletionResponse = res.json().await?;
        let text = data
            .choices
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.text)
            .ok_or(CompletionError::NoChoices)?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    prompt: String,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Option<Vec<CompletionChoice>>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: Option<String>,
}
