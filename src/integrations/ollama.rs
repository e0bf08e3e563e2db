//! AI completion via the Ollama generate API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::AiConfig;
use crate::{Error, Result};

/// Sampling options for a completion request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionOptions {
    pub temperature: f32,
    #[serde(rename = "num_predict")]
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 100,
        }
    }
}

/// Free-form text completion backend
#[async_trait]
pub trait Completion: Send + Sync {
    /// Complete `prompt`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ai`] on timeout, non-200 status, or an empty reply
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: CompletionOptions,
}

/// Client for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    url: String,
    model: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &AiConfig) -> Result<Self> {
        Self::with_timeout(config.url.clone(), config.model.clone(), config.timeout)
    }

    /// Create a client for `url` with an explicit request timeout
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn with_timeout(url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url, model })
    }
}

#[async_trait]
impl Completion for OllamaClient {
    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Ai(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Ai(format!("completion API returned {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Ai(format!("invalid completion response: {e}")))?;

        extract_reply(&body).ok_or_else(|| Error::Ai("empty completion".to_string()))
    }
}

/// Pull the reply text out of a generate or chat response
fn extract_reply(body: &serde_json::Value) -> Option<String> {
    let text = body
        .get("response")
        .and_then(serde_json::Value::as_str)
        .or_else(|| body.get("message").and_then(serde_json::Value::as_str))
        .or_else(|| {
            body.get("message")
                .and_then(|m| m.get("content"))
                .and_then(serde_json::Value::as_str)
        })?
        .trim();

    (!text.is_empty()).then(|| text.to_string())
}
