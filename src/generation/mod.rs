//! Chat-completion client abstraction and the Ollama adapter.
//!
//! The `/chat` handler retrieves grounding chunks from the corpus, assembles a
//! prompt, and hands it to this client. The adapter mirrors the embedding
//! adapter: direct HTTP against the Ollama runtime, non-streaming.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced while generating a chat completion.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached or timed out.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by completion providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a completion for `prompt` using the named model.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationClientError>;
}

/// Build a generation client from the process configuration.
pub fn get_generation_client() -> Box<dyn GenerationClient> {
    let config = get_config();
    Box::new(OllamaGenerationClient::new(
        config.ollama_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
    ))
}

/// Completion adapter speaking to a local Ollama runtime.
pub struct OllamaGenerationClient {
    http: Client,
    base_url: String,
}

impl OllamaGenerationClient {
    /// Construct an adapter for the given runtime base URL.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("corpusd/generate")
            .timeout(timeout)
            .build()
            .expect("Failed to construct reqwest::Client for generation");
        Self { http, base_url }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl GenerationClient for OllamaGenerationClient {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationClientError> {
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
        });

        let response = self
            .http
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Ollama endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaGenerateResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(GenerationClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
