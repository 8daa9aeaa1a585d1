use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[async_trait]
pub trait GenerateBackend: Send + Sync {
    async fn generate(&self, base_url: &str, request: &GenerateRequest)
        -> Result<GenerateResponse>;
}

pub struct MissingGenerateBackend;

#[async_trait]
impl GenerateBackend for MissingGenerateBackend {
    async fn generate(
        &self,
        _base_url: &str,
        _request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        Err(anyhow!("generate backend is unavailable"))
    }
}

/// Client for an Ollama-compatible `/api/generate` endpoint.
pub struct OllamaClient {
    http: Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerateBackend for OllamaClient {
    async fn generate(
        &self,
        base_url: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let endpoint = format!("{base_url}/api/generate");
        // Non-2xx replies still carry a JSON `{"error": ..}` body.
        let body = self
            .http
            .post(&endpoint)
            .json(request)
            .send()
            .await
            .with_context(|| format!("failed to reach {endpoint}"))?
            .text()
            .await
            .with_context(|| format!("failed to read response from {endpoint}"))?;
        serde_json::from_str(&body)
            .with_context(|| format!("unexpected response from {endpoint}: {body}"))
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
