//! HTTP client for the completion service behind alias suggestions.
//!
//! Speaks the Ollama `generate` API: one non-streaming request per prompt,
//! with the completion text in the `response` field of the reply.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tabledesk_core::{Error, SuggestionService};

use crate::config::SuggestConfig;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Completion client for an Ollama-compatible server.
pub struct OllamaClient {
    client: Client,
    endpoint: String,
    model: String,
    context_tokens: u32,
}

impl OllamaClient {
    pub fn new(config: &SuggestConfig) -> tabledesk_core::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Upstream(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.url.trim_end_matches('/')),
            model: config.model.clone(),
            context_tokens: config.context_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SuggestionService for OllamaClient {
    async fn complete(&self, prompt: &str) -> tabledesk_core::Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_ctx: self.context_tokens,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "Completion request failed");
                Error::Upstream(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "completion service returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let reply: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid completion reply: {}", e)))?;
        tracing::debug!(model = %self.model, chars = reply.response.len(), "Completion received");
        Ok(reply.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(url: &str) -> SuggestConfig {
        SuggestConfig {
            url: url.to_string(),
            model: "llama3".to_string(),
            context_tokens: 4096,
            timeout: Some(Duration::from_secs(1)),
            top_n: 3,
        }
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = OllamaClient::new(&config("http://localhost:11434/")).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "llama3",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { num_ctx: 4096 },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "model": "llama3",
                "prompt": "hi",
                "stream": false,
                "options": { "num_ctx": 4096 }
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_is_upstream_error() {
        // Nothing listens on the discard port.
        let client = OllamaClient::new(&config("http://127.0.0.1:9")).unwrap();
        assert!(matches!(client.complete("x").await, Err(Error::Upstream(_))));
    }
}
