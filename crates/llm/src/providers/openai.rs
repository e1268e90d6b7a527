//! OpenAI-compatible chat-completions provider.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::providers::chat::{send_chat, ChatRequest};
use std::time::Duration;
use tally_core::AppResult;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI LLM client.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client against the public OpenAI API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, api_key)
    }

    /// Create a client against any OpenAI-compatible base URL.
    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to OpenAI");
        tracing::debug!("Request: {:?}", request);

        let body = ChatRequest::from_request(request, true);
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key);

        let response = send_chat(builder, &body, "OpenAI", &request.model).await?;
        tracing::info!("Received completion from OpenAI");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiClient::with_base_url("http://localhost:8080/v1/", "sk-test");
        assert_eq!(client.provider_name(), "openai");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_body_carries_model() {
        let request = LlmRequest::new("Hello", "gpt-4o-mini").with_temperature(0.2);
        let body = ChatRequest::from_request(&request, true);
        assert_eq!(body.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(body.temperature, Some(0.2));
    }
}
