//! Azure OpenAI chat-completions provider.
//!
//! Endpoint shape:
//! `POST {endpoint}/openai/deployments/{deployment}/chat/completions?api-version={v}`
//! with the key in the `api-key` header.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use crate::providers::chat::{send_chat, ChatRequest};
use std::time::Duration;
use tally_core::AppResult;

/// Azure OpenAI LLM client.
pub struct AzureOpenAiClient {
    endpoint: String,
    api_key: String,
    api_version: String,
    client: reqwest::Client,
}

impl AzureOpenAiClient {
    /// Create a client for the given resource endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            client,
        }
    }

    /// Completions URL for a deployment.
    fn completions_url(&self, deployment: &str) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        )
    }
}

#[async_trait::async_trait]
impl LlmClient for AzureOpenAiClient {
    fn provider_name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!("Sending completion request to Azure OpenAI");
        tracing::debug!("Request: {:?}", request);

        // The deployment is addressed in the URL, not the body.
        let body = ChatRequest::from_request(request, false);
        let builder = self
            .client
            .post(self.completions_url(&request.model))
            .header("api-key", &self.api_key);

        let response = send_chat(builder, &body, "Azure OpenAI", &request.model).await?;

        tracing::info!("Received completion from Azure OpenAI");
        tracing::debug!(
            "Token usage - Prompt: {}, Completion: {}",
            response.usage.prompt_tokens,
            response.usage.completion_tokens
        );

        Ok(response)
    }
}
