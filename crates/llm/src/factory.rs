//! LLM provider factory.
//!
//! Creates the right [`LlmClient`] for a provider name, checking that the
//! secrets and endpoints the provider needs are present.

use crate::client::LlmClient;
use crate::providers::{AzureOpenAiClient, OpenAiClient};
use crate::types::ProviderType;
use std::sync::Arc;

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("azure-openai", "openai")
/// * `endpoint` - Resource endpoint (required for Azure OpenAI, optional base URL for OpenAI)
/// * `api_key` - API key
/// * `api_version` - Azure OpenAI api-version (ignored by OpenAI)
///
/// # Errors
/// Returns an error if the provider is unknown or a required setting is missing.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    api_version: &str,
) -> Result<Arc<dyn LlmClient>, String> {
    let provider_type =
        ProviderType::parse(provider).ok_or_else(|| format!("Unknown provider: {}", provider))?;

    match provider_type {
        ProviderType::AzureOpenAi => {
            let endpoint = endpoint.ok_or("Azure OpenAI provider requires an endpoint")?;
            let api_key = api_key.ok_or("Azure OpenAI provider requires API key")?;
            Ok(Arc::new(AzureOpenAiClient::new(endpoint, api_key, api_version)))
        }
        ProviderType::OpenAi => {
            let api_key = api_key.ok_or("OpenAI provider requires API key")?;
            let client = match endpoint {
                Some(base_url) => OpenAiClient::with_base_url(base_url, api_key),
                None => OpenAiClient::new(api_key),
            };
            Ok(Arc::new(client))
        }
    }
}
