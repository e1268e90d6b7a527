//! LLM integration crate for Tally.
//!
//! Provider-agnostic access to chat-completion models through the
//! [`LlmClient`] trait.
//!
//! # Providers
//! - **Azure OpenAI**: deployment-addressed chat completions (default)
//! - **OpenAI**: any OpenAI-compatible `/chat/completions` endpoint
//!
//! # Example
//! ```no_run
//! use tally_llm::{LlmClient, LlmRequest, providers::AzureOpenAiClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureOpenAiClient::new("https://res.openai.azure.com", "key", "2024-02-15-preview");
//! let request = LlmRequest::new("Hello, world!", "gpt-4").with_max_tokens(50);
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use factory::create_client;
pub use providers::{AzureOpenAiClient, OpenAiClient};
pub use types::ProviderType;
