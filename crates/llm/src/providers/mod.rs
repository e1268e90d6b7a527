//! Generative model provider implementations.

pub mod azure_openai;
mod chat;
pub mod openai;

pub use azure_openai::AzureOpenAiClient;
pub use openai::OpenAiClient;
