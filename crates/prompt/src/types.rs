//! Prompt types for Tally.

use serde::{Deserialize, Serialize};

/// A prompt definition, built in or loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// System instruction sent with every request
    pub system: String,

    /// User message template with Handlebars syntax.
    ///
    /// Available variables: `question`, `excerpts` (list of `label`/`text`).
    pub template: String,

    /// Sampling settings applied uniformly to every request
    #[serde(default)]
    pub generation: GenerationSettings,
}

/// Sampling settings for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub temperature: f32,

    #[serde(rename = "maxTokens")]
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 500,
        }
    }
}

/// One labelled excerpt of retrieved context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptExcerpt {
    /// Document name
    pub label: String,

    /// Bounded excerpt of the document content
    pub text: String,
}

/// A fully built prompt ready for LLM execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system: String,
    pub user: String,
    pub metadata: BuiltPromptMetadata,
}

/// Metadata about a built prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    #[serde(rename = "excerptCount")]
    pub excerpt_count: usize,

    pub generation: GenerationSettings,
}
