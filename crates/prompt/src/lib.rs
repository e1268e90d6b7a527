//! Prompt system for Tally.
//!
//! Answer prompts are YAML definitions rendered with Handlebars:
//! - Built-in default (`answer.default`)
//! - Per-workspace overrides under `.tally/prompts/`
//! - Labelled context excerpts injected in retrieval order

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{default_answer_prompt, load_prompt, ANSWER_PROMPT_ID};
pub use types::{
    BuiltPrompt, BuiltPromptMetadata, GenerationSettings, PromptDefinition, PromptExcerpt,
};
