//! Prompt loader.
//!
//! Prompts resolve from `.tally/prompts/<id>.yml` first and fall back to the
//! built-in definitions, so a workspace only needs a file to customize.

use crate::types::{GenerationSettings, PromptDefinition};
use std::path::Path;
use tally_core::{AppError, AppResult};

/// Identifier of the built-in answer prompt.
pub const ANSWER_PROMPT_ID: &str = "answer.default";

const ANSWER_SYSTEM: &str = "You answer questions using only the document excerpts provided. \
If the excerpts do not contain enough information to answer, say so plainly instead of guessing. \
Be concise.";

const ANSWER_TEMPLATE: &str = "Context:\n\
{{#each excerpts}}\
[{{label}}]\n\
{{text}}\n\n\
{{/each}}\
Question: {{question}}";

/// The built-in answer prompt.
pub fn default_answer_prompt() -> PromptDefinition {
    PromptDefinition {
        id: ANSWER_PROMPT_ID.to_string(),
        title: "Answer from retrieved documents".to_string(),
        api_version: "1.0".to_string(),
        system: ANSWER_SYSTEM.to_string(),
        template: ANSWER_TEMPLATE.to_string(),
        generation: GenerationSettings::default(),
    }
}

fn builtin(prompt_id: &str) -> Option<PromptDefinition> {
    match prompt_id {
        ANSWER_PROMPT_ID => Some(default_answer_prompt()),
        _ => None,
    }
}

/// Load a prompt definition by ID.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.tally/`
/// * `prompt_id` - Prompt identifier (e.g., "answer.default")
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(".tally/prompts")
        .join(format!("{}.yml", prompt_id));

    if !prompt_file.exists() {
        return builtin(prompt_id).ok_or_else(|| {
            AppError::Prompt(format!("Prompt file not found: {:?}", prompt_file))
        });
    }

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.template.is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    let temperature = def.generation.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        return Err(AppError::Prompt(format!(
            "Temperature out of range (0.0-2.0): {}",
            temperature
        )));
    }

    if def.generation.max_tokens == 0 {
        return Err(AppError::Prompt("maxTokens must be positive".to_string()));
    }

    Ok(())
}
