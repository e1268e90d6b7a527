//! Prompt builder for rendering templates with retrieved context.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition, PromptExcerpt};
use handlebars::Handlebars;
use serde::Serialize;
use tally_core::{AppError, AppResult};

#[derive(Serialize)]
struct TemplateData<'a> {
    question: &'a str,
    excerpts: &'a [PromptExcerpt],
}

/// Build a prompt from a definition, a question and context excerpts.
///
/// Excerpts are rendered in the order given; callers pass them in
/// retrieval order.
///
/// # Example
/// ```
/// use tally_prompt::{build_prompt, default_answer_prompt, PromptExcerpt};
///
/// let def = default_answer_prompt();
/// let excerpts = vec![PromptExcerpt { label: "policy.pdf".into(), text: "Refunds take 5 days.".into() }];
/// let built = build_prompt(&def, "How long do refunds take?", &excerpts).unwrap();
/// assert!(built.user.contains("policy.pdf"));
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    question: &str,
    excerpts: &[PromptExcerpt],
) -> AppResult<BuiltPrompt> {
    tracing::debug!(
        "Building prompt {} with {} excerpts",
        definition.id,
        excerpts.len()
    );

    let data = TemplateData { question, excerpts };
    let user = render_template(&definition.template, &data)?;

    Ok(BuiltPrompt {
        system: definition.system.clone(),
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            excerpt_count: excerpts.len(),
            generation: definition.generation,
        },
    })
}

/// Render a Handlebars template.
fn render_template<T: Serialize>(template: &str, data: &T) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    handlebars
        .render("prompt", data)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
