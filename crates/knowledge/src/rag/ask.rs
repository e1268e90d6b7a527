//! Question answering over the search index.
//!
//! A question runs through [`AskState`]: search the index, assemble bounded
//! excerpts, and ask the model to answer from them. Sources are the hits
//! exactly as the backend ranked them.

use crate::indexer::truncate_chars;
use crate::rag::types::{AnswerResult, AnswerOutcome, AskState, SourceRef};
use crate::search::SearchBackend;
use crate::types::SearchHit;
use std::sync::Arc;
use tally_core::{with_backoff, AppError, AppResult, RetryPolicy};
use tally_llm::{LlmClient, LlmRequest};
use tally_prompt::{build_prompt, default_answer_prompt, PromptDefinition, PromptExcerpt};

/// Default number of hits used as context.
pub const DEFAULT_TOP_K: usize = 3;

/// Default excerpt length per hit, in characters.
pub const DEFAULT_EXCERPT_CHARS: usize = 1000;

/// Retrieval-augmented answerer.
pub struct Answerer {
    backend: Arc<dyn SearchBackend>,
    llm: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    search_fields: Vec<String>,
    top_k: usize,
    excerpt_chars: usize,
    retry: RetryPolicy,
}

impl Answerer {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        llm: Arc<dyn LlmClient>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            llm,
            model: model.into(),
            prompt: default_answer_prompt(),
            search_fields: Vec::new(),
            top_k: DEFAULT_TOP_K,
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_prompt(mut self, prompt: PromptDefinition) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_search_fields(mut self, fields: Vec<String>) -> Self {
        self.search_fields = fields;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Answer a question from indexed content.
    ///
    /// Only authorization failures from the search backend are returned as
    /// errors. Every other failure produces a degraded answer.
    pub async fn ask(&self, question: &str) -> AppResult<AnswerResult> {
        let mut state = AskState::Idle;
        transition(&mut state, AskState::Searching);

        let hits = match self.search(question).await {
            Ok(hits) => hits,
            Err(e @ AppError::Auth(_)) => return Err(e),
            Err(e) => {
                tracing::warn!(error_class = e.class(), "Search failed: {}", e);
                return Ok(AnswerResult::degraded(Vec::new()));
            }
        };

        if hits.is_empty() {
            transition(&mut state, AskState::NoContext);
            return Ok(AnswerResult::no_context());
        }

        transition(&mut state, AskState::ContextAssembly);
        let sources = sources_from(&hits);
        let excerpts = self.excerpts(&hits);

        transition(&mut state, AskState::Generating);
        match self.generate(question, &excerpts).await {
            Ok(answer) => {
                transition(&mut state, AskState::Composed);
                Ok(AnswerResult {
                    answer,
                    sources,
                    outcome: AnswerOutcome::Composed,
                })
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.llm.provider_name(),
                    error_class = e.class(),
                    "Answer generation failed: {}",
                    e
                );
                Ok(AnswerResult::degraded(sources))
            }
        }
    }

    async fn search(&self, question: &str) -> AppResult<Vec<SearchHit>> {
        let (backend, fields, top_k) = (&self.backend, &self.search_fields, self.top_k);
        let hits = with_backoff(&self.retry, "search", move || {
            backend.search(question, top_k, fields)
        })
        .await?;

        tracing::debug!(backend = backend.name(), hits = hits.len(), "Search returned");
        Ok(hits)
    }

    fn excerpts(&self, hits: &[SearchHit]) -> Vec<PromptExcerpt> {
        hits.iter()
            .map(|hit| PromptExcerpt {
                label: hit.document_name.clone(),
                text: truncate_chars(&hit.content, self.excerpt_chars).to_string(),
            })
            .collect()
    }

    async fn generate(&self, question: &str, excerpts: &[PromptExcerpt]) -> AppResult<String> {
        let built = build_prompt(&self.prompt, question, excerpts)?;
        let settings = built.metadata.generation;

        let request = LlmRequest::new(built.user, self.model.as_str())
            .with_system(built.system)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens);

        let (llm, request) = (&self.llm, &request);
        let response = with_backoff(&self.retry, "answer generation", move || {
            llm.complete(request)
        })
        .await?;

        tracing::info!(
            model = %response.model,
            total_tokens = response.usage.total_tokens,
            "Answer generated"
        );
        Ok(response.content.trim().to_string())
    }
}

fn transition(state: &mut AskState, next: AskState) {
    tracing::debug!(from = state.as_str(), state = next.as_str(), "Ask state");
    *state = next;
}

/// Hits as citations, same order, no dedup.
fn sources_from(hits: &[SearchHit]) -> Vec<SourceRef> {
    hits.iter()
        .map(|hit| SourceRef {
            name: hit.document_name.clone(),
            url: hit.document_url.clone(),
        })
        .collect()
}
