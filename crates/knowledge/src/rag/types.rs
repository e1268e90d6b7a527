//! Answer types.

use serde::{Deserialize, Serialize};

/// Answer returned when the search found nothing.
pub const NO_CONTEXT_ANSWER: &str =
    "I could not find any relevant documents to answer your question.";

/// Answer returned when search or generation failed.
pub const APOLOGY_ANSWER: &str =
    "Sorry, I couldn't generate an answer right now. Please try again later.";

/// A cited document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub name: String,
    pub url: String,
}

/// How an answer came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Generated from retrieved context
    Composed,

    /// Nothing matched; the model was not called
    NoContext,

    /// A backend failed and the apology was returned
    Degraded,
}

/// Answer plus the documents it was grounded on, in retrieval order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub outcome: AnswerOutcome,
}

impl AnswerResult {
    pub fn no_context() -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
            outcome: AnswerOutcome::NoContext,
        }
    }

    pub fn degraded(sources: Vec<SourceRef>) -> Self {
        Self {
            answer: APOLOGY_ANSWER.to_string(),
            sources,
            outcome: AnswerOutcome::Degraded,
        }
    }
}

/// Stages of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AskState {
    Idle,
    Searching,
    ContextAssembly,
    Generating,
    Composed,
    NoContext,
}

impl AskState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::ContextAssembly => "context_assembly",
            Self::Generating => "generating",
            Self::Composed => "composed",
            Self::NoContext => "no_context",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_context_answer_has_no_sources() {
        let result = AnswerResult::no_context();
        assert_eq!(result.answer, NO_CONTEXT_ANSWER);
        assert!(result.sources.is_empty());
        assert_eq!(result.outcome, AnswerOutcome::NoContext);
    }

    #[test]
    fn test_serialized_shape() {
        let result = AnswerResult {
            answer: "Five days.".to_string(),
            sources: vec![SourceRef {
                name: "refunds.pdf".to_string(),
                url: "https://x/refunds.pdf".to_string(),
            }],
            outcome: AnswerOutcome::Composed,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["answer"], "Five days.");
        assert_eq!(json["sources"][0]["name"], "refunds.pdf");
        assert_eq!(json["outcome"], "composed");
    }
}
