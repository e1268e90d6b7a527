//! Retrieval-augmented answering.
//!
//! Answers are generated only from indexed content, with the matching
//! documents returned as sources.

pub mod ask;
pub mod types;

pub use ask::Answerer;
pub use types::{AnswerOutcome, AnswerResult, AskState, SourceRef, APOLOGY_ANSWER, NO_CONTEXT_ANSWER};
