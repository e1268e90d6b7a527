//! Knowledge layer for Tally.
//!
//! Indexes document stores and business tables into a keyword search index,
//! answers questions from that index with cited sources, and resolves
//! aggregate questions ("total revenue of opportunities in 2023") against
//! table records.
//!
//! The [`Pipeline`] wires everything from an [`tally_core::AppConfig`]:
//!
//! ```no_run
//! use tally_core::AppConfig;
//! use tally_knowledge::Pipeline;
//!
//! # async fn example() -> tally_core::AppResult<()> {
//! let config = AppConfig::load()?;
//! let pipeline = Pipeline::from_config(&config)?;
//! let stats = pipeline.index_all().await?;
//! println!("indexed {} of {}", stats.indexed, stats.fetched);
//!
//! let result = pipeline.ask("How long do refunds take?").await?;
//! println!("{}", result.answer);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod dataverse;
pub mod extract;
mod http;
pub mod indexer;
pub mod pipeline;
pub mod progress;
pub mod rag;
pub mod search;
pub mod source;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use dataverse::{AggregateResult, EntityMetadata, Resolution};
pub use indexer::Indexer;
pub use pipeline::Pipeline;
pub use progress::{ProgressEvent, ProgressReporter};
pub use rag::{AnswerOutcome, AnswerResult, Answerer, SourceRef};
pub use search::{create_backend, IndexSchema, SearchBackend};
pub use source::ContentSource;
pub use types::{Document, FetchedContent, IndexStats, IndexedRecord, ItemDescriptor, SearchHit, UpsertReport};
