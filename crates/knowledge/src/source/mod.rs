//! Content sources feeding the indexer.
//!
//! A source lists items and fetches their text. Both operations degrade
//! instead of failing: a listing error yields no items and a fetch error
//! yields no content, so one bad item never aborts an index cycle.

pub mod documents;
pub mod table_records;

pub use documents::{DirectorySource, GraphDriveSource};
pub use table_records::TableRecordSource;

use crate::types::{FetchedContent, ItemDescriptor};
use async_trait::async_trait;

/// A provider of indexable items.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Source name, recorded on every indexed record.
    fn name(&self) -> &str;

    /// List up to `limit` items (all items when `None`).
    ///
    /// Failures are logged and produce an empty list.
    async fn list_items(&self, limit: Option<usize>) -> Vec<ItemDescriptor>;

    /// Fetch one item and extract its text.
    ///
    /// No extracted text marks missing content: unsupported type, unreadable
    /// bytes or a failed download. A failed download also has no bytes.
    async fn fetch_content(&self, item: &ItemDescriptor) -> FetchedContent;
}
