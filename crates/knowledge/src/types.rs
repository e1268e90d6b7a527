//! Knowledge system type definitions.

use serde::{Deserialize, Serialize};

/// An entry yielded by a content source listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Stable identifier within the source; becomes the index key
    pub id: String,

    /// Display name (file name, record title)
    pub name: String,

    /// Link shown to users as the citation target
    pub url: String,

    /// MIME type used to dispatch extraction
    pub mime_type: String,

    /// Direct download location, when the source provides one
    pub download_url: Option<String>,

    /// Size in bytes, when known
    pub size: Option<u64>,
}

/// Bytes of one fetched item and the text extracted from them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedContent {
    pub raw_content: Vec<u8>,
    pub extracted_text: Option<String>,
}

impl FetchedContent {
    pub fn new(raw_content: Vec<u8>, extracted_text: Option<String>) -> Self {
        Self {
            raw_content,
            extracted_text,
        }
    }

    /// Nothing could be fetched.
    pub fn missing() -> Self {
        Self::default()
    }
}

/// A fetched item ready to be indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub url: String,
    pub mime_type: String,

    /// Name of the source that produced this document
    pub source: String,

    /// Bytes as fetched; empty when the fetch failed
    #[serde(skip)]
    pub raw_content: Vec<u8>,

    /// Extracted text; `None` means the item had no readable content
    pub extracted_text: Option<String>,
}

impl Document {
    /// Build a document from a listing entry and what was fetched for it.
    pub fn from_item(item: &ItemDescriptor, source: &str, content: FetchedContent) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            url: item.url.clone(),
            mime_type: item.mime_type.clone(),
            source: source.to_string(),
            raw_content: content.raw_content,
            extracted_text: content.extracted_text,
        }
    }
}

/// A record as stored in the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedRecord {
    /// Upsert key
    pub id: String,

    /// Searchable text, capped at the configured length
    pub content: String,

    pub document_name: String,
    pub document_url: String,
    pub source: String,
}

/// A single search result. Backend order is authoritative; `rank` is opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub content: String,
    pub document_name: String,
    pub document_url: String,
    pub rank: f64,
}

/// Outcome of writing one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordStatus {
    pub id: String,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl RecordStatus {
    pub fn ok(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// A record the index rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub id: String,
    pub reason: String,
}

/// Result of an upsert batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertReport {
    pub succeeded: usize,
    pub total: usize,
    pub failures: Vec<RecordFailure>,
}

impl UpsertReport {
    /// Fold per-record statuses into a report.
    pub fn from_statuses(statuses: &[RecordStatus]) -> Self {
        let failures: Vec<RecordFailure> = statuses
            .iter()
            .filter(|s| !s.succeeded)
            .map(|s| RecordFailure {
                id: s.id.clone(),
                reason: s.error.clone().unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        Self {
            succeeded: statuses.len() - failures.len(),
            total: statuses.len(),
            failures,
        }
    }
}

/// Statistics from an index cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Items listed across all sources
    pub fetched: usize,

    /// Items whose content was fetched and extracted
    pub downloaded: usize,

    /// Records accepted by the index
    pub indexed: usize,

    /// Records the index rejected
    pub failed: usize,

    pub duration_secs: f64,
}
