//! Writes documents into the search index.

use crate::search::{IndexSchema, SearchBackend};
use crate::types::{Document, IndexedRecord, RecordStatus, UpsertReport};
use std::sync::Arc;
use tally_core::{with_backoff, AppResult, RetryPolicy};
use tokio::sync::Mutex;

/// Default cap on indexed content, in characters.
pub const DEFAULT_CONTENT_CAP: usize = 5000;

/// Single-writer front end over a [`SearchBackend`].
pub struct Indexer {
    backend: Arc<dyn SearchBackend>,
    schema: IndexSchema,
    content_cap: usize,
    retry: RetryPolicy,
    write_lock: Mutex<()>,
}

impl Indexer {
    pub fn new(backend: Arc<dyn SearchBackend>, schema: IndexSchema) -> Self {
        Self {
            backend,
            schema,
            content_cap: DEFAULT_CONTENT_CAP,
            retry: RetryPolicy::default(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_content_cap(mut self, cap: usize) -> Self {
        self.content_cap = cap;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Create or update the index schema.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        let (backend, schema) = (&self.backend, &self.schema);
        with_backoff(&self.retry, "schema update", move || {
            backend.create_or_update_schema(schema)
        })
        .await
    }

    /// Upsert documents, one record each.
    ///
    /// Documents without text are reported as failures and never sent.
    pub async fn upsert(&self, documents: &[Document]) -> AppResult<UpsertReport> {
        let mut statuses: Vec<RecordStatus> = Vec::with_capacity(documents.len());
        let mut records = Vec::with_capacity(documents.len());

        for document in documents {
            match self.to_record(document) {
                Some(record) => records.push(record),
                None => statuses.push(RecordStatus::failed(&document.id, "no extracted text")),
            }
        }

        if !records.is_empty() {
            let _guard = self.write_lock.lock().await;
            let (backend, records) = (&self.backend, &records);
            let written = with_backoff(&self.retry, "index upsert", move || {
                backend.upsert(records)
            })
            .await?;
            statuses.extend(written);
        }

        let report = UpsertReport::from_statuses(&statuses);
        tracing::info!(
            backend = self.backend.name(),
            succeeded = report.succeeded,
            total = report.total,
            "Upsert completed"
        );
        for failure in &report.failures {
            tracing::warn!(id = %failure.id, "Record not indexed: {}", failure.reason);
        }
        Ok(report)
    }

    /// Map a document to its index record, capping content length.
    pub fn to_record(&self, document: &Document) -> Option<IndexedRecord> {
        let text = document.extracted_text.as_deref()?;
        Some(IndexedRecord {
            id: document.id.clone(),
            content: truncate_chars(text, self.content_cap).to_string(),
            document_name: document.name.clone(),
            document_url: document.url.clone(),
            source: document.source.clone(),
        })
    }
}

/// The first `max` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SqliteSearchBackend;

    fn document(id: &str, text: Option<&str>) -> Document {
        Document {
            id: id.to_string(),
            name: format!("{}.txt", id),
            url: format!("file:///{}.txt", id),
            mime_type: "text/plain".to_string(),
            source: "directory".to_string(),
            raw_content: text.map(|t| t.as_bytes().to_vec()).unwrap_or_default(),
            extracted_text: text.map(str::to_string),
        }
    }

    fn indexer() -> (Indexer, Arc<SqliteSearchBackend>) {
        let backend = Arc::new(SqliteSearchBackend::open_in_memory().unwrap());
        let indexer = Indexer::new(backend.clone(), IndexSchema::default_for("documents"))
            .with_retry(RetryPolicy::none());
        (indexer, backend)
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_record_content_is_capped() {
        let (indexer, _) = indexer();
        let long = "ü".repeat(DEFAULT_CONTENT_CAP + 250);
        let record = indexer.to_record(&document("big", Some(&long))).unwrap();
        assert_eq!(record.content.chars().count(), DEFAULT_CONTENT_CAP);
        assert_eq!(record.document_name, "big.txt");
    }

    #[tokio::test]
    async fn test_upsert_reports_missing_text() {
        let (indexer, backend) = indexer();
        indexer.ensure_schema().await.unwrap();

        let report = indexer
            .upsert(&[document("a", Some("alpha")), document("b", None)])
            .await
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures[0].id, "b");
        assert_eq!(backend.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repeated_upsert_keeps_one_record_per_id() {
        let (indexer, backend) = indexer();
        let docs = [document("a", Some("alpha")), document("b", Some("beta"))];

        indexer.upsert(&docs).await.unwrap();
        let report = indexer.upsert(&docs).await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(backend.count().unwrap(), 2);
    }
}
