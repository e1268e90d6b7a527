//! Keyword search backends.
//!
//! # Backends
//! - **Azure AI Search**: REST index with `mergeOrUpload` writes
//! - **SQLite**: local FTS5 index under `.tally/index/`

pub mod azure;
pub mod sqlite;

pub use azure::AzureSearchBackend;
pub use sqlite::SqliteSearchBackend;

use crate::config::get_index_path;
use crate::types::{IndexedRecord, RecordStatus, SearchHit};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_core::{AppConfig, AppError, AppResult};

/// A field in the search index schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub key: bool,
    pub searchable: bool,
    pub filterable: bool,
}

impl SchemaField {
    fn new(name: &str, key: bool, searchable: bool, filterable: bool) -> Self {
        Self {
            name: name.to_string(),
            key,
            searchable,
            filterable,
        }
    }
}

/// Search index schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<SchemaField>,
}

impl IndexSchema {
    /// Key `id`; searchable `content` and `documentName`; filterable
    /// `documentUrl` and `source`.
    pub fn default_for(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: vec![
                SchemaField::new("id", true, false, true),
                SchemaField::new("content", false, true, false),
                SchemaField::new("documentName", false, true, false),
                SchemaField::new("documentUrl", false, false, true),
                SchemaField::new("source", false, false, true),
            ],
        }
    }

    /// Names of searchable fields.
    pub fn searchable_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| f.name.clone())
            .collect()
    }
}

/// A keyword search index.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &str;

    /// Create the index or bring it in line with `schema`. Idempotent.
    async fn create_or_update_schema(&self, schema: &IndexSchema) -> AppResult<()>;

    /// Insert or replace records by id, reporting each record's outcome.
    async fn upsert(&self, records: &[IndexedRecord]) -> AppResult<Vec<RecordStatus>>;

    /// Keyword search over `fields` (all searchable fields when empty).
    ///
    /// Hits come back in backend rank order.
    async fn search(&self, text: &str, top_k: usize, fields: &[String]) -> AppResult<Vec<SearchHit>>;
}

/// Create the configured search backend.
pub fn create_backend(config: &AppConfig) -> AppResult<Arc<dyn SearchBackend>> {
    let settings = &config.search;
    match settings.backend.as_str() {
        "azure" => {
            let endpoint = settings.endpoint.as_deref().ok_or_else(|| {
                AppError::Config("azure search backend requires search.endpoint".to_string())
            })?;
            let api_key = AppConfig::resolve_secret(&settings.api_key_env).ok_or_else(|| {
                AppError::Auth(format!(
                    "Environment variable {} is not set",
                    settings.api_key_env
                ))
            })?;
            Ok(Arc::new(AzureSearchBackend::new(
                endpoint,
                &settings.index_name,
                api_key,
                &settings.api_version,
            )))
        }
        "sqlite" => {
            let path = get_index_path(&config.workspace, &settings.index_name);
            Ok(Arc::new(SqliteSearchBackend::open(&path)?))
        }
        other => Err(AppError::Config(format!(
            "Unknown search backend: {}",
            other
        ))),
    }
}
