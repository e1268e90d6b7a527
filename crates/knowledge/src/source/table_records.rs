//! Table rows as indexable items.

use crate::dataverse::listing::display_value;
use crate::dataverse::{MetadataResolver, ODataService};
use crate::source::ContentSource;
use crate::types::{FetchedContent, ItemDescriptor};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tally_core::AppResult;

/// Rows fetched per table when no limit is given.
const DEFAULT_ROWS_PER_TABLE: usize = 100;

/// Indexes rows of configured tables, one item per row.
///
/// Row text is captured during listing, so `fetch_content` never goes back
/// to the service.
pub struct TableRecordSource {
    service: Arc<dyn ODataService>,
    resolver: Arc<MetadataResolver>,
    environment_url: String,
    tables: Vec<String>,
    rows: Mutex<HashMap<String, String>>,
}

impl TableRecordSource {
    pub fn new(
        service: Arc<dyn ODataService>,
        resolver: Arc<MetadataResolver>,
        environment_url: &str,
        tables: Vec<String>,
    ) -> Self {
        Self {
            service,
            resolver,
            environment_url: environment_url.trim_end_matches('/').to_string(),
            tables,
            rows: Mutex::new(HashMap::new()),
        }
    }

    async fn list_table(&self, table: &str, top: usize) -> AppResult<Vec<(ItemDescriptor, String)>> {
        let metadata = self.resolver.resolve(table).await?;
        let query = [("$top".to_string(), top.to_string())];
        let body = self.service.get(&metadata.collection_name, &query).await?;

        let rows = body
            .get("value")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(rows
            .iter()
            .map(|row| self.to_item(&metadata.logical_name, row))
            .collect())
    }

    fn to_item(&self, logical_name: &str, row: &serde_json::Value) -> (ItemDescriptor, String) {
        let record_id = record_id(logical_name, row);
        let url = match record_id {
            RecordId::Primary(ref rid) => format!(
                "{}/main.aspx?pagetype=entityrecord&etn={}&id={}",
                self.environment_url, logical_name, rid
            ),
            RecordId::Hashed(_) => self.environment_url.clone(),
        };

        let item = ItemDescriptor {
            id: format!("{}-{}", logical_name, record_id.value()),
            name: display_value(row).unwrap_or_else(|| logical_name.to_string()),
            url,
            mime_type: "text/plain".to_string(),
            download_url: None,
            size: None,
        };
        (item, row_content(row))
    }
}

enum RecordId {
    Primary(String),
    Hashed(String),
}

impl RecordId {
    fn value(&self) -> &str {
        match self {
            Self::Primary(v) | Self::Hashed(v) => v,
        }
    }
}

/// Primary id column, or a content hash when the row has none.
fn record_id(logical_name: &str, row: &serde_json::Value) -> RecordId {
    let primary = [format!("{}id", logical_name), "activityid".to_string(), "id".to_string()]
        .iter()
        .find_map(|k| row.get(k).and_then(|v| v.as_str()).map(str::to_string));

    match primary {
        Some(id) => RecordId::Primary(id),
        None => {
            let canonical: BTreeMap<&String, &serde_json::Value> = row
                .as_object()
                .map(|fields| fields.iter().collect())
                .unwrap_or_default();
            let digest = Sha256::digest(serde_json::to_vec(&canonical).unwrap_or_default());
            let hex: String = digest.iter().take(16).map(|b| format!("{:02x}", b)).collect();
            RecordId::Hashed(hex)
        }
    }
}

/// `field: value` lines for the row's string fields, sorted by field.
fn row_content(row: &serde_json::Value) -> String {
    let Some(fields) = row.as_object() else {
        return String::new();
    };

    let mut lines: Vec<(&String, &str)> = fields
        .iter()
        .filter(|(k, _)| !k.starts_with('@'))
        .filter_map(|(k, v)| v.as_str().filter(|s| !s.is_empty()).map(|s| (k, s)))
        .collect();
    lines.sort_by(|a, b| a.0.cmp(b.0));

    lines
        .into_iter()
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ContentSource for TableRecordSource {
    fn name(&self) -> &str {
        "dataverse"
    }

    async fn list_items(&self, limit: Option<usize>) -> Vec<ItemDescriptor> {
        let top = limit.unwrap_or(DEFAULT_ROWS_PER_TABLE).max(1);
        let mut items = Vec::new();

        for table in &self.tables {
            match self.list_table(table, top).await {
                Ok(rows) => {
                    tracing::info!(table = %table, count = rows.len(), "Listed table rows");
                    let mut cache = self.rows.lock().unwrap_or_else(|p| p.into_inner());
                    for (item, content) in rows {
                        cache.insert(item.id.clone(), content);
                        items.push(item);
                    }
                }
                Err(e) => {
                    tracing::warn!(table = %table, error_class = e.class(), "Table listing failed: {}", e);
                }
            }
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        items
    }

    async fn fetch_content(&self, item: &ItemDescriptor) -> FetchedContent {
        let rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        match rows.get(&item.id).filter(|c| !c.is_empty()) {
            Some(text) => FetchedContent::new(text.clone().into_bytes(), Some(text.clone())),
            None => FetchedContent::missing(),
        }
    }
}
