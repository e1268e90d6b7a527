//! Azure AI Search REST backend.

use crate::http;
use crate::search::{IndexSchema, SearchBackend};
use crate::types::{IndexedRecord, RecordStatus, SearchHit};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tally_core::AppResult;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexAction<'a> {
    #[serde(rename = "@search.action")]
    action: &'static str,
    id: String,
    content: &'a str,
    document_name: &'a str,
    document_url: &'a str,
    source: &'a str,
}

impl<'a> IndexAction<'a> {
    fn merge_or_upload(record: &'a IndexedRecord) -> Self {
        Self {
            action: "mergeOrUpload",
            id: document_key(&record.id),
            content: &record.content,
            document_name: &record.document_name,
            document_url: &record.document_url,
            source: &record.source,
        }
    }
}

/// Index keys allow only letters, digits, `_`, `-` and `=`; record ids are
/// paths and drive item ids, so they go out URL-safe base64 encoded.
fn document_key(id: &str) -> String {
    URL_SAFE_NO_PAD.encode(id.as_bytes())
}

#[derive(Debug, Deserialize)]
struct IndexingResponse {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

#[derive(Debug, Deserialize)]
struct IndexingResult {
    key: String,
    status: bool,
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<SearchDocument>,
}

#[derive(Debug, Deserialize)]
struct SearchDocument {
    #[serde(rename = "@search.score", default)]
    score: f64,
    #[serde(default)]
    content: String,
    #[serde(rename = "documentName", default)]
    document_name: String,
    #[serde(rename = "documentUrl", default)]
    document_url: String,
}

/// Per-record statuses, keyed back from encoded index keys to record ids.
fn statuses_by_key(records: &[IndexedRecord], response: IndexingResponse) -> Vec<RecordStatus> {
    let mut by_key: HashMap<String, IndexingResult> = response
        .value
        .into_iter()
        .map(|r| (r.key.clone(), r))
        .collect();

    records
        .iter()
        .map(|record| match by_key.remove(&document_key(&record.id)) {
            Some(result) if result.status => RecordStatus::ok(&record.id),
            Some(result) => RecordStatus::failed(
                &record.id,
                result
                    .error_message
                    .unwrap_or_else(|| "rejected by index".to_string()),
            ),
            None => RecordStatus::failed(&record.id, "no status returned"),
        })
        .collect()
}

/// Azure AI Search index client.
pub struct AzureSearchBackend {
    http: reqwest::Client,
    endpoint: String,
    index_name: String,
    api_key: String,
    api_version: String,
}

impl AzureSearchBackend {
    pub fn new(
        endpoint: &str,
        index_name: &str,
        api_key: impl Into<String>,
        api_version: &str,
    ) -> Self {
        Self {
            http: http::client(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            index_name: index_name.to_string(),
            api_key: api_key.into(),
            api_version: api_version.to_string(),
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!(
            "{}/indexes/{}{}?api-version={}",
            self.endpoint, self.index_name, suffix, self.api_version
        )
    }

    fn schema_body(schema: &IndexSchema) -> serde_json::Value {
        let fields: Vec<serde_json::Value> = schema
            .fields
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "type": "Edm.String",
                    "key": f.key,
                    "searchable": f.searchable,
                    "filterable": f.filterable,
                    "retrievable": true,
                })
            })
            .collect();
        json!({ "name": schema.name, "fields": fields })
    }
}

#[async_trait]
impl SearchBackend for AzureSearchBackend {
    fn name(&self) -> &str {
        "azure"
    }

    async fn create_or_update_schema(&self, schema: &IndexSchema) -> AppResult<()> {
        let request = self
            .http
            .put(self.url(""))
            .header("api-key", &self.api_key)
            .json(&Self::schema_body(schema));
        http::send(request, "index schema update").await?;

        tracing::info!(index = %self.index_name, "Search index schema applied");
        Ok(())
    }

    async fn upsert(&self, records: &[IndexedRecord]) -> AppResult<Vec<RecordStatus>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let actions: Vec<IndexAction> = records.iter().map(IndexAction::merge_or_upload).collect();

        let request = self
            .http
            .post(self.url("/docs/index"))
            .header("api-key", &self.api_key)
            .json(&json!({ "value": actions }));
        let body = http::send_json(request, "index upload").await?;
        let response: IndexingResponse = serde_json::from_value(body)?;

        Ok(statuses_by_key(records, response))
    }

    async fn search(&self, text: &str, top_k: usize, fields: &[String]) -> AppResult<Vec<SearchHit>> {
        let mut body = json!({
            "search": text,
            "top": top_k,
            "select": "content,documentName,documentUrl",
        });
        if !fields.is_empty() {
            body["searchFields"] = json!(fields.join(","));
        }

        let request = self
            .http
            .post(self.url("/docs/search"))
            .header("api-key", &self.api_key)
            .json(&body);
        let response: SearchResponse =
            serde_json::from_value(http::send_json(request, "search query").await?)?;

        Ok(response
            .value
            .into_iter()
            .map(|doc| SearchHit {
                content: doc.content,
                document_name: doc.document_name,
                document_url: doc.document_url,
                rank: doc.score,
            })
            .collect())
    }
}
