//! In-memory stand-ins for the external services.

use crate::dataverse::ODataService;
use crate::search::{IndexSchema, SearchBackend};
use crate::source::ContentSource;
use crate::types::{FetchedContent, IndexedRecord, ItemDescriptor, RecordStatus, SearchHit};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tally_core::{AppError, AppResult};
use tally_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};

/// Canned reply; `AppError` is not `Clone`, so failures are rebuilt per call.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Auth,
    NotFound,
    Transient,
}

impl Reply {
    fn produce(&self) -> AppResult<Value> {
        match self {
            Reply::Json(v) => Ok(v.clone()),
            Reply::Auth => Err(AppError::Auth("token rejected".to_string())),
            Reply::NotFound => Err(AppError::NotFound("no such resource".to_string())),
            Reply::Transient => Err(AppError::Transient("service unavailable".to_string())),
        }
    }

    fn error(&self) -> AppError {
        match self.produce() {
            Err(e) => e,
            Ok(_) => AppError::Other("reply is not a failure".to_string()),
        }
    }
}

struct Route {
    path: String,
    needle: Option<String>,
    reply: Reply,
}

/// OData service answering from a route table.
///
/// A route matches on the exact path and, when a needle is given, on any
/// query value containing it. Unrouted requests are `NotFound`.
#[derive(Default)]
pub struct FakeOData {
    routes: Vec<Route>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeOData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, path: &str, needle: Option<&str>, reply: Reply) -> Self {
        self.routes.push(Route {
            path: path.to_string(),
            needle: needle.map(str::to_string),
            reply,
        });
        self
    }

    /// Register a table's entity definition and attributes.
    pub fn table(self, logical: &str, collection: &str, attributes: &[(&str, &str)]) -> Self {
        let attributes: Vec<Value> = attributes
            .iter()
            .map(|(name, kind)| json!({"LogicalName": name, "AttributeType": kind}))
            .collect();
        self.route(
            &format!("EntityDefinitions(LogicalName='{}')", logical),
            None,
            Reply::Json(json!({
                "LogicalName": logical,
                "EntitySetName": collection,
                "SchemaName": logical,
            })),
        )
        .route(
            &format!("EntityDefinitions(LogicalName='{}')/Attributes", logical),
            None,
            Reply::Json(json!({ "value": attributes })),
        )
    }

    /// Requests made against `path`, in order.
    pub fn requests_to(&self, path: &str) -> Vec<Vec<(String, String)>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, q)| q.clone())
            .collect()
    }
}

#[async_trait]
impl ODataService for FakeOData {
    async fn get(&self, path: &str, query: &[(String, String)]) -> AppResult<Value> {
        self.requests
            .lock()
            .unwrap()
            .push((path.to_string(), query.to_vec()));

        let route = self.routes.iter().find(|r| {
            r.path == path
                && r.needle
                    .as_deref()
                    .map_or(true, |n| query.iter().any(|(_, v)| v.contains(n)))
        });
        match route {
            Some(route) => route.reply.produce(),
            None => Reply::NotFound.produce(),
        }
    }
}

/// Search backend returning fixed hits.
pub struct FakeSearch {
    reply: Result<Vec<SearchHit>, Reply>,
    pub searches: AtomicUsize,
}

impl FakeSearch {
    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            reply: Ok(hits),
            searches: AtomicUsize::new(0),
        }
    }

    pub fn failing(reply: Reply) -> Self {
        Self {
            reply: Err(reply),
            searches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchBackend for FakeSearch {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_or_update_schema(&self, _schema: &IndexSchema) -> AppResult<()> {
        Ok(())
    }

    async fn upsert(&self, records: &[IndexedRecord]) -> AppResult<Vec<RecordStatus>> {
        Ok(records.iter().map(|r| RecordStatus::ok(&r.id)).collect())
    }

    async fn search(&self, _text: &str, top_k: usize, _fields: &[String]) -> AppResult<Vec<SearchHit>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Ok(hits) => Ok(hits.iter().take(top_k).cloned().collect()),
            Err(reply) => Err(reply.error()),
        }
    }
}

/// Model client that records every request.
pub struct FakeLlm {
    reply: Result<String, Reply>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<LlmRequest>>,
}

impl FakeLlm {
    pub fn answering(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn failing(reply: Reply) -> Self {
        Self {
            reply: Err(reply),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeLlm {
    fn provider_name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        match &self.reply {
            Ok(text) => Ok(LlmResponse {
                content: text.clone(),
                model: request.model.clone(),
                usage: LlmUsage::new(10, 5),
            }),
            Err(reply) => Err(reply.error()),
        }
    }
}

/// Source serving items from memory; items without content fail to fetch.
pub struct FakeSource {
    items: Vec<(ItemDescriptor, Option<String>)>,
}

impl FakeSource {
    pub fn new(entries: &[(&str, Option<&str>)]) -> Self {
        let items = entries
            .iter()
            .map(|(name, content)| {
                (
                    ItemDescriptor {
                        id: format!("id-{}", name),
                        name: name.to_string(),
                        url: format!("https://docs/{}", name),
                        mime_type: "text/plain".to_string(),
                        download_url: None,
                        size: content.map(|c| c.len() as u64),
                    },
                    content.map(str::to_string),
                )
            })
            .collect();
        Self { items }
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_items(&self, limit: Option<usize>) -> Vec<ItemDescriptor> {
        let limit = limit.unwrap_or(self.items.len());
        self.items.iter().take(limit).map(|(i, _)| i.clone()).collect()
    }

    async fn fetch_content(&self, item: &ItemDescriptor) -> FetchedContent {
        match self
            .items
            .iter()
            .find(|(i, _)| i.id == item.id)
            .and_then(|(_, content)| content.clone())
        {
            Some(text) => FetchedContent::new(text.clone().into_bytes(), Some(text)),
            None => FetchedContent::missing(),
        }
    }
}

pub fn hit(name: &str, content: &str) -> SearchHit {
    SearchHit {
        content: content.to_string(),
        document_name: name.to_string(),
        document_url: format!("https://docs/{}", name),
        rank: 1.0,
    }
}
