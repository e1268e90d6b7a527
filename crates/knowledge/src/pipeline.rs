//! The assembled system: sources, index, answerer and table queries.

use crate::auth::{credentials_from_config, CredentialProvider};
use crate::dataverse::{
    DataverseClient, EntityMetadata, MetadataResolver, ODataService, Resolution,
    TableQueryService,
};
use crate::indexer::Indexer;
use crate::progress::ProgressReporter;
use crate::rag::{AnswerResult, Answerer};
use crate::search::{create_backend, IndexSchema};
use crate::source::{ContentSource, DirectorySource, GraphDriveSource, TableRecordSource};
use crate::types::{Document, IndexStats};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tally_core::{AppConfig, AppError, AppResult};
use tally_llm::create_client;
use tally_prompt::{load_prompt, ANSWER_PROMPT_ID};

/// Default number of concurrent content fetches.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Entry point for indexing, answering and table queries.
pub struct Pipeline {
    sources: Vec<Arc<dyn ContentSource>>,
    indexer: Indexer,
    answerer: Result<Answerer, String>,
    tables: Option<TableQueryService>,
    list_limit: Option<usize>,
    fetch_concurrency: usize,
    progress: ProgressReporter,
}

impl Pipeline {
    pub fn new(indexer: Indexer, answerer: Answerer) -> Self {
        Self {
            sources: Vec::new(),
            indexer,
            answerer: Ok(answerer),
            tables: None,
            list_limit: None,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_source(mut self, source: Arc<dyn ContentSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_tables(mut self, tables: TableQueryService) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_list_limit(mut self, limit: Option<usize>) -> Self {
        self.list_limit = limit;
        self
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Build the pipeline described by `config`.
    ///
    /// A model that cannot be configured only fails [`Pipeline::ask`], so
    /// indexing and table queries work without model credentials.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let retrieval = &config.retrieval;
        let retry = retrieval.retry_policy();

        let backend = create_backend(config)?;
        let schema = IndexSchema::default_for(&config.search.index_name);
        let indexer = Indexer::new(backend.clone(), schema.clone())
            .with_content_cap(retrieval.content_cap)
            .with_retry(retry);

        let api_key = AppConfig::resolve_secret(&config.llm.api_key_env);
        let answerer = match create_client(
            &config.llm.provider,
            config.llm.endpoint.as_deref(),
            api_key.as_deref(),
            &config.llm.api_version,
        ) {
            Ok(llm) => {
                let prompt = load_prompt(&config.workspace, ANSWER_PROMPT_ID)?;
                Ok(Answerer::new(backend, llm, config.llm.model.as_str())
                    .with_prompt(prompt)
                    .with_search_fields(schema.searchable_fields())
                    .with_top_k(retrieval.top_k)
                    .with_excerpt_chars(retrieval.excerpt_chars)
                    .with_retry(retry))
            }
            Err(e) => {
                tracing::debug!("Model client unavailable: {}", e);
                Err(e)
            }
        };

        let mut credentials: Option<Arc<dyn CredentialProvider>> = None;
        let mut sources: Vec<Arc<dyn ContentSource>> = Vec::new();

        if let Some(ref drive_id) = config.documents.drive_id {
            let creds = shared_credentials(&mut credentials, config)?;
            sources.push(Arc::new(GraphDriveSource::new(
                config.documents.graph_endpoint.as_deref(),
                drive_id.as_str(),
                creds,
                retry,
                retrieval.pdf_page_cap,
            )));
        }

        if let Some(ref directory) = config.documents.directory {
            let root = if directory.is_absolute() {
                directory.clone()
            } else {
                config.workspace.join(directory)
            };
            sources.push(Arc::new(DirectorySource::new(root, retrieval.pdf_page_cap)));
        }

        let mut tables = None;
        if let Some(ref dataverse) = config.dataverse {
            if !dataverse.environment_url.is_empty() {
                let creds = shared_credentials(&mut credentials, config)?;
                let service: Arc<dyn ODataService> = Arc::new(DataverseClient::new(
                    &dataverse.environment_url,
                    &dataverse.api_version,
                    creds,
                    retry,
                ));
                let resolver = Arc::new(MetadataResolver::new(
                    service.clone(),
                    dataverse.preferred_date_fields.clone(),
                ));

                if !dataverse.tables.is_empty() {
                    sources.push(Arc::new(TableRecordSource::new(
                        service.clone(),
                        resolver.clone(),
                        &dataverse.environment_url,
                        dataverse.tables.clone(),
                    )));
                }
                tables = Some(TableQueryService::new(service, resolver, dataverse.listing_top));
            }
        }

        tracing::info!(
            sources = sources.len(),
            backend = %config.search.backend,
            tables = tables.is_some(),
            "Pipeline configured"
        );

        Ok(Self {
            sources,
            indexer,
            answerer,
            tables,
            list_limit: config.documents.list_limit,
            fetch_concurrency: retrieval.fetch_concurrency.max(1),
            progress: ProgressReporter::noop(),
        })
    }

    /// Names of the configured sources, in indexing order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run one index cycle over every source.
    ///
    /// Listing and fetch failures only shrink the batch. Upsert failures
    /// are counted, except authorization failures which end the cycle.
    pub async fn index_all(&self) -> AppResult<IndexStats> {
        let started = Instant::now();
        self.indexer.ensure_schema().await?;

        let mut stats = IndexStats::default();
        for source in &self.sources {
            let name = source.name();
            let items = source.list_items(self.list_limit).await;
            let total = items.len() as u64;
            self.progress.list(name, total);
            stats.fetched += items.len();

            if items.is_empty() {
                tracing::info!(source = name, "No items listed");
                continue;
            }

            let documents: Vec<Document> = stream::iter(items.iter())
                .map(|item| async move {
                    let content = source.fetch_content(item).await;
                    Document::from_item(item, name, content)
                })
                .buffered(self.fetch_concurrency)
                .enumerate()
                .map(|(i, document)| {
                    self.progress.fetch(name, i as u64 + 1, total, &document.name);
                    document
                })
                .collect()
                .await;

            let readable = documents
                .iter()
                .filter(|d| d.extracted_text.is_some())
                .count();
            stats.downloaded += readable;

            match self.indexer.upsert(&documents).await {
                Ok(report) => {
                    stats.indexed += report.succeeded;
                    stats.failed += report.failures.len();
                    self.progress.index(name, report.succeeded as u64, total);
                }
                Err(e @ AppError::Auth(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        source = name,
                        error_class = e.class(),
                        "Upsert failed: {}",
                        e
                    );
                    stats.failed += documents.len();
                }
            }
        }

        stats.duration_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            fetched = stats.fetched,
            downloaded = stats.downloaded,
            indexed = stats.indexed,
            failed = stats.failed,
            "Index cycle completed in {:.2}s",
            stats.duration_secs
        );
        Ok(stats)
    }

    /// Answer a question from the index.
    pub async fn ask(&self, question: &str) -> AppResult<AnswerResult> {
        match &self.answerer {
            Ok(answerer) => answerer.ask(question).await,
            Err(reason) => Err(AppError::Config(format!(
                "Model client is not configured: {}",
                reason
            ))),
        }
    }

    /// Resolve a table question.
    pub async fn resolve_aggregate(&self, text: &str) -> AppResult<Resolution> {
        self.table_service()?.resolve_aggregate(text).await
    }

    /// Resolved metadata for a table.
    pub async fn describe(&self, table: &str) -> AppResult<EntityMetadata> {
        self.table_service()?.describe(table).await
    }

    fn table_service(&self) -> AppResult<&TableQueryService> {
        self.tables.as_ref().ok_or_else(|| {
            AppError::Config("No table source configured (set dataverse.environmentUrl)".to_string())
        })
    }
}

/// One credential provider shared by every source that needs tokens.
fn shared_credentials(
    slot: &mut Option<Arc<dyn CredentialProvider>>,
    config: &AppConfig,
) -> AppResult<Arc<dyn CredentialProvider>> {
    if let Some(existing) = slot {
        return Ok(existing.clone());
    }
    let created = credentials_from_config(config)?;
    *slot = Some(created.clone());
    Ok(created)
}
