//! Configuration management for Tally.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.tally/config.yaml`, camelCase keys)
//! - Environment variables (`TALLY_*`)
//! - Command-line flags
//!
//! Secrets are never stored in the file; the file names the environment
//! variable that holds each secret (`apiKeyEnv`, `clientSecretEnv`, ...).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::retry::RetryPolicy;

/// Known generative model providers.
pub const KNOWN_PROVIDERS: [&str; 2] = ["azure-openai", "openai"];

/// Known search backends.
pub const KNOWN_BACKENDS: [&str; 2] = ["azure", "sqlite"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .tally/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    pub llm: LlmSettings,
    pub search: SearchSettings,
    pub dataverse: Option<DataverseSettings>,
    pub documents: DocumentSettings,
    pub auth: AuthSettings,
    pub retrieval: RetrievalSettings,
}

/// Generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Provider identifier ("azure-openai", "openai")
    pub provider: String,

    /// Base endpoint, e.g. `https://myres.openai.azure.com`
    pub endpoint: Option<String>,

    /// Model name, or deployment name for Azure OpenAI
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Azure OpenAI api-version query parameter
    pub api_version: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "azure-openai".to_string(),
            endpoint: None,
            model: "gpt-4".to_string(),
            api_key_env: "AZURE_OPENAI_API_KEY".to_string(),
            api_version: "2024-02-15-preview".to_string(),
        }
    }
}

/// Search index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchSettings {
    /// "azure" (Azure AI Search REST) or "sqlite" (local FTS5 index)
    pub backend: String,

    /// Search service endpoint (azure backend only)
    pub endpoint: Option<String>,

    /// Index name
    pub index_name: String,

    /// Environment variable holding the admin API key (azure backend only)
    pub api_key_env: String,

    /// Azure AI Search api-version
    pub api_version: String,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            backend: "sqlite".to_string(),
            endpoint: None,
            index_name: "documents".to_string(),
            api_key_env: "AZURE_SEARCH_KEY".to_string(),
            api_version: "2023-11-01".to_string(),
        }
    }
}

/// Structured-table source settings (Dataverse Web API).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataverseSettings {
    /// Environment URL, e.g. `https://org.crm.dynamics.com`
    pub environment_url: String,

    /// Web API version segment
    pub api_version: String,

    /// Logical table names whose rows are indexed by `index`
    pub tables: Vec<String>,

    /// Domain date fields, in priority order, tried before `createdon`
    pub preferred_date_fields: Vec<String>,

    /// Row cap for plain listings
    pub listing_top: usize,
}

impl Default for DataverseSettings {
    fn default() -> Self {
        Self {
            environment_url: String::new(),
            api_version: "v9.2".to_string(),
            tables: Vec::new(),
            preferred_date_fields: vec![
                "cr5cd_orderdate".to_string(),
                "orderdate".to_string(),
                "actualclosedate".to_string(),
                "estimatedclosedate".to_string(),
            ],
            listing_top: 5,
        }
    }
}

/// Document source settings.
///
/// A Graph drive and a local directory may both be set; each is indexed as
/// its own source in the same cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentSettings {
    /// Microsoft Graph drive id
    pub drive_id: Option<String>,

    /// Graph endpoint override (defaults to the public v1.0 endpoint)
    pub graph_endpoint: Option<String>,

    /// Local directory to index
    pub directory: Option<PathBuf>,

    /// Maximum items listed per index cycle
    pub list_limit: Option<usize>,
}

/// Credential settings.
///
/// With `tokenEnv` set, a pre-issued bearer token is read from that
/// variable. Otherwise the OAuth2 client-credentials grant is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret_env: String,
    pub token_env: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            tenant_id: None,
            client_id: None,
            client_secret_env: "TALLY_CLIENT_SECRET".to_string(),
            token_env: None,
        }
    }
}

/// Retrieval and indexing limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Characters of content kept per indexed record
    pub content_cap: usize,

    /// Characters of each hit passed to the model
    pub excerpt_chars: usize,

    /// Hits retrieved per question
    pub top_k: usize,

    /// Pages extracted from a PDF
    pub pdf_page_cap: usize,

    /// Concurrent downloads during an index cycle
    pub fetch_concurrency: usize,

    /// Retries for transient backend failures
    pub max_retries: u32,

    /// Base backoff delay in milliseconds
    pub retry_base_ms: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            content_cap: 5000,
            excerpt_chars: 1000,
            top_k: 3,
            pdf_page_cap: 10,
            fetch_concurrency: 4,
            max_retries: 3,
            retry_base_ms: 500,
        }
    }
}

impl RetrievalSettings {
    /// Backoff policy derived from these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_base_ms)
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    llm: Option<LlmSettings>,
    search: Option<SearchSettings>,
    dataverse: Option<DataverseSettings>,
    documents: Option<DocumentSettings>,
    auth: Option<AuthSettings>,
    retrieval: Option<RetrievalSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            llm: LlmSettings::default(),
            search: SearchSettings::default(),
            dataverse: None,
            documents: DocumentSettings::default(),
            auth: AuthSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `TALLY_WORKSPACE`: Override workspace path
    /// - `TALLY_CONFIG`: Path to config file
    /// - `TALLY_LLM_PROVIDER`, `TALLY_LLM_ENDPOINT`, `TALLY_LLM_MODEL`
    /// - `TALLY_SEARCH_BACKEND`, `TALLY_SEARCH_ENDPOINT`, `TALLY_SEARCH_INDEX`
    /// - `TALLY_DATAVERSE_URL`: Dataverse environment URL
    /// - `TALLY_DOCUMENTS_DIR`: Local directory document source
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use tally_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_from(None, None)
    }

    /// Like [`AppConfig::load`], with an explicit workspace and config file
    /// taking precedence over `TALLY_WORKSPACE` and `TALLY_CONFIG`.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| std::env::var("TALLY_WORKSPACE").ok().map(PathBuf::from)) {
            config.workspace = workspace;
        }

        if let Some(config_file) = config_file.or_else(|| std::env::var("TALLY_CONFIG").ok().map(PathBuf::from)) {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.workspace.join(".tally/config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        config.apply_env(|key| std::env::var(key).ok());

        Ok(config)
    }

    /// Apply `TALLY_*` overrides using the given variable lookup.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("TALLY_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Some(endpoint) = lookup("TALLY_LLM_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(model) = lookup("TALLY_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(backend) = lookup("TALLY_SEARCH_BACKEND") {
            self.search.backend = backend;
        }
        if let Some(endpoint) = lookup("TALLY_SEARCH_ENDPOINT") {
            self.search.endpoint = Some(endpoint);
        }
        if let Some(index) = lookup("TALLY_SEARCH_INDEX") {
            self.search.index_name = index;
        }
        if let Some(url) = lookup("TALLY_DATAVERSE_URL") {
            self.dataverse
                .get_or_insert_with(DataverseSettings::default)
                .environment_url = url;
        }
        if let Some(dir) = lookup("TALLY_DOCUMENTS_DIR") {
            self.documents.directory = Some(PathBuf::from(dir));
        }
        if let Some(level) = lookup("RUST_LOG") {
            self.log_level = Some(level);
        }
        if lookup("NO_COLOR").is_some() {
            self.no_color = true;
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(llm) = config_file.llm {
            result.llm = llm;
        }
        if let Some(search) = config_file.search {
            result.search = search;
        }
        if let Some(dataverse) = config_file.dataverse {
            result.dataverse = Some(dataverse);
        }
        if let Some(documents) = config_file.documents {
            result.documents = documents;
        }
        if let Some(auth) = config_file.auth {
            result.auth = auth;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the file.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the path to the .tally directory.
    pub fn tally_dir(&self) -> PathBuf {
        self.workspace.join(".tally")
    }

    /// Ensure the .tally directory exists.
    pub fn ensure_tally_dir(&self) -> AppResult<()> {
        let tally_dir = self.tally_dir();
        if !tally_dir.exists() {
            std::fs::create_dir_all(&tally_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .tally directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Read a secret from the environment variable named by `env_var`.
    pub fn resolve_secret(env_var: &str) -> Option<String> {
        std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
    }

    /// Validate provider, backend and endpoint requirements.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.llm.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "azure-openai" && self.llm.endpoint.is_none() {
            return Err(AppError::Config(
                "azure-openai provider requires llm.endpoint".to_string(),
            ));
        }

        let backend = self.search.backend.as_str();
        if !KNOWN_BACKENDS.contains(&backend) {
            return Err(AppError::Config(format!(
                "Unknown search backend: {}. Supported: {}",
                backend,
                KNOWN_BACKENDS.join(", ")
            )));
        }

        if backend == "azure" && self.search.endpoint.is_none() {
            return Err(AppError::Config(
                "azure search backend requires search.endpoint".to_string(),
            ));
        }

        if let Some(ref dataverse) = self.dataverse {
            if dataverse.environment_url.trim().is_empty() {
                return Err(AppError::Config(
                    "dataverse.environmentUrl must not be empty".to_string(),
                ));
            }
        }

        let retrieval = &self.retrieval;
        if retrieval.top_k == 0 || retrieval.content_cap == 0 || retrieval.excerpt_chars == 0 {
            return Err(AppError::Config(
                "retrieval.topK, contentCap and excerptChars must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
