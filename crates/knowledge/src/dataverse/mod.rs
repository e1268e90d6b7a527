//! Structured business data over the Dataverse Web API (OData v4).
//!
//! Nothing here knows a table schema in advance. Logical names are resolved
//! to collections through live metadata, and aggregates are pushed down to
//! the service as `$apply` queries.

pub mod aggregate;
pub mod intent;
pub mod listing;
pub mod metadata;
pub mod resolve;

pub use aggregate::{build_apply, AggregateQuery, AggregateResult};
pub use intent::{parse_intent, AggregateIntent, Intent, Metric, PlainQuery};
pub use listing::{ListedRecord, PlainListing};
pub use metadata::{EntityMetadata, MetadataResolver};
pub use resolve::{Resolution, TableQueryService};

use crate::auth::CredentialProvider;
use crate::http;
use async_trait::async_trait;
use std::sync::Arc;
use tally_core::{with_backoff, AppResult, RetryPolicy};

/// Read access to an OData service.
///
/// `path` is relative to the service root (e.g. `accounts` or
/// `EntityDefinitions(LogicalName='account')`).
#[async_trait]
pub trait ODataService: Send + Sync {
    async fn get(&self, path: &str, query: &[(String, String)]) -> AppResult<serde_json::Value>;
}

/// Dataverse Web API client.
pub struct DataverseClient {
    http: reqwest::Client,
    base_url: String,
    scope: String,
    credentials: Arc<dyn CredentialProvider>,
    retry: RetryPolicy,
}

impl DataverseClient {
    /// Create a client for an environment such as `https://org.crm.dynamics.com`.
    pub fn new(
        environment_url: &str,
        api_version: &str,
        credentials: Arc<dyn CredentialProvider>,
        retry: RetryPolicy,
    ) -> Self {
        let environment = environment_url.trim_end_matches('/');
        Self {
            http: http::client(),
            base_url: format!("{}/api/data/{}", environment, api_version),
            scope: format!("{}/.default", environment),
            credentials,
            retry,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ODataService for DataverseClient {
    async fn get(&self, path: &str, query: &[(String, String)]) -> AppResult<serde_json::Value> {
        let token = self.credentials.get_token(&self.scope).await?;
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        tracing::debug!(%url, ?query, "OData request");

        let (url, token) = (&url, &token);
        with_backoff(&self.retry, "dataverse query", move || {
            let request = self
                .http
                .get(url)
                .bearer_auth(token)
                .header("Accept", "application/json")
                .header("OData-MaxVersion", "4.0")
                .header("OData-Version", "4.0")
                .query(query);
            http::send_json(request, "dataverse query")
        })
        .await
    }
}

/// Escape a value for use inside an OData string literal.
pub(crate) fn odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}
