//! Document sources: a Microsoft Graph drive and a local directory.

use crate::auth::CredentialProvider;
use crate::extract::{extract_text, mime_from_path};
use crate::http;
use crate::source::ContentSource;
use crate::types::{FetchedContent, ItemDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_core::{with_backoff, AppError, AppResult, RetryPolicy};
use walkdir::WalkDir;

/// Default Graph endpoint.
pub const GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/v1.0";

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Page size requested from the drive listing.
const GRAPH_PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct DriveListing {
    #[serde(default)]
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
    #[serde(rename = "webUrl", default)]
    web_url: String,
    size: Option<u64>,
    file: Option<DriveFile>,
    #[serde(rename = "@microsoft.graph.downloadUrl")]
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
}

/// Files at the root of a OneDrive/SharePoint drive.
pub struct GraphDriveSource {
    http: reqwest::Client,
    endpoint: String,
    drive_id: String,
    credentials: Arc<dyn CredentialProvider>,
    retry: RetryPolicy,
    pdf_page_cap: usize,
}

impl GraphDriveSource {
    pub fn new(
        endpoint: Option<&str>,
        drive_id: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
        retry: RetryPolicy,
        pdf_page_cap: usize,
    ) -> Self {
        Self {
            http: http::client(),
            endpoint: endpoint
                .unwrap_or(GRAPH_ENDPOINT)
                .trim_end_matches('/')
                .to_string(),
            drive_id: drive_id.into(),
            credentials,
            retry,
            pdf_page_cap,
        }
    }

    fn children_url(&self, top: usize) -> String {
        format!(
            "{}/drives/{}/root/children?$top={}",
            self.endpoint, self.drive_id, top
        )
    }

    fn content_url(&self, item_id: &str) -> String {
        format!(
            "{}/drives/{}/items/{}/content",
            self.endpoint, self.drive_id, item_id
        )
    }

    async fn get_listing(&self, url: &str) -> AppResult<DriveListing> {
        let token = self.credentials.get_token(GRAPH_SCOPE).await?;
        let body = with_backoff(&self.retry, "drive listing", move || {
            http::send_json(self.http.get(url).bearer_auth(&token), "drive listing")
        })
        .await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn try_list(&self, limit: Option<usize>) -> AppResult<Vec<ItemDescriptor>> {
        let top = limit.unwrap_or(GRAPH_PAGE_SIZE).clamp(1, GRAPH_PAGE_SIZE);
        let mut next = Some(self.children_url(top));
        let mut items = Vec::new();

        while let Some(url) = next.take() {
            let listing = self.get_listing(&url).await?;
            for entry in listing.value {
                // Folders and packages carry no `file` facet
                let Some(file) = entry.file else { continue };
                let mime_type = file
                    .mime_type
                    .unwrap_or_else(|| mime_from_path(Path::new(&entry.name)));
                items.push(ItemDescriptor {
                    id: entry.id,
                    name: entry.name,
                    url: entry.web_url,
                    mime_type,
                    download_url: entry.download_url,
                    size: entry.size,
                });
            }

            if limit.is_some_and(|l| items.len() >= l) {
                break;
            }
            next = listing.next_link;
        }

        if let Some(limit) = limit {
            items.truncate(limit);
        }
        Ok(items)
    }

    async fn try_fetch(&self, item: &ItemDescriptor) -> AppResult<Vec<u8>> {
        match item.download_url {
            // Pre-authenticated, short-lived URL
            Some(ref url) => {
                with_backoff(&self.retry, "file download", move || {
                    http::send_bytes(self.http.get(url), "file download")
                })
                .await
            }
            None => {
                let token = self.credentials.get_token(GRAPH_SCOPE).await?;
                let url = self.content_url(&item.id);
                let (url, token) = (&url, &token);
                with_backoff(&self.retry, "file download", move || {
                    http::send_bytes(self.http.get(url).bearer_auth(token), "file download")
                })
                .await
            }
        }
    }
}

#[async_trait]
impl ContentSource for GraphDriveSource {
    fn name(&self) -> &str {
        "graph-drive"
    }

    async fn list_items(&self, limit: Option<usize>) -> Vec<ItemDescriptor> {
        match self.try_list(limit).await {
            Ok(items) => {
                tracing::info!(drive = %self.drive_id, count = items.len(), "Listed drive items");
                items
            }
            Err(e) => {
                tracing::warn!(error_class = e.class(), "Drive listing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_content(&self, item: &ItemDescriptor) -> FetchedContent {
        match self.try_fetch(item).await {
            Ok(bytes) => {
                let text = extract_text(&item.mime_type, &bytes, self.pdf_page_cap);
                FetchedContent::new(bytes, text)
            }
            Err(e) => {
                tracing::warn!(item = %item.name, error_class = e.class(), "Download failed: {}", e);
                FetchedContent::missing()
            }
        }
    }
}

/// Files under a local directory.
pub struct DirectorySource {
    root: PathBuf,
    pdf_page_cap: usize,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, pdf_page_cap: usize) -> Self {
        Self {
            root: root.into(),
            pdf_page_cap,
        }
    }

    fn try_list(&self, limit: Option<usize>) -> AppResult<Vec<ItemDescriptor>> {
        if !self.root.is_dir() {
            return Err(AppError::NotFound(format!(
                "Document directory {:?} does not exist",
                self.root
            )));
        }

        let mut items = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.path()))
            .filter_map(|e| e.ok())
        {
            if limit.is_some_and(|l| items.len() >= l) {
                break;
            }

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            items.push(ItemDescriptor {
                id: relative.to_string_lossy().replace('\\', "/"),
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                url: format!("file://{}", path.display()),
                mime_type: mime_from_path(path),
                download_url: None,
                size: entry.metadata().ok().map(|m| m.len()),
            });
        }

        Ok(items)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[async_trait]
impl ContentSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    async fn list_items(&self, limit: Option<usize>) -> Vec<ItemDescriptor> {
        match self.try_list(limit) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error_class = e.class(), "Directory listing failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn fetch_content(&self, item: &ItemDescriptor) -> FetchedContent {
        let path = self.root.join(&item.id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let text = extract_text(&item.mime_type, &bytes, self.pdf_page_cap);
                FetchedContent::new(bytes, text)
            }
            Err(e) => {
                tracing::warn!(item = %item.name, "Failed to read {:?}: {}", path, e);
                FetchedContent::missing()
            }
        }
    }
}
