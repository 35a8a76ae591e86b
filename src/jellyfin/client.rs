use super::connection;
use super::error::{ApiError, ApiResult};
use super::models::*;
use super::retry_policy::RetryPolicy;
use super::MediaServerApi;
use crate::metrics;
use crate::settings::SettingsProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ITEM_PAGE_SIZE: u64 = 1000;
/// Default bound on item pages per library, for servers that never report a total.
const MAX_ITEM_PAGES: u64 = 10_000;
const TOKEN_HEADER: &str = "X-Emby-Token";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP client for a Jellyfin-compatible server.
///
/// Settings are resolved on every call, so the client never caches a stale
/// host or token.
pub struct JellyfinClient {
    http: reqwest::Client,
    settings: Arc<dyn SettingsProvider>,
    retry_policy: RetryPolicy,
    item_page_size: u64,
    max_item_pages: u64,
}

impl JellyfinClient {
    pub fn new(
        settings: Arc<dyn SettingsProvider>,
        timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            settings,
            retry_policy,
            item_page_size: DEFAULT_ITEM_PAGE_SIZE,
            max_item_pages: MAX_ITEM_PAGES,
        })
    }

    pub fn with_item_page_size(mut self, page_size: u64) -> Self {
        self.item_page_size = page_size.max(1);
        self
    }

    /// Bounds item paging for servers that keep returning full pages.
    pub fn with_max_item_pages(mut self, max_pages: u64) -> Self {
        self.max_item_pages = max_pages.max(1);
        self
    }

    async fn send_once<T: DeserializeOwned>(&self, url: &str, token: &str) -> ApiResult<T> {
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                body.chars().take(MAX_ERROR_BODY_CHARS).collect()
            };
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))
    }

    /// GET `path` with retries on transient failures.
    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, path: &str) -> ApiResult<T> {
        let conn = connection::resolve(&self.settings.get())?;
        let url = format!("{}{}", conn.base_url, path);

        let mut attempt = 0;
        loop {
            match self.send_once::<T>(&url, &conn.token).await {
                Ok(value) => {
                    metrics::record_remote_request(endpoint, "ok");
                    return Ok(value);
                }
                Err(err) if self.retry_policy.should_retry(&err, attempt) => {
                    let delay = self.retry_policy.backoff(attempt);
                    warn!(
                        "{} request failed (attempt {}/{}): {}. Retrying in {:?}",
                        endpoint,
                        attempt + 1,
                        self.retry_policy.max_attempts,
                        err,
                        delay
                    );
                    metrics::record_remote_retry(endpoint);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    metrics::record_remote_request(endpoint, "error");
                    if err.is_transient() {
                        return Err(ApiError::RetriesExhausted {
                            attempts: attempt + 1,
                            last: Box::new(err),
                        });
                    }
                    return Err(err);
                }
            }
        }
    }

    fn items_path(&self, library_id: &str, start_index: u64) -> String {
        format!(
            "/Items?ParentId={}&Recursive=true&Fields=MediaSources,DateCreated&Limit={}&StartIndex={}",
            urlencoding::encode(library_id),
            self.item_page_size,
            start_index
        )
    }

    fn activity_path(query: &ActivityLogQuery) -> String {
        let mut path = format!(
            "/System/ActivityLog/Entries?startIndex={}&limit={}&hasUserId={}",
            query.start_index, query.limit, query.has_user_id
        );
        if let Some(min_date) = query.min_date.and_then(|ts| DateTime::from_timestamp(ts, 0)) {
            let formatted = min_date.format("%Y-%m-%dT%H:%M:%SZ").to_string();
            path.push_str(&format!("&minDate={}", urlencoding::encode(&formatted)));
        }
        path
    }
}

#[async_trait]
impl MediaServerApi for JellyfinClient {
    async fn system_info(&self) -> ApiResult<SystemInfo> {
        self.get_json("system_info", "/System/Info").await
    }

    async fn users(&self) -> ApiResult<Vec<RemoteUser>> {
        self.get_json("users", "/Users").await
    }

    async fn libraries(&self) -> ApiResult<Vec<RemoteLibrary>> {
        let folders: ListOrQuery<RemoteLibrary> =
            self.get_json("libraries", "/Library/MediaFolders").await?;
        Ok(folders.into_items())
    }

    async fn library_items(&self, library_id: &str) -> ApiResult<Vec<RemoteItem>> {
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        let mut start_index = 0u64;
        let mut pages = 0u64;

        loop {
            let page: QueryResult<RemoteItem> = self
                .get_json("items", &self.items_path(library_id, start_index))
                .await?;
            pages += 1;
            let fetched = page.items.len() as u64;
            let total = page.total_record_count;

            for item in page.items {
                let Some(id) = item.id.clone() else {
                    debug!("Skipping item without id in library {}", library_id);
                    continue;
                };
                if seen.insert(id) {
                    items.push(item);
                }
            }

            start_index += fetched;
            if fetched < self.item_page_size || total.is_some_and(|total| start_index >= total) {
                break;
            }
            if pages >= self.max_item_pages {
                warn!(
                    "Library {} hit the limit of {} pages after {} items",
                    library_id,
                    self.max_item_pages,
                    items.len()
                );
                break;
            }
        }

        debug!("Fetched {} items for library {}", items.len(), library_id);
        Ok(items)
    }

    async fn activity_log_page(
        &self,
        query: &ActivityLogQuery,
    ) -> ApiResult<Vec<ActivityLogEntry>> {
        let page: QueryResult<ActivityLogEntry> = self
            .get_json("activity_log", &Self::activity_path(query))
            .await?;
        Ok(page.items)
    }
}
