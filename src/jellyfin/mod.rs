//! Client for the Jellyfin-compatible media server API.

mod client;
pub mod connection;
mod error;
mod models;
mod retry_policy;

pub use client::{JellyfinClient, DEFAULT_ITEM_PAGE_SIZE};
pub use error::{ApiError, ApiResult};
pub use models::*;
pub use retry_policy::RetryPolicy;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

/// Operations the sync pipeline needs from the remote server.
#[async_trait]
pub trait MediaServerApi: Send + Sync {
    async fn system_info(&self) -> ApiResult<SystemInfo>;

    async fn users(&self) -> ApiResult<Vec<RemoteUser>>;

    async fn libraries(&self) -> ApiResult<Vec<RemoteLibrary>>;

    /// Every item under a library, across all pages, deduplicated by id.
    async fn library_items(&self, library_id: &str) -> ApiResult<Vec<RemoteItem>>;

    async fn activity_log_page(&self, query: &ActivityLogQuery)
        -> ApiResult<Vec<ActivityLogEntry>>;

    /// Item count of one library. Never fails: errors become `ok = false`.
    async fn library_stats(&self, library_id: &str) -> RemoteLibraryStats {
        match self.library_items(library_id).await {
            Ok(items) => RemoteLibraryStats {
                library_id: library_id.to_string(),
                ok: true,
                item_count: items.len() as u64,
                error: None,
            },
            Err(err) => RemoteLibraryStats {
                library_id: library_id.to_string(),
                ok: false,
                item_count: 0,
                error: Some(err.to_string()),
            },
        }
    }

    /// Pages through the activity log starting at `query.start_index`.
    ///
    /// The stream ends after a short or empty page, or right after yielding
    /// the first error.
    fn activity_log_pages(
        &self,
        query: ActivityLogQuery,
    ) -> BoxStream<'_, ApiResult<Vec<ActivityLogEntry>>> {
        stream::unfold(Some(query), move |state| async move {
            let query = state?;
            match self.activity_log_page(&query).await {
                Ok(page) if page.is_empty() => None,
                Ok(page) => {
                    let next = (page.len() as u64 >= query.limit).then(|| ActivityLogQuery {
                        start_index: query.start_index + page.len() as u64,
                        ..query
                    });
                    Some((Ok(page), next))
                }
                Err(err) => Some((Err(err), None)),
            }
        })
        .boxed()
    }
}
