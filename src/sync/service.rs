use super::mappers;
use super::result::SyncResult;
use crate::jellyfin::{ActivityLogQuery, ApiResult, MediaServerApi, RemoteLibraryStats, SystemInfo};
use crate::metrics;
use crate::store::{ExecutionType, Library, Repository, TaskLog, SYNC_TASK_TYPE};
use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const METADATA_TASK: &str = "Full Sync";
pub const ACTIVITY_FULL_TASK: &str = "Activity Log Sync (Full)";
pub const ACTIVITY_INCREMENTAL_TASK: &str = "Activity Log Incremental";
pub const INITIAL_TASK: &str = "Initial Server Setup Sync";
pub const PERIODIC_TASK: &str = "Periodic Sync";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncOptions {
    /// Page size of the full activity pull.
    pub activity_page_size: u64,
    /// Page size of the incremental activity pull.
    pub incremental_page_size: u64,
    /// Entries a single activity pass may read before it gives up.
    pub max_activity_entries: u64,
    /// Concurrent remote lookups for the library overview.
    pub library_concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            activity_page_size: 1000,
            incremental_page_size: 100,
            max_activity_entries: 250_000,
            library_concurrency: 8,
        }
    }
}

/// Latest sync task and the incremental cursor.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub last_sync: Option<TaskLog>,
    pub last_activity_cursor: Option<i64>,
}

/// What one activity pull read and wrote.
#[derive(Debug, Default)]
struct ActivityIngest {
    pages_ok: usize,
    max_activity_at: Option<i64>,
}

/// Pulls users, libraries, items and playback activity from the media server
/// into the repository.
///
/// Every public sync method writes one task log row and never returns an
/// error: failures end up in [`SyncResult::errors`].
pub struct SyncService {
    client: Arc<dyn MediaServerApi>,
    store: Arc<dyn Repository>,
    options: SyncOptions,
}

impl SyncService {
    pub fn new(
        client: Arc<dyn MediaServerApi>,
        store: Arc<dyn Repository>,
        options: SyncOptions,
    ) -> Self {
        Self {
            client,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Arc<dyn Repository> {
        &self.store
    }

    /// Brackets `body` with a task log row and turns any error it returns
    /// into a FAILED result.
    async fn run_task(
        &self,
        name: &str,
        execution_type: ExecutionType,
        body: impl Future<Output = Result<SyncResult>>,
    ) -> SyncResult {
        let started = Instant::now();
        let task_id = match self
            .store
            .create_task_log(name, SYNC_TASK_TYPE, execution_type)
        {
            Ok(id) => id,
            Err(e) => {
                error!("Could not record start of {}: {:#}", name, e);
                let mut result = SyncResult::failed(format!("{}: {:#}", name, e));
                result.duration_ms = started.elapsed().as_millis() as i64;
                metrics::record_sync_run(execution_type.as_str(), result.outcome.as_str(), started.elapsed());
                return result;
            }
        };
        info!("{} started (task {})", name, task_id);

        let mut result = match body.await {
            Ok(result) => result,
            Err(e) => {
                error!("{} failed: {:#}", name, e);
                SyncResult::failed(format!("{}: {:#}", name, e))
            }
        };
        let elapsed = started.elapsed();
        result.duration_ms = elapsed.as_millis() as i64;
        result.task_id = Some(task_id);

        if let Err(e) = self.store.complete_task_log(
            task_id,
            result.outcome,
            result.to_log_payload().as_ref(),
        ) {
            error!("Could not record end of {} (task {}): {:#}", name, task_id, e);
        }
        metrics::record_sync_run(execution_type.as_str(), result.outcome.as_str(), elapsed);

        if result.success {
            info!(
                "{} finished in {}ms: {} users, {} libraries, {} items, {} events",
                name,
                result.duration_ms,
                result.users_synced,
                result.libraries_synced,
                result.items_synced,
                result.events_processed
            );
        } else {
            warn!(
                "{} finished {} in {}ms with {} error(s): {}",
                name,
                result.outcome.as_str(),
                result.duration_ms,
                result.errors.len(),
                result.errors.join("; ")
            );
        }
        result
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Mirrors users, media libraries and the items of tracked libraries.
    /// With `auto_track`, newly seen media libraries start tracked.
    pub async fn sync_metadata(&self, auto_track: bool) -> SyncResult {
        self.run_task(
            METADATA_TASK,
            ExecutionType::Full,
            self.metadata_pass(auto_track),
        )
        .await
    }

    async fn metadata_pass(&self, auto_track: bool) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        let mut progress = false;

        match self.sync_users().await {
            Ok(count) => {
                result.users_synced = count;
                progress = true;
            }
            Err(e) => result.errors.push(format!("users: {:#}", e)),
        }

        match self.sync_libraries(auto_track).await {
            Ok(count) => {
                result.libraries_synced = count;
                progress = true;
            }
            Err(e) => result.errors.push(format!("libraries: {:#}", e)),
        }

        let tracked: Vec<Library> = self
            .store
            .list_libraries(false)?
            .into_iter()
            .filter(|library| library.tracked)
            .collect();
        for library in &tracked {
            match self.sync_library_items(library).await {
                Ok(count) => {
                    result.items_synced += count;
                    progress = true;
                }
                Err(e) => result
                    .errors
                    .push(format!("items for library {}: {:#}", library.name, e)),
            }
        }

        self.store
            .refresh_play_stats()
            .context("Failed to refresh library rollups")?;
        result.settle(progress);
        Ok(result)
    }

    async fn sync_users(&self) -> Result<usize> {
        let remote = self.client.users().await?;
        let users: Vec<_> = remote.iter().filter_map(mappers::map_user).collect();
        if users.len() < remote.len() {
            warn!("Skipped {} users without id or name", remote.len() - users.len());
        }

        let outcome = self.store.upsert_users(&users)?;
        let active: Vec<String> = remote.iter().filter_map(|u| u.id.clone()).collect();
        let archived = self.store.archive_missing_users(&active)?;
        debug!("Users: {:?}, archived {}", outcome, archived);
        Ok(outcome.total())
    }

    async fn sync_libraries(&self, auto_track: bool) -> Result<usize> {
        let remote = self.client.libraries().await?;
        let media: Vec<_> = remote
            .iter()
            .filter(|library| {
                mappers::is_media_collection(mappers::library_collection_type(library).as_deref())
            })
            .collect();
        debug!(
            "{} of {} remote libraries are movie or show collections",
            media.len(),
            remote.len()
        );

        let libraries: Vec<_> = media.iter().filter_map(|l| mappers::map_library(l)).collect();
        let outcome = self.store.upsert_libraries(&libraries, auto_track)?;
        let active: Vec<String> = media.iter().filter_map(|l| l.id.clone()).collect();
        let archived = self.store.archive_missing_libraries(&active)?;
        debug!("Libraries: {:?}, archived {}", outcome, archived);
        Ok(outcome.total())
    }

    async fn sync_library_items(&self, library: &Library) -> Result<usize> {
        let remote = self.client.library_items(&library.jellyfin_id).await?;
        let items: Vec<_> = remote.iter().filter_map(mappers::map_item).collect();
        if items.len() < remote.len() {
            warn!(
                "Skipped {} items without id or name in library {}",
                remote.len() - items.len(),
                library.name
            );
        }

        let outcome = self.store.upsert_items(library.id, &items)?;
        let active: Vec<String> = remote.iter().filter_map(|i| i.id.clone()).collect();
        let archived = self.store.archive_missing_items(library.id, &active)?;
        debug!(
            "Library {}: {:?}, archived {}",
            library.name, outcome, archived
        );
        Ok(outcome.total())
    }

    // =========================================================================
    // Activity
    // =========================================================================

    fn username_lookup(&self) -> Result<HashMap<String, String>> {
        Ok(self
            .store
            .list_users(true)?
            .into_iter()
            .map(|user| (user.jellyfin_id, user.name))
            .collect())
    }

    /// Reads activity pages from `query` on, storing playback-stop events.
    /// Remote failures and the entry bound end the pull with an error in
    /// `result`; store failures are returned.
    async fn ingest_activity(
        &self,
        query: ActivityLogQuery,
        result: &mut SyncResult,
    ) -> Result<ActivityIngest> {
        let usernames = self.username_lookup()?;
        let mut ingest = ActivityIngest::default();
        let mut entries_read = 0u64;
        let mut pages = self.client.activity_log_pages(query);

        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    result.errors.push(format!("activity log: {}", e));
                    break;
                }
            };

            entries_read += page.len() as u64;
            if entries_read > self.options.max_activity_entries {
                result.errors.push(format!(
                    "activity log: stopped after {} entries (limit {})",
                    entries_read, self.options.max_activity_entries
                ));
                break;
            }

            let events: Vec<_> = page
                .iter()
                .filter(|entry| mappers::is_playback_stop(entry))
                .filter_map(|entry| mappers::map_event(entry, &usernames))
                .collect();
            let outcome = self.store.upsert_playback_events(&events)?;
            metrics::record_events_ingested(outcome.inserted);

            result.events_processed += events.len();
            result.events_inserted += outcome.inserted;
            ingest.pages_ok += 1;
            ingest.max_activity_at = events
                .iter()
                .map(|event| event.activity_at)
                .chain(ingest.max_activity_at)
                .max();
        }
        Ok(ingest)
    }

    /// Re-reads the whole activity log. On success the cursor moves to one
    /// second past the newest event, or to now if there were none.
    pub async fn sync_activity_log_full(&self) -> SyncResult {
        self.run_task(
            ACTIVITY_FULL_TASK,
            ExecutionType::Full,
            self.activity_full_pass(),
        )
        .await
    }

    async fn activity_full_pass(&self) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        let query = ActivityLogQuery::new(self.options.activity_page_size);
        let ingest = self.ingest_activity(query, &mut result).await?;

        if result.errors.is_empty() {
            let cursor = ingest
                .max_activity_at
                .map(|ts| ts + 1)
                .unwrap_or_else(|| Utc::now().timestamp());
            result.cursor_advanced_to = Some(self.store.set_last_sync_cursor(cursor)?);
        }
        if result.events_processed > 0 {
            self.store.refresh_play_stats()?;
        }
        result.settle(ingest.pages_ok > 0);
        Ok(result)
    }

    /// Reads activity newer than the stored cursor. Without a cursor this is
    /// a successful no-op that never contacts the server.
    pub async fn sync_activity_log_incremental(&self) -> SyncResult {
        self.run_task(
            ACTIVITY_INCREMENTAL_TASK,
            ExecutionType::Incremental,
            self.activity_incremental_pass(),
        )
        .await
    }

    async fn activity_incremental_pass(&self) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        let Some(cursor) = self.store.get_last_sync_cursor()? else {
            info!("No activity cursor yet, skipping incremental activity sync");
            return Ok(result);
        };
        result.min_date_used = Some(cursor);

        let query =
            ActivityLogQuery::new(self.options.incremental_page_size).since(Some(cursor));
        let ingest = self.ingest_activity(query, &mut result).await?;

        if result.errors.is_empty() && result.events_processed > 0 {
            if let Some(newest) = ingest.max_activity_at {
                result.cursor_advanced_to = Some(self.store.set_last_sync_cursor(newest + 1)?);
            }
        }
        if result.events_processed > 0 {
            self.store.refresh_play_stats()?;
        }
        result.settle(ingest.pages_ok > 0);
        Ok(result)
    }

    // =========================================================================
    // Composite passes
    // =========================================================================

    /// First sync after the server is configured: metadata with auto-tracking
    /// followed by the full activity pull.
    pub async fn sync_initial(&self) -> SyncResult {
        self.run_task(INITIAL_TASK, ExecutionType::Initial, async {
            let metadata = self.sync_metadata(true).await;
            let activity = self.sync_activity_log_full().await;
            Ok(SyncResult::combine(&[metadata, activity]))
        })
        .await
    }

    /// Scheduled pass: metadata without auto-tracking, incremental activity,
    /// then a stats refresh.
    pub async fn sync_periodic(&self) -> SyncResult {
        self.run_task(PERIODIC_TASK, ExecutionType::Periodic, async {
            let metadata = self.sync_metadata(false).await;
            let activity = self.sync_activity_log_incremental().await;
            let result = SyncResult::combine(&[metadata, activity]);
            let refresh = self.store.refresh_play_stats()?;
            debug!("Periodic stats refresh: {:?}", refresh);
            Ok(result)
        })
        .await
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub fn status(&self) -> Result<SyncStatus> {
        Ok(SyncStatus {
            last_sync: self.store.get_latest_sync_task()?,
            last_activity_cursor: self.store.get_last_sync_cursor()?,
        })
    }

    pub async fn validate_connection(&self) -> ApiResult<SystemInfo> {
        self.client.system_info().await
    }

    /// Remote item counts for every non-archived library, fetched with
    /// bounded concurrency. Sorted by library id.
    pub async fn library_overview(&self) -> Result<Vec<RemoteLibraryStats>> {
        let libraries = self.store.list_libraries(false)?;
        let concurrency = self.options.library_concurrency.max(1);
        let client = &self.client;

        let mut stats: Vec<RemoteLibraryStats> = stream::iter(libraries)
            .map(|library| async move { client.library_stats(&library.jellyfin_id).await })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        stats.sort_by(|a, b| a.library_id.cmp(&b.library_id));
        Ok(stats)
    }
}
