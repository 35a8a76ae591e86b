mod models;
mod schema;
mod sqlite_repository;
pub mod stats_aggregator;

pub use models::*;
pub use schema::MEDIA_VERSIONED_SCHEMAS;
pub use sqlite_repository::SqliteRepository;

use anyhow::Result;

/// Durable mirror of the remote media server.
///
/// Every mutating call runs in its own transaction: either all of its rows
/// land or none do.
pub trait Repository: Send + Sync {
    // Users
    fn upsert_users(&self, users: &[NewUser]) -> Result<UpsertOutcome>;
    /// Archives every non-archived user whose external id is not in `active_ids`.
    fn archive_missing_users(&self, active_ids: &[String]) -> Result<usize>;
    fn list_users(&self, include_archived: bool) -> Result<Vec<User>>;

    // Libraries
    /// Inserted libraries start tracked when `track_new` is set; existing
    /// rows keep their tracked flag.
    fn upsert_libraries(&self, libraries: &[NewLibrary], track_new: bool)
        -> Result<UpsertOutcome>;
    fn archive_missing_libraries(&self, active_ids: &[String]) -> Result<usize>;
    fn list_libraries(&self, include_archived: bool) -> Result<Vec<Library>>;
    fn get_library(&self, jellyfin_id: &str) -> Result<Option<Library>>;
    /// Returns false when no library has this external id.
    fn set_library_tracked(&self, jellyfin_id: &str, tracked: bool) -> Result<bool>;

    // Items
    fn upsert_items(&self, library_id: i64, items: &[NewItem]) -> Result<UpsertOutcome>;
    /// Archives items of one library that are missing from `active_ids`.
    fn archive_missing_items(&self, library_id: i64, active_ids: &[String]) -> Result<usize>;
    fn list_items(&self, library_id: i64, include_archived: bool) -> Result<Vec<Item>>;
    fn get_item(&self, jellyfin_id: &str) -> Result<Option<Item>>;

    // Playback activity
    fn upsert_playback_events(&self, events: &[PlaybackEvent]) -> Result<EventInsertOutcome>;
    fn get_playback_event(&self, activity_log_id: i64) -> Result<Option<PlaybackEvent>>;
    fn count_playback_events(&self) -> Result<i64>;

    // Statistics
    fn refresh_play_stats(&self) -> Result<StatsRefresh>;
    fn get_top_items_by_plays(&self, limit: usize) -> Result<Vec<TopItem>>;
    fn get_top_users_by_plays(&self, limit: usize) -> Result<Vec<TopUser>>;
    fn get_library_stats(&self, jellyfin_id: &str) -> Result<Option<LibraryStats>>;

    // Sync cursor
    fn get_last_sync_cursor(&self) -> Result<Option<i64>>;
    /// Never moves the cursor backwards. Returns the stored value.
    fn set_last_sync_cursor(&self, cursor: i64) -> Result<i64>;

    // Task log
    fn create_task_log(
        &self,
        name: &str,
        task_type: &str,
        execution_type: ExecutionType,
    ) -> Result<i64>;
    /// Moves a RUNNING row to `result`. Returns false if the row was already
    /// terminal or does not exist.
    fn complete_task_log(
        &self,
        task_id: i64,
        result: TaskResult,
        log: Option<&serde_json::Value>,
    ) -> Result<bool>;
    fn get_task_log(&self, task_id: i64) -> Result<Option<TaskLog>>;
    fn get_latest_task_log(&self, task_type: &str) -> Result<Option<TaskLog>>;
    fn get_latest_sync_task(&self) -> Result<Option<TaskLog>> {
        self.get_latest_task_log(SYNC_TASK_TYPE)
    }
    fn list_task_logs(&self, limit: usize) -> Result<Vec<TaskLog>>;
    /// Fails rows left RUNNING by a previous process.
    fn mark_stale_tasks_failed(&self) -> Result<usize>;
}
