use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Mirrored entities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub jellyfin_id: String,
    pub name: String,
    pub is_admin: bool,
    pub total_plays: i64,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Library {
    pub id: i64,
    pub jellyfin_id: String,
    pub name: String,
    pub collection_type: Option<String>,
    pub image_url: Option<String>,
    /// User-controlled; reconciliation never touches it.
    pub tracked: bool,
    pub archived: bool,
    pub total_plays: i64,
    pub total_files: i64,
    pub total_time_seconds: i64,
    pub size_bytes: i64,
    pub total_playback_seconds: i64,
    pub last_played_item_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: i64,
    pub jellyfin_id: String,
    pub library_id: i64,
    pub parent_id: Option<String>,
    pub name: String,
    pub item_type: Option<String>,
    pub play_count: i64,
    pub runtime_seconds: Option<i64>,
    pub size_bytes: Option<i64>,
    pub date_created: Option<DateTime<Utc>>,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One playback-stop event from the remote activity log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackEvent {
    pub activity_log_id: i64,
    pub user_id: String,
    pub item_id: String,
    pub event_name: Option<String>,
    pub event_overview: Option<String>,
    /// Epoch seconds.
    pub activity_at: i64,
    pub username: Option<String>,
}

// =============================================================================
// Upsert inputs
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub jellyfin_id: String,
    pub name: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewLibrary {
    pub jellyfin_id: String,
    pub name: String,
    pub collection_type: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewItem {
    pub jellyfin_id: String,
    pub parent_id: Option<String>,
    pub name: String,
    pub item_type: Option<String>,
    pub runtime_seconds: Option<i64>,
    pub size_bytes: Option<i64>,
    pub date_created: Option<DateTime<Utc>>,
}

/// How a batch upsert touched the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl UpsertOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Result of inserting playback events keyed by activity log id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventInsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

// =============================================================================
// Statistics
// =============================================================================

/// Number of rows each stats pass rewrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsRefresh {
    pub items_updated: usize,
    pub users_updated: usize,
    pub libraries_updated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopItem {
    pub jellyfin_id: String,
    pub name: String,
    pub item_type: Option<String>,
    pub library_name: String,
    pub play_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopUser {
    pub jellyfin_id: String,
    pub name: String,
    pub total_plays: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryStats {
    pub library: Library,
    pub item_count: i64,
    pub movie_count: i64,
    pub series_count: i64,
    pub episode_count: i64,
}

// =============================================================================
// Task log
// =============================================================================

/// `task_type` of every row written by the sync pipeline.
pub const SYNC_TASK_TYPE: &str = "sync";

/// Terminal and in-flight states of a task log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskResult {
    Running,
    Success,
    Failed,
    Partial,
}

impl TaskResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResult::Running => "RUNNING",
            TaskResult::Success => "SUCCESS",
            TaskResult::Failed => "FAILED",
            TaskResult::Partial => "PARTIAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RUNNING" => Some(TaskResult::Running),
            "SUCCESS" => Some(TaskResult::Success),
            "FAILED" => Some(TaskResult::Failed),
            "PARTIAL" => Some(TaskResult::Partial),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskResult::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionType {
    Full,
    Incremental,
    Initial,
    Periodic,
}

impl ExecutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionType::Full => "full",
            ExecutionType::Incremental => "incremental",
            ExecutionType::Initial => "initial",
            ExecutionType::Periodic => "periodic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "full" => Some(ExecutionType::Full),
            "incremental" => Some(ExecutionType::Incremental),
            "initial" => Some(ExecutionType::Initial),
            "periodic" => Some(ExecutionType::Periodic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskLog {
    pub id: i64,
    pub name: String,
    pub task_type: String,
    pub execution_type: ExecutionType,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: TaskResult,
    pub log: Option<serde_json::Value>,
}
