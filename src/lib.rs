//! Borealis sync library
//!
//! Mirrors users, libraries, items and playback activity from a
//! Jellyfin-compatible media server into a local SQLite database.

pub mod background_jobs;
pub mod config;
pub mod jellyfin;
pub mod metrics;
pub mod settings;
pub mod sqlite_persistence;
pub mod store;
pub mod sync;

// Re-export commonly used types for convenience
pub use jellyfin::{JellyfinClient, MediaServerApi, RetryPolicy};
pub use settings::{InMemorySettings, ServerSettings, SettingsProvider};
pub use store::{Repository, SqliteRepository};
pub use sync::{SyncOptions, SyncResult, SyncService};
