//! Shared constants for end-to-end tests
//!
//! When the fake server's data set changes, update only this file and
//! `fixtures.rs`.

/// API key the fake server accepts
pub const TEST_TOKEN: &str = "test-token";

// ============================================================================
// Users
// ============================================================================

pub const ALICE_ID: &str = "user-alice";
pub const BOB_ID: &str = "user-bob";

// ============================================================================
// Libraries and items
// ============================================================================

pub const MOVIES_LIBRARY_ID: &str = "lib-movies";
pub const SHOWS_LIBRARY_ID: &str = "lib-shows";
pub const PLAYLISTS_LIBRARY_ID: &str = "lib-playlists";
pub const MINI_SERIES_LIBRARY_ID: &str = "lib-mini";

/// Number of items in the movies library; spans two pages of 1000
pub const MOVIE_COUNT: usize = 1500;

pub const SERIES_ID: &str = "series-1";
pub const EPISODE_1_ID: &str = "episode-1";
pub const EPISODE_2_ID: &str = "episode-2";

// ============================================================================
// Activity log
// ============================================================================

/// Playback-stop entries in the activity fixture
pub const PLAYBACK_STOP_COUNT: usize = 4;

/// Timestamp of the newest playback-stop entry
pub const NEWEST_EVENT_AT: &str = "2024-01-03T12:30:00Z";

// ============================================================================
// Timing
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;
