//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestContext;
//!
//! #[tokio::test]
//! async fn test_initial_sync() {
//!     let ctx = TestContext::new().await;
//!     let result = ctx.service.sync_initial().await;
//!     assert!(result.success);
//! }
//! ```

mod constants;
mod fixtures;
mod server;

pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{activity_entry, movie_id};
pub use server::FakeMediaServer;

use borealis_sync::{
    InMemorySettings, JellyfinClient, RetryPolicy, ServerSettings, SqliteRepository,
    SyncOptions, SyncService,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Settings pointing at `server` with the accepted token.
pub fn settings_for(server: &FakeMediaServer) -> ServerSettings {
    ServerSettings {
        host: "127.0.0.1".to_string(),
        port: server.port.to_string(),
        token: Some(TEST_TOKEN.to_string()),
        ..Default::default()
    }
}

/// Client with three attempts and a 1ms backoff base.
pub fn fast_client(settings: Arc<InMemorySettings>) -> JellyfinClient {
    JellyfinClient::new(settings, Duration::from_secs(5), RetryPolicy::new(3, 1))
        .expect("Failed to build client")
}

/// A fake server plus the full pipeline wired against it.
#[allow(dead_code)]
pub struct TestContext {
    pub server: FakeMediaServer,
    pub settings: Arc<InMemorySettings>,
    pub repo: Arc<SqliteRepository>,
    pub service: Arc<SyncService>,
    _temp_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let server = FakeMediaServer::spawn().await;
        let settings = Arc::new(InMemorySettings::new(settings_for(&server)));
        let client = fast_client(settings.clone());

        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let repo = Arc::new(
            SqliteRepository::new(temp_dir.path().join("media.db"))
                .expect("Failed to open repository"),
        );
        let service = Arc::new(SyncService::new(
            Arc::new(client),
            repo.clone(),
            SyncOptions::default(),
        ));

        Self {
            server,
            settings,
            repo,
            service,
            _temp_dir: temp_dir,
        }
    }
}
