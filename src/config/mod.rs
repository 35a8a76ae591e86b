mod file_config;

pub use file_config::{FileConfig, JellyfinConfig, SyncConfig};

use crate::jellyfin::RetryPolicy;
use crate::settings::{ServerSettings, DEFAULT_SYNC_INTERVAL_SECS};
use crate::sync::SyncOptions;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// CLI arguments that can be overridden by the TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_path: Option<PathBuf>,
    pub jellyfin_host: Option<String>,
    pub jellyfin_port: Option<String>,
    pub api_key: Option<String>,
    pub sync_interval_secs: Option<i64>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub server: ServerSettings,
    pub timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub sync: SyncOptions,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();
        let jellyfin = file.jellyfin.unwrap_or_default();
        let sync = file.sync.unwrap_or_default();

        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.db_path.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_path must be specified via --db-path or in config file")
            })?;
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.is_dir() {
                bail!("Database directory does not exist: {:?}", parent);
            }
        }

        let interval_secs = sync
            .interval_secs
            .or(cli.sync_interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS as i64);
        if interval_secs <= 0 {
            bail!("Sync interval must be positive, got {}", interval_secs);
        }

        let max_retries = jellyfin.max_retries.unwrap_or(DEFAULT_MAX_RETRIES);
        if max_retries == 0 {
            bail!("max_retries must be at least 1");
        }

        // Missing host/port/token is not fatal: the client reports it per call.
        let server = ServerSettings {
            host: jellyfin
                .host
                .clone()
                .or_else(|| cli.jellyfin_host.clone())
                .unwrap_or_default(),
            port: jellyfin
                .port_text()
                .or_else(|| cli.jellyfin_port.clone())
                .unwrap_or_default(),
            token: jellyfin.api_key.clone().or_else(|| cli.api_key.clone()),
            sync_interval_secs: interval_secs as u64,
        };

        let timeout_secs = jellyfin
            .timeout_secs
            .or(cli.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retry_policy = RetryPolicy::new(
            max_retries,
            jellyfin.backoff_base_ms.unwrap_or(DEFAULT_BACKOFF_BASE_MS),
        );

        let defaults = SyncOptions::default();
        let sync = SyncOptions {
            activity_page_size: sync
                .activity_page_size
                .unwrap_or(defaults.activity_page_size),
            max_activity_entries: sync
                .max_activity_entries
                .unwrap_or(defaults.max_activity_entries),
            library_concurrency: sync
                .library_concurrency
                .unwrap_or(defaults.library_concurrency),
            ..defaults
        };

        Ok(Self {
            db_path,
            server,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            retry_policy,
            sync,
        })
    }
}
