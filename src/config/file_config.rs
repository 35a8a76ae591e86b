use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub db_path: Option<String>,

    pub jellyfin: Option<JellyfinConfig>,
    pub sync: Option<SyncConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct JellyfinConfig {
    pub host: Option<String>,
    /// Accepts `port = 8096` or `port = "8096"`.
    pub port: Option<toml::Value>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub backoff_base_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SyncConfig {
    pub interval_secs: Option<i64>,
    pub activity_page_size: Option<u64>,
    pub max_activity_entries: Option<u64>,
    pub library_concurrency: Option<usize>,
}

impl JellyfinConfig {
    /// Port as text, whatever TOML type it was written with.
    pub fn port_text(&self) -> Option<String> {
        match self.port.as_ref()? {
            toml::Value::String(s) => Some(s.clone()),
            toml::Value::Integer(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
