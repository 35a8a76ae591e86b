//! Connection settings for the remote media server.
//!
//! Settings are read on every request, so an update is picked up by the next
//! call without restarting anything.

use std::sync::RwLock;

pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 1800;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Hostname or IP, optionally with scheme and `:port`.
    pub host: String,
    /// Kept as text as entered by the user; validated at resolution time.
    pub port: String,
    pub token: Option<String>,
    pub sync_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            token: None,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
        }
    }
}

pub trait SettingsProvider: Send + Sync {
    fn get(&self) -> ServerSettings;
}

#[derive(Debug, Default)]
pub struct InMemorySettings {
    settings: RwLock<ServerSettings>,
}

impl InMemorySettings {
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn update(&self, settings: ServerSettings) {
        *self.settings.write().unwrap() = settings;
    }
}

impl SettingsProvider for InMemorySettings {
    fn get(&self) -> ServerSettings {
        self.settings.read().unwrap().clone()
    }
}
