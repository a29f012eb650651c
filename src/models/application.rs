// Application registry models

use serde::{Deserialize, Serialize};

/// Icon used when the source record carries none.
pub const DEFAULT_ICON: &str = "apps";

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

/// One launchable application. Also the on-disk shape of the local cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default = "default_icon")]
    pub icon: String,
}

/// Where the current registry came from; serializes lowercase (e.g. "degraded").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Populated from the remote directory service.
    Connected,
    /// Populated from the local cache file.
    Degraded,
    /// Neither source was usable; registry is empty.
    #[default]
    Disconnected,
}

/// Published registry: the list plus how it was resolved.
#[derive(Debug, Clone, Default)]
pub struct RegistryView {
    pub applications: Vec<ApplicationRecord>,
    pub connection: ConnectionState,
    pub last_sync: Option<chrono::DateTime<chrono::Utc>>,
}
