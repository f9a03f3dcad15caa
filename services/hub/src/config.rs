//! Hub service configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Server bind address.
    pub bind_address: String,

    /// Server port.
    pub port: u16,

    /// Channel snapshot file. Unset keeps channel metadata in memory
    /// only.
    pub store_path: Option<PathBuf>,

    /// Enable CORS for browser clients.
    pub enable_cors: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            store_path: None,
            enable_cors: true,
        }
    }
}

impl HubConfig {
    /// Load configuration from a TOML file, or JSON when the extension
    /// says so.
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(toml::from_str(&contents)?)
        }
    }
}
