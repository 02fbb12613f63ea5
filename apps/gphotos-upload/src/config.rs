//! CLI configuration.
//!
//! Stored as JSON at `$XDG_CONFIG_HOME/gphotos-uploader/config.json`
//! (`~/.config/...` when unset). Every field is optional.

use std::path::{Path, PathBuf};

use gphotos_uploader::UploaderConfig;
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "gphotos-uploader";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// Uploads endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Bytes per chunk for resumable uploads.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Resume interrupted uploads across runs.
    #[serde(default = "default_resumable")]
    pub resumable: bool,

    /// Where upload sessions are kept. Defaults next to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,
}

fn default_endpoint() -> String {
    UploaderConfig::default().endpoint
}

fn default_chunk_size() -> usize {
    UploaderConfig::default().chunk_size
}

fn default_resumable() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chunk_size: default_chunk_size(),
            resumable: default_resumable(),
            session_dir: None,
        }
    }
}

impl AppConfig {
    /// Loads the configuration at `path`, or the default location.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_base_dir().join(APP_DIR).join(CONFIG_FILE),
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| config_base_dir().join(APP_DIR).join("sessions"))
    }
}

fn config_base_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg);
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config")
}
