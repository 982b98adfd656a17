//! Persisted workspace settings.
//!
//! One TOML file holds everything the agent configures once and expects to
//! survive restarts: the generation endpoint credentials, the optional
//! remote history store, and where local data lives. `Settings` is the raw
//! stored shape; [`crate::config`] resolves it (plus environment overrides)
//! into the typed configs the components take at construction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default generation model, matching the endpoint family the assistant
/// targets.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Default base URL of the generation endpoint.
pub const DEFAULT_GENERATION_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models";

/// Default bound on one generation call.
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 60;

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_GENERATION_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_GENERATION_TIMEOUT_SECS
}

/// Stored generation endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// API key for the generation endpoint. Environment variables
    /// (`GEMINI_API_KEY`, then `API_KEY`) take precedence at resolve time.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Stored remote history store settings.
///
/// The remote store is authoritative only when `enabled` is set and both
/// `endpoint` and `credential` are present; otherwise the local store is
/// used. This is a hard switch, not a cache hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteStoreSettings {
    pub endpoint: Option<String>,
    pub credential: Option<String>,
    pub enabled: bool,
}

/// Stored local storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Workspace data directory. Defaults to `~/.makler`.
    pub data_dir: Option<PathBuf>,
}

/// The full persisted settings blob.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub generation: GenerationSettings,
    pub remote_store: RemoteStoreSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Default location of the settings file.
    pub fn default_path() -> PathBuf {
        default_workspace_dir().join("settings.toml")
    }

    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist settings to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// Default workspace directory (`~/.makler`, or relative when no home
/// directory is resolvable).
pub fn default_workspace_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".makler"))
        .unwrap_or_else(|| PathBuf::from(".makler"))
}
