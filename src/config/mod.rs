//! Resolved, typed configuration.
//!
//! Components take these structs at construction (dependency injection)
//! instead of reading ambient storage at call time. `resolve` starts from
//! the persisted [`Settings`](crate::settings::Settings) and applies
//! environment overrides; secrets end up as [`SecretString`] and are only
//! exposed where a header or URL is built.

mod helpers;

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::config::helpers::{optional_env, parse_bool_env, parse_string_env, parse_u64_env};
use crate::error::ConfigError;
use crate::settings::{Settings, default_workspace_dir};

/// Generation endpoint configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// API key. `None` means generation fails with a missing-credential
    /// error before any network call; there is deliberately no fallback key.
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GenerationConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let api_key = optional_env("GEMINI_API_KEY")?
            .or(optional_env("API_KEY")?)
            .or_else(|| non_empty(settings.generation.api_key.as_deref()))
            .map(SecretString::from);

        Ok(Self {
            api_key,
            model: parse_string_env("GENERATION_MODEL", settings.generation.model.clone())?,
            base_url: parse_string_env(
                "GENERATION_BASE_URL",
                settings.generation.base_url.clone(),
            )?,
            timeout: Duration::from_secs(parse_u64_env(
                "GENERATION_TIMEOUT_SECS",
                settings.generation.timeout_secs,
            )?),
        })
    }
}

/// Remote history store configuration.
#[derive(Debug, Clone)]
pub struct RemoteStoreConfig {
    pub endpoint: Option<Url>,
    pub credential: Option<SecretString>,
    pub enabled: bool,
}

impl RemoteStoreConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let endpoint = match optional_env("REMOTE_STORE_URL")?
            .or_else(|| non_empty(settings.remote_store.endpoint.as_deref()))
        {
            Some(raw) => Some(Url::parse(raw.trim_end_matches('/')).map_err(|err| {
                ConfigError::InvalidValue {
                    key: "REMOTE_STORE_URL".to_string(),
                    message: err.to_string(),
                }
            })?),
            None => None,
        };

        let credential = optional_env("REMOTE_STORE_KEY")?
            .or_else(|| non_empty(settings.remote_store.credential.as_deref()))
            .map(SecretString::from);

        Ok(Self {
            endpoint,
            credential,
            enabled: parse_bool_env("REMOTE_STORE_ENABLED", settings.remote_store.enabled)?,
        })
    }

    /// True when the remote store is the authoritative history backend:
    /// explicitly enabled and fully configured. A hard switch: reads never
    /// merge records from both stores.
    pub fn is_authoritative(&self) -> bool {
        self.enabled && self.endpoint.is_some() && self.credential.is_some()
    }
}

/// Local storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let data_dir = match optional_env("MAKLER_DATA_DIR")? {
            Some(raw) => PathBuf::from(raw),
            None => settings
                .storage
                .data_dir
                .clone()
                .unwrap_or_else(default_workspace_dir),
        };
        Ok(Self { data_dir })
    }
}

/// The full resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub generation: GenerationConfig,
    pub remote_store: RemoteStoreConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Resolve typed configuration from stored settings plus environment
    /// overrides.
    pub fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            generation: GenerationConfig::resolve(settings)?,
            remote_store: RemoteStoreConfig::resolve(settings)?,
            storage: StorageConfig::resolve(settings)?,
        })
    }

    /// Startup path: load `.env` if present, read the default settings
    /// file, and resolve.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let settings = Settings::load(&Settings::default_path())?;
        Self::resolve(&settings)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}
