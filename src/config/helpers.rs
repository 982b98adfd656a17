//! Environment override helpers shared by the config resolvers.

use crate::error::ConfigError;

/// Read an environment variable, mapping unset or blank to `None`.
pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value is not valid UTF-8".to_string(),
        }),
    }
}

/// Resolve a string setting: environment variable wins over the stored value.
pub(crate) fn parse_string_env(key: &str, default: String) -> Result<String, ConfigError> {
    Ok(optional_env(key)?.unwrap_or(default))
}

/// Resolve a boolean setting: accepts `true/false`, `1/0`, `yes/no`, `on/off`.
pub(crate) fn parse_bool_env(key: &str, default: bool) -> Result<bool, ConfigError> {
    match optional_env(key)? {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        },
    }
}

/// Resolve an unsigned integer setting.
pub(crate) fn parse_u64_env(key: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_env(key)? {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an unsigned integer, got '{raw}'"),
        }),
    }
}
