use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::navigator::{ReturnPolicy, DEFAULT_FETCH_TIMEOUT};

pub const CONFIG_DIR_ENV: &str = "SQLWALK_CONFIG_DIR";

/// Directory holding `settings.toml` and `profiles.toml`.
///
/// `$SQLWALK_CONFIG_DIR` wins outright; otherwise the platform config root
/// joined with `sqlwalk`.
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Some(custom) = env::var_os(CONFIG_DIR_ENV) {
        return Some(PathBuf::from(custom));
    }

    let base_dir = if cfg!(target_os = "windows") {
        PathBuf::from(env::var_os("APPDATA")?)
    } else if let Some(xdg_config_home) = env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config_home)
    } else {
        PathBuf::from(env::var_os("HOME")?).join(".config")
    };

    Some(base_dir.join("sqlwalk"))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationSettings {
    pub return_to: ReturnPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub fetch_timeout_ms: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: u64::try_from(DEFAULT_FETCH_TIMEOUT.as_millis()).unwrap_or(5_000),
        }
    }
}

impl ProviderSettings {
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub navigation: NavigationSettings,
    pub provider: ProviderSettings,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("config directory is unavailable for this platform")]
    ConfigDirUnavailable,
    #[error("failed to read settings file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Settings {
    pub fn load_default() -> Result<Self, SettingsError> {
        let path = default_settings_path()?;
        Self::load_from_path(path)
    }

    /// Reads settings from `path`. A missing or blank file yields the defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn default_settings_path() -> Result<PathBuf, SettingsError> {
    config_dir()
        .map(|dir| dir.join("settings.toml"))
        .ok_or(SettingsError::ConfigDirUnavailable)
}
