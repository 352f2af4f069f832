//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the data store endpoint, the last used username and the sync timings.
//!
//! Configuration is stored at `~/.config/ems/config.json`. `EMS_ENDPOINT`
//! and `EMS_CACHE_DIR` override the file when set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sync::SyncSettings;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "ems";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the data store endpoint
pub const ENDPOINT_ENV: &str = "EMS_ENDPOINT";

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "EMS_CACHE_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub last_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    pub refresh_interval_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        let settings = SyncSettings::default();
        Self {
            endpoint: None,
            last_username: None,
            cache_dir: None,
            refresh_interval_secs: settings.refresh_interval.as_secs(),
            read_timeout_secs: settings.read_timeout.as_secs(),
            write_timeout_secs: settings.write_timeout.as_secs(),
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(
            std::env::var(ENDPOINT_ENV).ok(),
            std::env::var(CACHE_DIR_ENV).ok().map(PathBuf::from),
        );
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Blank values are ignored.
    pub fn apply_overrides(&mut self, endpoint: Option<String>, cache_dir: Option<PathBuf>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            self.endpoint = Some(endpoint.trim().to_string());
        }
        if let Some(dir) = cache_dir.filter(|d| !d.as_os_str().is_empty()) {
            self.cache_dir = Some(dir);
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Timings for the sync cache. Zero values are raised to one second.
    pub fn sync_settings(&self) -> SyncSettings {
        let secs = |value: u64| Duration::from_secs(value.max(1));
        SyncSettings {
            read_timeout: secs(self.read_timeout_secs),
            write_timeout: secs(self.write_timeout_secs),
            refresh_interval: secs(self.refresh_interval_secs),
        }
    }
}
