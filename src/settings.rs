use anyhow::{Context, Result};
use dirs::{data_dir, home_dir};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::DEFAULT_BASE_URL;
use crate::credentials::CREDENTIAL_FILE;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Host settings, stored in ~/.laundrify.yml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Seconds between status polls
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<u64>,
    /// Directory holding the credential file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

impl Settings {
    /// The configured pairing code, if it isn't blank
    pub fn auth_code(&self) -> Option<&str> {
        self.auth_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(
            self.poll_interval
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        )
    }

    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_path {
            Some(path) => Ok(path.clone()),
            None => {
                let base = data_dir()
                    .or_else(home_dir)
                    .context("Failed to determine a data directory")?;
                Ok(base.join("laundrify"))
            }
        }
    }

    pub fn credential_path(&self) -> Result<PathBuf> {
        Ok(self.storage_dir()?.join(CREDENTIAL_FILE))
    }

    /// Apply overrides from the command line or environment
    pub fn merge(
        mut self,
        auth_code: Option<String>,
        base_url: Option<String>,
        storage_path: Option<PathBuf>,
    ) -> Self {
        if auth_code.is_some() {
            self.auth_code = auth_code;
        }
        if base_url.is_some() {
            self.base_url = base_url;
        }
        if storage_path.is_some() {
            self.storage_path = storage_path;
        }
        self
    }
}

/// Get the path to the default settings file (~/.laundrify.yml)
pub fn get_settings_path() -> Result<PathBuf> {
    let home = home_dir().context("Failed to determine home directory")?;
    Ok(home.join(".laundrify.yml"))
}

/// Load settings from `path`. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!("Settings file {} not found, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    let settings: Settings = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

    debug!("Loaded settings from {}", path.display());
    Ok(settings)
}
