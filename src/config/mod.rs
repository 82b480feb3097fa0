//! Shell configuration
//!
//! Priority, lowest first: built-in defaults, the first config file found,
//! `APPSHELL_*` environment variables.

use crate::navigation::TabItem;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Wait after show/close so animations can finish
    pub settle_delay_ms: u64,

    /// Prefix for every storage key
    pub storage_namespace: String,

    /// JSON file backing storage; in memory when unset
    pub storage_path: Option<PathBuf>,

    /// Base URL for API requests
    pub api_host: Option<String>,

    pub request_timeout_ms: u64,

    pub update_check_interval_secs: u64,

    pub app_store_id: String,

    /// Version reported when the platform can't tell
    pub current_version: String,

    /// Update checks only run on native platforms
    pub native_platform: bool,

    pub show_tab_bar: bool,

    pub tabs: Vec<TabItem>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
            storage_namespace: "appshell".to_string(),
            storage_path: None,
            api_host: None,
            request_timeout_ms: 100_000,
            update_check_interval_secs: 12 * 60 * 60,
            app_store_id: String::new(),
            current_version: crate::version::VERSION.to_string(),
            native_platform: false,
            show_tab_bar: true,
            tabs: TabItem::defaults(),
        }
    }
}

impl ShellConfig {
    /// Initialize configuration from the file at `path` (or the default
    /// locations) and the environment
    pub async fn init(path: Option<PathBuf>) -> Result<Self> {
        debug!("Initializing configuration");

        let mut config = match path {
            Some(path) => Self::load_from_path(&path).await?,
            None => Self::load_from_file().await?.unwrap_or_default(),
        };
        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Candidate config files, highest priority first
    pub fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("./.appshell.json"),
            PathBuf::from("./appshell.json"),
        ];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("appshell").join("appshell.json"));
        }
        paths
    }

    /// Load the first config file that exists, if any
    pub async fn load_from_file() -> Result<Option<Self>> {
        for path in Self::config_paths() {
            if path.exists() {
                return Self::load_from_path(&path).await.map(Some);
            }
        }
        Ok(None)
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        debug!("Loading configuration from: {}", path.display());
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration from environment variables
    pub fn load_from_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply `APPSHELL_*` overrides looked up through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(delay) = lookup("APPSHELL_SETTLE_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.settle_delay_ms = delay;
        }
        if let Some(namespace) = lookup("APPSHELL_STORAGE_NAMESPACE") {
            self.storage_namespace = namespace;
        }
        if let Some(path) = lookup("APPSHELL_STORAGE_PATH") {
            self.storage_path = Some(PathBuf::from(path));
        }
        if let Some(host) = lookup("APPSHELL_API_HOST") {
            self.api_host = Some(host);
        }
        if let Some(timeout) = lookup("APPSHELL_REQUEST_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = timeout;
        }
        if let Some(interval) = lookup("APPSHELL_UPDATE_CHECK_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.update_check_interval_secs = interval;
        }
        if let Some(id) = lookup("APPSHELL_APP_STORE_ID") {
            self.app_store_id = id;
        }
        if let Some(version) = lookup("APPSHELL_CURRENT_VERSION") {
            self.current_version = version;
        }
        if let Some(native) = lookup("APPSHELL_NATIVE_PLATFORM") {
            self.native_platform = matches!(native.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn update_check_interval(&self) -> Duration {
        Duration::from_secs(self.update_check_interval_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(anyhow::anyhow!("request_timeout_ms must be greater than 0"));
        }
        if self.tabs.is_empty() {
            return Err(anyhow::anyhow!("At least one tab is required"));
        }
        if self.update_check_interval_secs == 0 {
            return Err(anyhow::anyhow!("update_check_interval_secs must be greater than 0"));
        }
        Ok(())
    }
}
