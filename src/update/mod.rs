//! Periodic update checks
//!
//! On native platforms the shell polls the app store and, when a newer
//! version exists, puts up a `Confirm` dialog. Declining stops polling for
//! the rest of the session; nothing is persisted.

use crate::bus::handler;
use crate::config::ShellConfig;
use crate::dialog::{dialog_names, Dialog, DialogManager, DialogProps, DialogResult};
use crate::version::compare_versions;
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

/// What the store knows about the published app
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub version: String,
    #[serde(default)]
    pub release_notes: Option<String>,
}

/// Result of one update check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub has_update: bool,
    pub current_version: String,
    pub store_version: String,
    pub release_notes: Option<String>,
}

/// Where version information comes from and how the store is opened.
///
/// `app_id` is the app store identifier from [`UpdateSettings`].
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn current_version(&self) -> Result<String>;
    async fn store_info(&self, app_id: &str) -> Result<StoreInfo>;
    async fn open_store(&self, app_id: &str) -> Result<()>;
}

/// How an [`AutoUpdate`] polls and what it tells the source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSettings {
    pub interval: Duration,
    /// Polling only runs on native platforms
    pub native: bool,
    pub app_id: String,
    /// Reported when the source can't tell the installed version
    pub fallback_version: Option<String>,
}

impl UpdateSettings {
    pub fn new(interval: Duration, native: bool) -> Self {
        Self {
            interval,
            native,
            app_id: String::new(),
            fallback_version: None,
        }
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_fallback_version(mut self, version: impl Into<String>) -> Self {
        self.fallback_version = Some(version.into());
        self
    }

    pub fn from_config(config: &ShellConfig) -> Self {
        let settings = Self::new(config.update_check_interval(), config.native_platform)
            .with_app_id(config.app_store_id.clone());
        if config.current_version.trim().is_empty() {
            settings
        } else {
            settings.with_fallback_version(config.current_version.clone())
        }
    }
}

#[derive(Default)]
struct UpdateState {
    /// Declined during this session
    rejected: bool,
    last_check: Option<Instant>,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    source: Arc<dyn UpdateSource>,
    dialogs: DialogManager,
    settings: UpdateSettings,
    state: Mutex<UpdateState>,
}

/// Update checker. Clones share state.
#[derive(Clone)]
pub struct AutoUpdate {
    inner: Arc<Inner>,
}

impl AutoUpdate {
    pub fn new(source: Arc<dyn UpdateSource>, dialogs: DialogManager, settings: UpdateSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                dialogs,
                settings,
                state: Mutex::new(UpdateState::default()),
            }),
        }
    }

    /// Reset session state and start polling. Does nothing off native platforms.
    pub fn init(&self) {
        if !self.inner.settings.native {
            debug!("Not a native platform, update checks disabled");
            return;
        }
        {
            let mut state = self.inner.state.lock();
            state.rejected = false;
            state.last_check = None;
        }
        self.start();
    }

    /// Start polling unless already running or declined this session.
    ///
    /// Checks at once when the last check is older than the interval.
    pub fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.timer.is_some() || state.rejected {
            return;
        }

        let interval = self.inner.settings.interval;
        let due = state
            .last_check
            .map_or(true, |last| last.elapsed() > interval);
        let weak = Arc::downgrade(&self.inner);

        info!("Polling for updates every {:?}", interval);
        state.timer = Some(tokio::spawn(async move {
            if due {
                Self::tick(&weak).await;
            }
            let mut ticker = interval_at(Instant::now() + interval, interval);
            loop {
                ticker.tick().await;
                if !Self::tick(&weak).await {
                    break;
                }
            }
        }));
    }

    /// One scheduled check; false once polling should end
    async fn tick(weak: &Weak<Inner>) -> bool {
        let Some(inner) = weak.upgrade() else {
            return false;
        };
        let checker = AutoUpdate { inner };
        if checker.is_rejected() {
            checker.stop();
            return false;
        }
        if let Err(e) = checker.check_now().await {
            warn!("Update check failed: {}", e);
        }
        true
    }

    pub fn stop(&self) {
        if let Some(timer) = self.inner.state.lock().timer.take() {
            debug!("Update polling stopped");
            timer.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    pub fn is_rejected(&self) -> bool {
        self.inner.state.lock().rejected
    }

    pub fn settings(&self) -> &UpdateSettings {
        &self.inner.settings
    }

    /// Installed version from the source, else the configured fallback
    pub async fn current_version(&self) -> Result<String> {
        match self.inner.source.current_version().await {
            Ok(version) => Ok(version),
            Err(e) => match &self.inner.settings.fallback_version {
                Some(fallback) => {
                    warn!("Can't read installed version ({}), using {}", e, fallback);
                    Ok(fallback.clone())
                }
                None => Err(e),
            },
        }
    }

    /// Ask the source for versions without showing anything
    pub async fn check_for_updates(&self) -> Result<UpdateInfo> {
        let current_version = self.current_version().await?;
        let store = self.inner.source.store_info(&self.inner.settings.app_id).await?;
        Ok(UpdateInfo {
            has_update: compare_versions(&current_version, &store.version),
            current_version,
            store_version: store.version,
            release_notes: store.release_notes,
        })
    }

    /// Check once and show the update dialog when a newer version exists
    pub async fn check_now(&self) -> Result<Option<Dialog>> {
        {
            let mut state = self.inner.state.lock();
            if state.rejected {
                return Ok(None);
            }
            state.last_check = Some(Instant::now());
        }

        let info = self.check_for_updates().await?;
        if !info.has_update {
            debug!("Up to date ({})", info.current_version);
            return Ok(None);
        }

        info!("Update available: {} -> {}", info.current_version, info.store_version);
        Ok(Some(self.show_update_dialog(&info).await?))
    }

    /// Put up the update prompt
    pub async fn show_update_dialog(&self, info: &UpdateInfo) -> DialogResult<Dialog> {
        let dialog = self.inner.dialogs.get(dialog_names::CONFIRM, None);

        let source = self.inner.source.clone();
        let app_id = self.inner.settings.app_id.clone();
        let target = dialog.downgrade();
        dialog.on(
            "confirm",
            handler(move |_| {
                let source = source.clone();
                let app_id = app_id.clone();
                let target = target.clone();
                tokio::spawn(async move {
                    if let Err(e) = source.open_store(&app_id).await {
                        warn!("Failed to open the store: {}", e);
                    }
                    if let Some(dialog) = target.upgrade() {
                        dialog.close().await;
                    }
                });
            }),
        );

        let checker = Arc::downgrade(&self.inner);
        let target = dialog.downgrade();
        dialog.on(
            "cancel",
            handler(move |_| {
                if let Some(inner) = checker.upgrade() {
                    inner.state.lock().rejected = true;
                    AutoUpdate { inner }.stop();
                    info!("Update declined for this session");
                }
                let target = target.clone();
                tokio::spawn(async move {
                    if let Some(dialog) = target.upgrade() {
                        dialog.close().await;
                    }
                });
            }),
        );

        dialog.show(Some(update_props(info)), None).await?;
        Ok(dialog)
    }
}

fn update_props(info: &UpdateInfo) -> DialogProps {
    let notes = info
        .release_notes
        .as_deref()
        .filter(|notes| !notes.is_empty())
        .map(|notes| notes.replace('\n', "<br>"))
        .unwrap_or_else(|| "No release notes".to_string());
    let message = format!(
        "<div>Current version: {}<br>Latest version: {}<br><br>What's new:<br>{}</div>",
        info.current_version, info.store_version, notes
    );

    let mut props = DialogProps::new();
    props.insert("title".to_string(), json!("New version available"));
    props.insert("message".to_string(), json!(message));
    props.insert("confirmButtonText".to_string(), json!("Update now"));
    props.insert("cancelButtonText".to_string(), json!("Cancel"));
    props.insert("showCancelButton".to_string(), json!(true));
    props
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.state.get_mut().timer.take() {
            timer.abort();
        }
    }
}

impl std::fmt::Debug for AutoUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUpdate")
            .field("settings", &self.inner.settings)
            .field("running", &self.is_running())
            .finish()
    }
}
