//! Shell wiring
//!
//! [`Shell`] owns every app-wide service: the event bus, the dialog manager,
//! storage, the API client and navigation. Renderers observe it through the
//! [`ShellEvent`] channel handed out by [`Shell::events`].

mod events;

pub use events::*;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    bus::{handler, EventBus, Subscription},
    config::ShellConfig,
    dialog::DialogManager,
    navigation::NavigationManager,
    network::{ApiClient, LOGIN_INVALID},
    storage::{FileStore, KeyValueStore, MemoryStore, NamespacedStorage},
    update::{AutoUpdate, UpdateSettings, UpdateSource},
};

/// Main application structure
pub struct Shell {
    config: ShellConfig,
    bus: EventBus,
    dialogs: DialogManager,
    storage: NamespacedStorage,
    api: ApiClient,
    navigation: Arc<NavigationManager>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<ShellEvent>>>,
    login_subscription: Mutex<Option<Subscription>>,
}

impl Shell {
    /// Create a new shell from `config`
    pub fn new(config: ShellConfig) -> Result<Self> {
        debug!("Creating new Shell instance");

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let bus = EventBus::new();

        let dialogs = DialogManager::with_builtins(bus.clone(), config.settle_delay());
        dialogs.set_event_sender(event_tx.clone());

        let store: Arc<dyn KeyValueStore> = match &config.storage_path {
            Some(path) => Arc::new(
                FileStore::open(path)
                    .with_context(|| format!("Failed to open storage at {}", path.display()))?,
            ),
            None => Arc::new(MemoryStore::new()),
        };
        let storage = NamespacedStorage::new(config.storage_namespace.clone(), store);

        let api = ApiClient::new(
            config.api_host.clone(),
            config.request_timeout(),
            bus.clone(),
            storage.clone(),
        )
        .context("Failed to create API client")?;

        let navigation = Arc::new(
            NavigationManager::new(config.tabs.clone()).with_tab_bar(config.show_tab_bar),
        );
        navigation.set_event_sender(event_tx.clone());

        let login_subscription = bus
            .on(
                LOGIN_INVALID,
                handler(move |_| {
                    let _ = event_tx.send(ShellEvent::LoginInvalid);
                }),
                None,
            )
            .context("Failed to bind login handler")?;

        info!("Shell ready ({} tab(s))", config.tabs.len());
        Ok(Self {
            config,
            bus,
            dialogs,
            storage,
            api,
            navigation,
            event_rx: Mutex::new(Some(event_rx)),
            login_subscription: Mutex::new(Some(login_subscription)),
        })
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn dialogs(&self) -> &DialogManager {
        &self.dialogs
    }

    pub fn storage(&self) -> &NamespacedStorage {
        &self.storage
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn navigation(&self) -> &Arc<NavigationManager> {
        &self.navigation
    }

    /// Take the event receiver. Only the first call gets it.
    pub fn events(&self) -> Option<mpsc::UnboundedReceiver<ShellEvent>> {
        let receiver = self.event_rx.lock().take();
        if receiver.is_none() {
            warn!("Shell events already taken");
        }
        receiver
    }

    /// Update checker bound to this shell's dialogs and config
    pub fn auto_update(&self, source: Arc<dyn UpdateSource>) -> AutoUpdate {
        AutoUpdate::new(source, self.dialogs.clone(), UpdateSettings::from_config(&self.config))
    }

    /// Close every dialog and detach the shell's own handlers
    pub async fn shutdown(&self) -> usize {
        info!("Shutting down shell");
        let closed = self.dialogs.close_all().await;
        if let Some(subscription) = self.login_subscription.lock().take() {
            self.bus.off(&subscription);
        }
        closed
    }
}

impl std::fmt::Debug for Shell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::dialog_names;
    use crate::navigation::{MemoryRouter, RouteLocation};
    use tempfile::tempdir;

    #[tokio::test(start_paused = true)]
    async fn test_shell_reports_dialogs() {
        let shell = Shell::new(ShellConfig::default()).unwrap();
        let mut events = shell.events().unwrap();
        assert!(shell.events().is_none());

        let dialog = shell.dialogs().get(dialog_names::PHOTO_PREVIEW, None);
        assert!(dialog.component().is_some());
        dialog.show(None, None).await.unwrap();

        match events.recv().await {
            Some(ShellEvent::DialogShown { name, .. }) => assert_eq!(name, dialog_names::PHOTO_PREVIEW),
            other => panic!("unexpected event: {:?}", other),
        }

        assert_eq!(shell.shutdown().await, 1);
        assert!(matches!(events.recv().await, Some(ShellEvent::DialogClosed { .. })));
    }

    #[tokio::test]
    async fn test_login_invalid_is_forwarded_until_shutdown() {
        let shell = Shell::new(ShellConfig::default()).unwrap();
        let mut events = shell.events().unwrap();

        shell.bus().emit(LOGIN_INVALID, &[]);
        assert_eq!(events.recv().await, Some(ShellEvent::LoginInvalid));

        shell.shutdown().await;
        assert_eq!(shell.bus().emit(LOGIN_INVALID, &[]), 0);
    }

    #[tokio::test]
    async fn test_navigation_events() {
        let shell = Shell::new(ShellConfig::default()).unwrap();
        let mut events = shell.events().unwrap();
        shell.navigation().init(Arc::new(MemoryRouter::new(
            ["home", "profile", "detail"],
            RouteLocation::new("home"),
        )));

        shell.navigation().navigate_to("detail").await;
        assert_eq!(
            events.recv().await,
            Some(ShellEvent::Navigated { route: "detail".to_string() })
        );
    }

    struct SilentSource;

    #[async_trait::async_trait]
    impl UpdateSource for SilentSource {
        async fn current_version(&self) -> Result<String> {
            Err(anyhow::anyhow!("no platform info"))
        }

        async fn store_info(&self, app_id: &str) -> Result<crate::update::StoreInfo> {
            Ok(crate::update::StoreInfo {
                version: "9.0.0".to_string(),
                release_notes: Some(app_id.to_string()),
            })
        }

        async fn open_store(&self, _app_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_config_reaches_navigation_and_updates() {
        let config = ShellConfig {
            show_tab_bar: false,
            app_store_id: "id777".to_string(),
            current_version: "3.1.0".to_string(),
            ..ShellConfig::default()
        };
        let shell = Shell::new(config).unwrap();
        assert!(!shell.navigation().show_tab_bar());

        let updates = shell.auto_update(Arc::new(SilentSource));
        assert_eq!(updates.settings().app_id, "id777");
        let info = updates.check_for_updates().await.unwrap();
        assert_eq!(info.current_version, "3.1.0");
        assert_eq!(info.store_version, "9.0.0");
        assert_eq!(info.release_notes.as_deref(), Some("id777"));
    }

    #[test]
    fn test_file_backed_storage() {
        let dir = tempdir().unwrap();
        let config = ShellConfig {
            storage_path: Some(dir.path().join("store.json")),
            storage_namespace: "game".to_string(),
            ..ShellConfig::default()
        };

        let shell = Shell::new(config.clone()).unwrap();
        shell.storage().save("level", &4, None).unwrap();
        drop(shell);

        let reopened = Shell::new(config).unwrap();
        assert_eq!(reopened.storage().load::<u32>("level"), Some(4));
    }
}
