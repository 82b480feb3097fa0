//! Dialog manager: the only place dialogs are created
//!
//! The manager is responsible for:
//! - Holding the global name -> registration table
//! - Creating multi-instance and singleton dialogs
//! - Looking up open dialogs by id
//! - Closing everything that is on screen

use super::{
    context::DialogContext,
    instance::Dialog,
    register::builtin_dialogs,
    state::Shared,
    types::*,
};
use crate::app::ShellEvent;
use crate::bus::EventBus;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Owner of the dialog registries. Cloning shares them.
#[derive(Clone)]
pub struct DialogManager {
    shared: Arc<Shared>,
}

impl DialogManager {
    /// Create a manager with an empty registration table
    pub fn new(bus: EventBus, settle_delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared::new(bus, settle_delay)),
        }
    }

    /// Create a manager with the built-in dialogs registered
    pub fn with_builtins(bus: EventBus, settle_delay: Duration) -> Self {
        let manager = Self::new(bus, settle_delay);
        for (name, registration) in builtin_dialogs() {
            manager.register_dialog(name, registration);
        }
        manager
    }

    /// Set the channel renderers listen on
    pub fn set_event_sender(&self, sender: mpsc::UnboundedSender<ShellEvent>) {
        self.shared.set_event_sender(sender);
    }

    pub fn bus(&self) -> &EventBus {
        &self.shared.bus
    }

    pub fn settle_delay(&self) -> Duration {
        self.shared.settle_delay
    }

    /// Insert or overwrite a global registration
    pub fn register_dialog(&self, name: impl Into<String>, registration: DialogRegistration) {
        let name = name.into();
        debug!("Registering dialog '{}'", name);
        self.shared.registry.lock().table.insert(name, registration);
    }

    pub fn registration(&self, name: &str) -> Option<DialogRegistration> {
        self.shared.registry.lock().table.get(name).cloned()
    }

    /// Bind a caller context, mirroring how a page asks for its dialogs
    pub fn use_dialog(&self, context: Option<DialogContext>) -> DialogScope {
        DialogScope {
            shared: self.shared.clone(),
            context: context.map(Arc::new),
        }
    }

    fn global_scope(&self) -> DialogScope {
        self.use_dialog(None)
    }

    /// Always a fresh multi-instance dialog
    pub fn get(&self, name: &str, opts: Option<DialogOptions>) -> Dialog {
        self.global_scope().get(name, opts)
    }

    /// The live singleton for `name`, or a new one
    pub fn get_single(&self, name: &str, opts: Option<DialogOptions>) -> Dialog {
        self.global_scope().get_single(name, opts)
    }

    /// Open multi-instance dialog by id
    pub fn get_instance(&self, id: &DialogId) -> Option<Dialog> {
        self.shared.registry.lock().multi.get(id).cloned()
    }

    /// Like [`DialogManager::get_instance`], as an error for `?` callers
    pub fn require_instance(&self, id: &DialogId) -> DialogResult<Dialog> {
        self.get_instance(id)
            .ok_or_else(|| DialogError::NotFound(id.clone()))
    }

    /// Live singleton for `name`, if any
    pub fn singleton(&self, name: &str) -> Option<Dialog> {
        self.shared.registry.lock().single.get(name).cloned()
    }

    /// Display state of every showing dialog, in show order
    pub fn visible(&self) -> Vec<DialogView> {
        let dialogs: Vec<Dialog> = self.shared.registry.lock().visible.clone();
        dialogs.iter().map(Dialog::view).collect()
    }

    pub fn has_dialogs(&self) -> bool {
        !self.shared.registry.lock().visible.is_empty()
    }

    /// (multi-instance, singleton) registry sizes
    pub fn registry_sizes(&self) -> (usize, usize) {
        let registry = self.shared.registry.lock();
        (registry.multi.len(), registry.single.len())
    }

    /// Close every showing dialog, newest first.
    ///
    /// Returns how many actually closed; dialogs whose guard blocks stay open.
    pub async fn close_all(&self) -> usize {
        self.global_scope().close_all().await
    }
}

/// Dialog access bound to an optional caller context
#[derive(Clone)]
pub struct DialogScope {
    shared: Arc<Shared>,
    context: Option<Arc<DialogContext>>,
}

impl DialogScope {
    pub fn get(&self, name: &str, opts: Option<DialogOptions>) -> Dialog {
        Dialog::new(self.shared.clone(), false, self.context.as_deref(), name, opts)
    }

    /// Reuses the live singleton for `name`.
    ///
    /// Options passed for an existing singleton are merged into the options
    /// it was requested with.
    pub fn get_single(&self, name: &str, opts: Option<DialogOptions>) -> Dialog {
        let existing = self.shared.registry.lock().single.get(name).cloned();
        if let Some(existing) = existing {
            if let Some(opts) = &opts {
                existing.merge_cached_options(opts);
            }
            return existing;
        }

        let dialog = Dialog::new(self.shared.clone(), true, self.context.as_deref(), name, opts);
        let winner = {
            let mut registry = self.shared.registry.lock();
            match registry.single.get(name) {
                Some(current) => Some(current.clone()),
                None => {
                    registry.single.insert(name.to_string(), dialog.clone());
                    None
                }
            }
        };

        match winner {
            Some(current) => {
                dialog.discard();
                current
            }
            None => dialog,
        }
    }

    pub fn get_instance(&self, id: &DialogId) -> Option<Dialog> {
        self.shared.registry.lock().multi.get(id).cloned()
    }

    pub async fn close_all(&self) -> usize {
        let targets: Vec<Dialog> = {
            let registry = self.shared.registry.lock();
            registry
                .visible
                .iter()
                .rev()
                .filter_map(|entry| {
                    registry
                        .multi
                        .get(entry.id())
                        .or_else(|| registry.single.get(entry.name()))
                        .cloned()
                })
                .collect()
        };

        if targets.is_empty() {
            return 0;
        }

        info!("Closing {} dialog(s)", targets.len());
        let outcomes = join_all(targets.iter().map(|dialog| dialog.close())).await;
        outcomes
            .into_iter()
            .filter(|outcome| *outcome == CloseOutcome::Closed)
            .count()
    }
}

impl Default for DialogManager {
    fn default() -> Self {
        Self::with_builtins(EventBus::new(), Duration::from_millis(500))
    }
}
