//! Registries shared by the manager and every dialog it creates

use super::instance::Dialog;
use super::types::{DialogId, DialogRegistration};
use crate::app::ShellEvent;
use crate::bus::EventBus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
pub(crate) struct DialogRegistry {
    /// Open non-singleton dialogs by id
    pub(crate) multi: HashMap<DialogId, Dialog>,
    /// At most one singleton per dialog name
    pub(crate) single: HashMap<String, Dialog>,
    /// Showing dialogs, in show order
    pub(crate) visible: Vec<Dialog>,
    /// Global name -> registration table
    pub(crate) table: HashMap<String, DialogRegistration>,
}

pub(crate) struct Shared {
    pub(crate) bus: EventBus,
    pub(crate) registry: Mutex<DialogRegistry>,
    pub(crate) settle_delay: Duration,
    events: Mutex<Option<mpsc::UnboundedSender<ShellEvent>>>,
}

impl Shared {
    pub(crate) fn new(bus: EventBus, settle_delay: Duration) -> Self {
        Self {
            bus,
            registry: Mutex::new(DialogRegistry::default()),
            settle_delay,
            events: Mutex::new(None),
        }
    }

    pub(crate) fn set_event_sender(&self, sender: mpsc::UnboundedSender<ShellEvent>) {
        *self.events.lock() = Some(sender);
    }

    pub(crate) fn notify(&self, event: ShellEvent) {
        if let Some(sender) = &*self.events.lock() {
            let _ = sender.send(event);
        }
    }
}
