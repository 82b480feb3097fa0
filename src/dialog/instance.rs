//! A single dialog and its show/close lifecycle
//!
//! ```text
//! Hidden --show()--> Showing --close(), guard allows--> Closing --settle--> Destroyed
//!                       ^  |
//!                       +--+ close(), guard blocks
//! ```
//!
//! `show()` and `close()` both end with a settle delay so callers can
//! sequence work after the entrance/exit animation.

use super::context::DialogContext;
use super::state::Shared;
use super::types::*;
use crate::app::ShellEvent;
use crate::bus::{BusResult, Handler, ScopeId, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

struct DialogState {
    phase: DialogPhase,
    /// Set while a close is waiting on the guard
    close_pending: bool,
    props: DialogProps,
    opts: DialogOptions,
    /// Options passed when the dialog was requested
    cached_opts: DialogOptions,
}

struct DialogInner {
    id: DialogId,
    name: String,
    component_name: String,
    component: Option<ComponentRef>,
    registered_opts: DialogOptions,
    single: bool,
    local: bool,
    scope: ScopeId,
    state: Mutex<DialogState>,
    guard: Mutex<Option<Arc<dyn CloseGuard>>>,
    shared: Arc<Shared>,
}

/// Handle to a dialog instance. Clones refer to the same dialog.
#[derive(Clone)]
pub struct Dialog {
    inner: Arc<DialogInner>,
}

/// Non-owning handle, for handlers that need to reach their own dialog
#[derive(Clone)]
pub struct WeakDialog {
    inner: Weak<DialogInner>,
}

impl WeakDialog {
    pub fn upgrade(&self) -> Option<Dialog> {
        self.inner.upgrade().map(|inner| Dialog { inner })
    }
}

impl Dialog {
    pub(crate) fn new(
        shared: Arc<Shared>,
        single: bool,
        context: Option<&DialogContext>,
        name: &str,
        opts: Option<DialogOptions>,
    ) -> Self {
        let scope = shared.bus.register();
        let id = DialogId::generate();
        let cached_opts = opts.unwrap_or_default();

        let local = context.and_then(|context| context.resolve(name)).cloned();
        let is_local = local.is_some();
        let registration = local.or_else(|| shared.registry.lock().table.get(name).cloned());

        let (component, component_name, registered_opts) = match &registration {
            Some(registration) => (
                Some(registration.component_ref().clone()),
                registration.component_name(name),
                registration.default_options(),
            ),
            None => {
                debug!("No registration for dialog '{}', it will render nothing", name);
                (None, name.to_string(), DialogOptions::default())
            }
        };

        let mut current = DialogOptions::defaults();
        current.merge(&registered_opts);
        current.merge(&cached_opts);

        trace!("Created dialog {} ('{}', single: {}, local: {})", id, name, single, is_local);

        Self {
            inner: Arc::new(DialogInner {
                id,
                name: name.to_string(),
                component_name,
                component,
                registered_opts,
                single,
                local: is_local,
                scope,
                state: Mutex::new(DialogState {
                    phase: DialogPhase::Hidden,
                    close_pending: false,
                    props: DialogProps::new(),
                    opts: current,
                    cached_opts,
                }),
                guard: Mutex::new(None),
                shared,
            }),
        }
    }

    pub fn id(&self) -> &DialogId {
        &self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn component_name(&self) -> &str {
        &self.inner.component_name
    }

    /// Resolved component, `None` when the name matched no registration
    pub fn component(&self) -> Option<&ComponentRef> {
        self.inner.component.as_ref()
    }

    pub fn is_single(&self) -> bool {
        self.inner.single
    }

    pub fn is_local(&self) -> bool {
        self.inner.local
    }

    /// Event bus scope owned by this dialog
    pub fn scope(&self) -> ScopeId {
        self.inner.scope
    }

    pub fn phase(&self) -> DialogPhase {
        self.inner.state.lock().phase
    }

    pub fn is_showing(&self) -> bool {
        self.phase() == DialogPhase::Showing
    }

    pub fn props(&self) -> DialogProps {
        self.inner.state.lock().props.clone()
    }

    pub fn options(&self) -> DialogOptions {
        self.inner.state.lock().opts.clone()
    }

    /// Snapshot of what a renderer needs to draw this dialog
    pub fn view(&self) -> DialogView {
        let state = self.inner.state.lock();
        DialogView {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
            component_name: self.inner.component_name.clone(),
            props: state.props.clone(),
            opts: state.opts.clone(),
            is_local: self.inner.local,
            is_showing: state.phase == DialogPhase::Showing,
        }
    }

    pub fn downgrade(&self) -> WeakDialog {
        WeakDialog {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &Dialog) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Layer `opts` under anything passed to later `show()` calls
    pub(crate) fn merge_cached_options(&self, opts: &DialogOptions) {
        let mut state = self.inner.state.lock();
        state.cached_opts.merge(opts);
        state.opts.merge(opts);
    }

    /// Put the dialog on screen.
    ///
    /// `props` are merged key by key into the current props. Options are
    /// re-layered as registration defaults < request options < `opts`.
    /// Showing an already showing dialog only merges and returns at once;
    /// otherwise this resolves after the settle delay.
    pub async fn show(&self, props: Option<DialogProps>, opts: Option<DialogOptions>) -> DialogResult<()> {
        {
            let mut state = self.inner.state.lock();
            if matches!(state.phase, DialogPhase::Closing | DialogPhase::Destroyed) {
                warn!("Ignoring show() on closed dialog {}", self.inner.id);
                return Err(DialogError::Destroyed(self.inner.id.clone()));
            }

            if let Some(props) = props {
                state.props.extend(props);
            }

            let mut merged = state.opts.clone();
            merged.merge(&self.inner.registered_opts);
            merged.merge(&state.cached_opts);
            if let Some(opts) = &opts {
                merged.merge(opts);
            }
            state.opts = merged;

            if state.phase == DialogPhase::Showing {
                trace!("Dialog {} already showing, merged props only", self.inner.id);
                return Ok(());
            }
            state.phase = DialogPhase::Showing;
        }

        {
            let mut registry = self.inner.shared.registry.lock();
            if self.inner.single {
                registry.single.insert(self.inner.name.clone(), self.clone());
            } else {
                registry.multi.insert(self.inner.id.clone(), self.clone());
            }
            registry.visible.push(self.clone());
        }

        debug!("Showing dialog {} ('{}')", self.inner.id, self.inner.name);
        self.inner.shared.notify(ShellEvent::DialogShown {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
        });

        tokio::time::sleep(self.inner.shared.settle_delay).await;
        Ok(())
    }

    /// Take the dialog down, unless the before-close guard blocks.
    ///
    /// A close that is already waiting on the guard or animating makes
    /// further calls return [`CloseOutcome::AlreadyClosing`].
    pub async fn close(&self) -> CloseOutcome {
        {
            let mut state = self.inner.state.lock();
            match state.phase {
                DialogPhase::Destroyed => return CloseOutcome::Destroyed,
                DialogPhase::Closing => return CloseOutcome::AlreadyClosing,
                DialogPhase::Hidden | DialogPhase::Showing => {}
            }
            if state.close_pending {
                return CloseOutcome::AlreadyClosing;
            }
            state.close_pending = true;
        }

        let guard = self.inner.guard.lock().clone();
        let decision = match guard {
            Some(guard) => guard.before_close().await,
            None => CloseDecision::Allow,
        };

        {
            let mut state = self.inner.state.lock();
            state.close_pending = false;
            if decision == CloseDecision::Block {
                debug!("Close of dialog {} blocked by guard", self.inner.id);
                return CloseOutcome::Blocked;
            }
            state.phase = DialogPhase::Closing;
        }

        // Let the renderer start the exit animation before the entry goes away.
        tokio::task::yield_now().await;
        self.release();

        tokio::time::sleep(self.inner.shared.settle_delay).await;
        self.inner.state.lock().phase = DialogPhase::Destroyed;
        CloseOutcome::Closed
    }

    fn release(&self) {
        {
            let mut registry = self.inner.shared.registry.lock();
            registry.visible.retain(|entry| !entry.ptr_eq(self));
            if self.inner.single {
                let owns_slot = registry
                    .single
                    .get(&self.inner.name)
                    .is_some_and(|current| current.ptr_eq(self));
                if owns_slot {
                    registry.single.remove(&self.inner.name);
                }
            } else {
                registry.multi.remove(&self.inner.id);
            }
        }

        if let Err(e) = self.inner.shared.bus.unregister(self.inner.scope) {
            warn!("Can't unregister dialog {}: {}", self.inner.id, e);
        }

        debug!("Closed dialog {} ('{}')", self.inner.id, self.inner.name);
        self.inner.shared.notify(ShellEvent::DialogClosed {
            id: self.inner.id.clone(),
            name: self.inner.name.clone(),
        });
    }

    /// Drop a dialog that never made it on screen
    pub(crate) fn discard(&self) {
        self.inner.state.lock().phase = DialogPhase::Destroyed;
        if let Err(e) = self.inner.shared.bus.unregister(self.inner.scope) {
            warn!("Can't unregister discarded dialog {}: {}", self.inner.id, e);
        }
    }

    /// Install the before-close guard, replacing any previous one
    pub fn before_close<G>(&self, guard: G) -> &Self
    where
        G: CloseGuard + 'static,
    {
        *self.inner.guard.lock() = Some(Arc::new(guard));
        self
    }

    /// Bind `handler` to `event` within this dialog's scope
    pub fn on(&self, event: &str, handler: Handler) -> &Self {
        if let Err(e) = self.subscribe(event, handler) {
            warn!("Can't bind '{}' on dialog {}: {}", event, self.inner.id, e);
        }
        self
    }

    /// One-shot variant of [`Dialog::on`]
    pub fn once(&self, event: &str, handler: Handler) -> &Self {
        if let Err(e) = self.inner.shared.bus.once(event, handler, Some(self.inner.scope)) {
            warn!("Can't bind '{}' on dialog {}: {}", event, self.inner.id, e);
        }
        self
    }

    /// Like [`Dialog::on`], but hands back the subscription token
    pub fn subscribe(&self, event: &str, handler: Handler) -> BusResult<Subscription> {
        self.inner.shared.bus.on(event, handler, Some(self.inner.scope))
    }

    pub fn off(&self, event: &str, handler: &Handler) -> &Self {
        self.inner.shared.bus.off_handler(event, handler, Some(self.inner.scope));
        self
    }

    /// Deliver `event` to this dialog's handlers only
    pub fn emit(&self, event: &str, args: &[Value]) -> &Self {
        self.inner.shared.bus.emit_to(event, self.inner.scope, args);
        self
    }
}

impl Drop for DialogInner {
    // Dialogs dropped without ever closing still own a bus scope.
    fn drop(&mut self) {
        if let Err(e) = self.shared.bus.unregister(self.scope) {
            warn!("Can't unregister dropped dialog {}: {}", self.id, e);
        }
    }
}

impl std::fmt::Debug for Dialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialog")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("single", &self.inner.single)
            .field("phase", &self.phase())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{handler, EventBus};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn shared() -> Arc<Shared> {
        let shared = Arc::new(Shared::new(EventBus::new(), Duration::from_millis(500)));
        shared.registry.lock().table.insert(
            "Confirm".to_string(),
            DialogRegistration::with_options(
                ComponentRef::new("Confirm"),
                DialogOptions::default().with_anim_name("zoom"),
            ),
        );
        shared
    }

    fn props(value: Value) -> DialogProps {
        match value {
            Value::Object(map) => map,
            _ => DialogProps::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_registers_and_waits_settle_delay() {
        let shared = shared();
        let dialog = Dialog::new(shared.clone(), false, None, "Confirm", None);
        assert_eq!(dialog.phase(), DialogPhase::Hidden);

        let started = tokio::time::Instant::now();
        dialog.show(None, None).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(500));

        assert!(dialog.is_showing());
        let registry = shared.registry.lock();
        assert!(registry.multi.contains_key(dialog.id()));
        assert_eq!(registry.visible.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_show_merges_without_new_entries() {
        let shared = shared();
        let dialog = Dialog::new(shared.clone(), false, None, "Confirm", None);

        dialog.show(Some(props(json!({"title": "a", "keep": 1}))), None).await.unwrap();
        let started = tokio::time::Instant::now();
        dialog.show(Some(props(json!({"title": "b"}))), None).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);

        let props = dialog.props();
        assert_eq!(props["title"], "b");
        assert_eq!(props["keep"], 1);

        let registry = shared.registry.lock();
        assert_eq!(registry.multi.len(), 1);
        assert_eq!(registry.visible.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_option_priority() {
        let shared = shared();
        let requested = DialogOptions::default().with_mask_close(false).with_anim_name("slide");
        let dialog = Dialog::new(shared, false, None, "Confirm", Some(requested));

        let opts = dialog.options();
        assert_eq!(opts.anim_name.as_deref(), Some("slide"));
        assert_eq!(opts.mask_close, Some(false));
        assert_eq!(opts.mask_anim_name.as_deref(), Some("fade"));

        dialog
            .show(None, Some(DialogOptions::default().with_anim_name("fade-up")))
            .await
            .unwrap();
        assert_eq!(dialog.options().anim_name.as_deref(), Some("fade-up"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregistered_name_has_no_component() {
        let dialog = Dialog::new(shared(), false, None, "Nope", None);
        assert!(dialog.component().is_none());
        assert_eq!(dialog.component_name(), "Nope");
        assert_eq!(dialog.options(), DialogOptions::defaults());
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_registration_wins() {
        let context = DialogContext::new().with_local(
            "Confirm",
            DialogRegistration::component(ComponentRef::new("LocalConfirm")),
        );
        let dialog = Dialog::new(shared(), false, Some(&context), "Confirm", None);
        assert!(dialog.is_local());
        assert_eq!(dialog.component().unwrap().name, "LocalConfirm");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_tears_everything_down() {
        let shared = shared();
        let dialog = Dialog::new(shared.clone(), false, None, "Confirm", None);
        dialog.on("confirm", handler(|_| {}));
        dialog.show(None, None).await.unwrap();

        assert_eq!(dialog.close().await, CloseOutcome::Closed);
        assert_eq!(dialog.phase(), DialogPhase::Destroyed);
        assert!(!shared.bus.is_registered(dialog.scope()));
        assert_eq!(shared.bus.subscriber_count("confirm"), 0);

        let registry = shared.registry.lock();
        assert!(registry.multi.is_empty());
        assert!(registry.visible.is_empty());
        drop(registry);

        assert_eq!(dialog.close().await, CloseOutcome::Destroyed);
        assert_eq!(
            dialog.show(None, None).await,
            Err(DialogError::Destroyed(dialog.id().clone()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_guard_keeps_dialog_open() {
        let shared = shared();
        let dialog = Dialog::new(shared.clone(), false, None, "Confirm", None);
        dialog.before_close(|| async { CloseDecision::Block });
        dialog.show(None, None).await.unwrap();

        assert_eq!(dialog.close().await, CloseOutcome::Blocked);
        assert!(dialog.is_showing());
        assert!(shared.registry.lock().multi.contains_key(dialog.id()));

        dialog.before_close(|| async { CloseDecision::Allow });
        assert_eq!(dialog.close().await, CloseOutcome::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_close_runs_guard_once() {
        let shared = shared();
        let dialog = Dialog::new(shared, false, None, "Confirm", None);
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = asked.clone();
        dialog.before_close(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                CloseDecision::Allow
            }
        });
        dialog.show(None, None).await.unwrap();

        let (first, second) = tokio::join!(dialog.close(), dialog.close());
        assert_eq!(first, CloseOutcome::Closed);
        assert_eq!(second, CloseOutcome::AlreadyClosing);
        assert_eq!(asked.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emit_is_scoped_to_dialog() {
        let shared = shared();
        let first = Dialog::new(shared.clone(), false, None, "Confirm", None);
        let second = Dialog::new(shared, false, None, "Confirm", None);
        let hits = Arc::new(AtomicUsize::new(0));

        let seen = hits.clone();
        first.on("confirm", handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let seen = hits.clone();
        second.on("confirm", handler(move |_| {
            seen.fetch_add(10, Ordering::SeqCst);
        }));

        first.emit("confirm", &[json!(true)]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_unshown_dialog_releases_scope() {
        let shared = shared();
        let dialog = Dialog::new(shared.clone(), false, None, "Confirm", None);
        let scope = dialog.scope();
        dialog.on("confirm", handler(|_| {}));
        dialog.once("cancel", handler(|_| {}));

        let weak = dialog.downgrade();
        let copy = dialog.clone();
        drop(dialog);
        assert!(shared.bus.is_registered(scope));

        drop(copy);
        assert!(weak.upgrade().is_none());
        assert!(!shared.bus.is_registered(scope));
        assert_eq!(shared.bus.subscriber_count("confirm"), 0);
        assert_eq!(shared.bus.subscriber_count("cancel"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discard_releases_scope() {
        let shared = shared();
        let dialog = Dialog::new(shared.clone(), true, None, "Confirm", None);
        dialog.on("confirm", handler(|_| {}));

        dialog.discard();
        assert_eq!(dialog.phase(), DialogPhase::Destroyed);
        assert!(!shared.bus.is_registered(dialog.scope()));
        assert_eq!(shared.bus.subscriber_count("confirm"), 0);
    }
}
