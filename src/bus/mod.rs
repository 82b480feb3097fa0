//! Scoped publish/subscribe event bus
//!
//! Subscriptions live in scopes. Every registered owner (a dialog, a page)
//! gets its own scope; scope `0` is global. Broadcasts walk every scope in
//! creation order, then handlers in binding order. A sticky emission that
//! finds nobody is parked in a single slot per event type and replayed when
//! the next subscriber for that type arrives.
//!
//! Handlers run synchronously on the emitting task, with no lock held, so a
//! handler may freely call back into the bus.

mod types;

pub use types::*;

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, trace, warn};

struct Binding {
    handler: Handler,
    once: bool,
}

struct ScopeTable {
    next_handler: u64,
    events: HashMap<String, BTreeMap<HandlerId, Binding>>,
}

impl ScopeTable {
    fn new() -> Self {
        Self {
            next_handler: 1,
            events: HashMap::new(),
        }
    }
}

struct BusState {
    next_scope: u64,
    scopes: BTreeMap<ScopeId, ScopeTable>,
    sticky: HashMap<String, Vec<Value>>,
}

impl Default for BusState {
    fn default() -> Self {
        let mut scopes = BTreeMap::new();
        scopes.insert(ScopeId::GLOBAL, ScopeTable::new());
        Self {
            next_scope: 1,
            scopes,
            sticky: HashMap::new(),
        }
    }
}

/// Shared handle to a subscriber registry.
///
/// Cloning is cheap and every clone sees the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusState>>,
}

impl EventBus {
    /// Create an empty bus containing only the global scope
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh scope
    pub fn register(&self) -> ScopeId {
        let mut state = self.inner.lock();
        let scope = ScopeId::new(state.next_scope);
        state.next_scope += 1;
        state.scopes.insert(scope, ScopeTable::new());
        debug!("Registered {}", scope);
        scope
    }

    /// Make sure a previously issued scope has a table.
    ///
    /// Existing bindings are left untouched. Scopes this bus never issued
    /// are rejected.
    pub fn ensure_registered(&self, scope: ScopeId) -> BusResult<()> {
        let mut state = self.inner.lock();
        if scope.is_global() {
            return Ok(());
        }
        if scope.as_u64() >= state.next_scope {
            warn!("Can't register {}: never issued by this bus", scope);
            return Err(BusError::UnknownScope(scope));
        }
        state.scopes.entry(scope).or_insert_with(ScopeTable::new);
        Ok(())
    }

    /// Drop a scope and every binding in it.
    ///
    /// Unregistering an already removed scope is a no-op.
    pub fn unregister(&self, scope: ScopeId) -> BusResult<()> {
        if scope.is_global() {
            warn!("Refusing to unregister the global scope");
            return Err(BusError::GlobalScope);
        }
        let removed = self.inner.lock().scopes.remove(&scope);
        match removed {
            Some(_) => debug!("Unregistered {}", scope),
            None => trace!("{} was not registered", scope),
        }
        Ok(())
    }

    pub fn is_registered(&self, scope: ScopeId) -> bool {
        self.inner.lock().scopes.contains_key(&scope)
    }

    /// Bind `handler` to `event` in `scope` (global when `None`).
    ///
    /// A pending sticky message for `event` is replayed to every current
    /// subscriber right after binding.
    pub fn on(&self, event: &str, handler: Handler, scope: Option<ScopeId>) -> BusResult<Subscription> {
        self.bind(event, handler, scope, false)
    }

    /// Like [`EventBus::on`], but the binding is dropped before its first invocation
    pub fn once(&self, event: &str, handler: Handler, scope: Option<ScopeId>) -> BusResult<Subscription> {
        self.bind(event, handler, scope, true)
    }

    fn bind(
        &self,
        event: &str,
        handler: Handler,
        scope: Option<ScopeId>,
        once: bool,
    ) -> BusResult<Subscription> {
        let scope = scope.unwrap_or(ScopeId::GLOBAL);
        let (subscription, pending) = {
            let mut state = self.inner.lock();
            let table = state
                .scopes
                .get_mut(&scope)
                .ok_or(BusError::UnknownScope(scope))?;

            let existing = table
                .events
                .get_mut(event)
                .and_then(|bindings| {
                    bindings
                        .iter_mut()
                        .find(|(_, binding)| same_handler(&binding.handler, &handler))
                })
                .map(|(id, binding)| {
                    binding.once = once;
                    *id
                });

            let id = match existing {
                Some(id) => id,
                None => {
                    let id = HandlerId::new(table.next_handler);
                    table.next_handler += 1;
                    table
                        .events
                        .entry(event.to_string())
                        .or_default()
                        .insert(id, Binding { handler, once });
                    id
                }
            };

            let subscription = Subscription {
                scope,
                event: event.to_string(),
                handler: id,
            };
            (subscription, state.sticky.remove(event))
        };

        trace!("Bound {} to '{}' in {}", subscription.handler, event, scope);

        if let Some(args) = pending {
            debug!("Replaying sticky '{}'", event);
            self.emit(event, &args);
        }

        Ok(subscription)
    }

    /// Broadcast to every binding of `event` in every scope.
    ///
    /// Returns how many handlers ran.
    pub fn emit(&self, event: &str, args: &[Value]) -> usize {
        self.deliver(event, None, args)
    }

    /// Deliver only to bindings of `event` inside `scope`
    pub fn emit_to(&self, event: &str, scope: ScopeId, args: &[Value]) -> usize {
        self.deliver(event, Some(scope), args)
    }

    /// Broadcast, parking the arguments for the next subscriber if nobody heard it.
    ///
    /// A newer sticky replaces an older pending one. A delivery that reaches
    /// anyone discards whatever was pending.
    pub fn sticky_emit(&self, event: &str, args: Vec<Value>) -> usize {
        let delivered = self.emit(event, &args);
        let mut state = self.inner.lock();
        if delivered == 0 {
            debug!("No subscribers for '{}', keeping it sticky", event);
            state.sticky.insert(event.to_string(), args);
        } else {
            state.sticky.remove(event);
        }
        delivered
    }

    fn deliver(&self, event: &str, only: Option<ScopeId>, args: &[Value]) -> usize {
        let targets: Vec<(ScopeId, HandlerId)> = {
            let state = self.inner.lock();
            state
                .scopes
                .iter()
                .filter(|(scope, _)| only.map_or(true, |wanted| wanted == **scope))
                .filter_map(|(scope, table)| table.events.get(event).map(|bindings| (*scope, bindings)))
                .flat_map(|(scope, bindings)| bindings.keys().map(move |id| (scope, *id)))
                .collect()
        };

        let mut delivered = 0;
        for (scope, id) in targets {
            // An earlier handler may have unbound this one.
            let Some(handler) = self.claim(event, scope, id) else {
                continue;
            };
            handler(args);
            delivered += 1;
        }

        trace!("Delivered '{}' to {} handler(s)", event, delivered);
        delivered
    }

    fn claim(&self, event: &str, scope: ScopeId, id: HandlerId) -> Option<Handler> {
        let mut state = self.inner.lock();
        let table = state.scopes.get_mut(&scope)?;
        let bindings = table.events.get_mut(event)?;
        if !bindings.get(&id)?.once {
            return bindings.get(&id).map(|binding| binding.handler.clone());
        }

        let binding = bindings.remove(&id)?;
        if bindings.is_empty() {
            table.events.remove(event);
        }
        Some(binding.handler)
    }

    /// Remove one binding. Returns false when it was already gone.
    pub fn off(&self, subscription: &Subscription) -> bool {
        let mut state = self.inner.lock();
        let Some(table) = state.scopes.get_mut(&subscription.scope) else {
            return false;
        };
        let Some(bindings) = table.events.get_mut(&subscription.event) else {
            return false;
        };
        let removed = bindings.remove(&subscription.handler).is_some();
        if bindings.is_empty() {
            table.events.remove(&subscription.event);
        }
        removed
    }

    /// Remove the binding of `handler` for `event` in `scope` (global when `None`)
    pub fn off_handler(&self, event: &str, handler: &Handler, scope: Option<ScopeId>) -> bool {
        let scope = scope.unwrap_or(ScopeId::GLOBAL);
        let mut state = self.inner.lock();
        let Some(table) = state.scopes.get_mut(&scope) else {
            warn!("Can't unbind '{}' from {}: not registered", event, scope);
            return false;
        };
        let Some(bindings) = table.events.get_mut(event) else {
            return false;
        };
        let id = bindings
            .iter()
            .find(|(_, binding)| same_handler(&binding.handler, handler))
            .map(|(id, _)| *id);
        let removed = id.and_then(|id| bindings.remove(&id)).is_some();
        if bindings.is_empty() {
            table.events.remove(event);
        }
        removed
    }

    /// Remove every binding of `event` in every scope.
    ///
    /// Meant for teardown paths. Returns the number of bindings dropped.
    pub fn off_all(&self, event: &str) -> usize {
        let mut state = self.inner.lock();
        let removed = state
            .scopes
            .values_mut()
            .filter_map(|table| table.events.remove(event))
            .map(|bindings| bindings.len())
            .sum();
        debug!("Removed {} binding(s) of '{}'", removed, event);
        removed
    }

    /// Number of live bindings for `event` across all scopes
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.inner
            .lock()
            .scopes
            .values()
            .filter_map(|table| table.events.get(event))
            .map(|bindings| bindings.len())
            .sum()
    }

    /// Whether a sticky message for `event` is waiting for a subscriber
    pub fn has_sticky(&self, event: &str) -> bool {
        self.inner.lock().sticky.contains_key(event)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("EventBus")
            .field("scopes", &state.scopes.len())
            .field("sticky", &state.sticky.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, Handler) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        (count, handler(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }))
    }

    fn recorder() -> (Arc<Mutex<Vec<Vec<Value>>>>, Handler) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        (calls, handler(move |args| sink.lock().push(args.to_vec())))
    }

    #[test]
    fn test_emit_reaches_every_scope_once() {
        let bus = EventBus::new();
        let a = bus.register();
        let b = bus.register();

        let (global, h_global) = counter();
        let (in_a, h_a) = counter();
        let (in_b, h_b) = counter();
        bus.on("ping", h_global, None).unwrap();
        bus.on("ping", h_a, Some(a)).unwrap();
        bus.on("ping", h_b, Some(b)).unwrap();

        assert_eq!(bus.emit("ping", &[]), 3);
        assert_eq!(global.load(Ordering::SeqCst), 1);
        assert_eq!(in_a.load(Ordering::SeqCst), 1);
        assert_eq!(in_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_order_follows_scopes_then_bindings() {
        let bus = EventBus::new();
        let scope = bus.register();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (label, target) in [("a1", Some(scope)), ("g1", None), ("a2", Some(scope)), ("g2", None)] {
            let order = order.clone();
            bus.on("tick", handler(move |_| order.lock().push(label)), target).unwrap();
        }

        bus.emit("tick", &[]);
        assert_eq!(*order.lock(), vec!["g1", "g2", "a1", "a2"]);
    }

    #[test]
    fn test_same_handler_is_not_bound_twice() {
        let bus = EventBus::new();
        let (count, h) = counter();

        let first = bus.on("dup", h.clone(), None).unwrap();
        let second = bus.on("dup", h, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(bus.subscriber_count("dup"), 1);
        bus.emit("dup", &[]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_once_fires_at_most_once() {
        let bus = EventBus::new();
        let scope = bus.register();
        let (count, h) = counter();
        bus.once("done", h, Some(scope)).unwrap();

        bus.emit("done", &[]);
        bus.emit("done", &[]);
        bus.emit_to("done", scope, &[]);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count("done"), 0);
    }

    #[test]
    fn test_emit_to_is_scope_local() {
        let bus = EventBus::new();
        let a = bus.register();
        let b = bus.register();
        let (in_a, h_a) = counter();
        let (in_b, h_b) = counter();
        let (global, h_global) = counter();
        bus.on("confirm", h_a, Some(a)).unwrap();
        bus.on("confirm", h_b, Some(b)).unwrap();
        bus.on("confirm", h_global, None).unwrap();

        assert_eq!(bus.emit_to("confirm", a, &[json!(1)]), 1);
        assert_eq!(in_a.load(Ordering::SeqCst), 1);
        assert_eq!(in_b.load(Ordering::SeqCst), 0);
        assert_eq!(global.load(Ordering::SeqCst), 0);

        assert_eq!(bus.emit_to("missing", a, &[]), 0);
    }

    #[test]
    fn test_sticky_replays_exactly_once() {
        let bus = EventBus::new();
        assert_eq!(bus.sticky_emit("X", vec![json!(1)]), 0);
        assert!(bus.has_sticky("X"));

        let (first, h1) = recorder();
        bus.on("X", h1, None).unwrap();
        assert_eq!(*first.lock(), vec![vec![json!(1)]]);
        assert!(!bus.has_sticky("X"));

        let (second, h2) = recorder();
        bus.on("X", h2, None).unwrap();
        assert!(second.lock().is_empty());
        assert_eq!(first.lock().len(), 1);
    }

    #[test]
    fn test_sticky_with_live_subscriber_is_not_cached() {
        let bus = EventBus::new();
        let (calls, h) = recorder();
        bus.on("X", h, None).unwrap();

        assert_eq!(bus.sticky_emit("X", vec![json!(1)]), 1);
        assert_eq!(*calls.lock(), vec![vec![json!(1)]]);
        assert!(!bus.has_sticky("X"));
    }

    #[test]
    fn test_sticky_replays_into_scoped_subscriber() {
        let bus = EventBus::new();
        let scope = bus.register();
        bus.sticky_emit("late", vec![json!("hello")]);

        let (scoped, h_scoped) = recorder();
        bus.on("late", h_scoped, Some(scope)).unwrap();
        let (global, h_global) = recorder();
        bus.on("late", h_global, None).unwrap();

        assert_eq!(*scoped.lock(), vec![vec![json!("hello")]]);
        assert!(global.lock().is_empty());
    }

    #[test]
    fn test_newer_sticky_replaces_pending() {
        let bus = EventBus::new();
        bus.sticky_emit("X", vec![json!(1)]);
        bus.sticky_emit("X", vec![json!(2)]);

        let (calls, h) = recorder();
        bus.on("X", h, None).unwrap();
        assert_eq!(*calls.lock(), vec![vec![json!(2)]]);
    }

    #[test]
    fn test_off_and_unregister() {
        let bus = EventBus::new();
        let scope = bus.register();
        let (count, h) = counter();
        let subscription = bus.on("evt", h, Some(scope)).unwrap();

        assert!(bus.off(&subscription));
        assert!(!bus.off(&subscription));
        bus.emit("evt", &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        let (count, h) = counter();
        let subscription = bus.on("evt", h, Some(scope)).unwrap();
        bus.unregister(scope).unwrap();
        assert!(!bus.is_registered(scope));
        assert!(!bus.off(&subscription));
        bus.emit("evt", &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        assert_eq!(
            bus.on("evt", handler(|_| {}), Some(scope)),
            Err(BusError::UnknownScope(scope))
        );
        assert_eq!(bus.unregister(ScopeId::GLOBAL), Err(BusError::GlobalScope));
        assert!(bus.unregister(scope).is_ok());
    }

    #[test]
    fn test_off_handler_by_identity() {
        let bus = EventBus::new();
        let (count, h) = counter();
        bus.on("evt", h.clone(), None).unwrap();

        assert!(!bus.off_handler("evt", &handler(|_| {}), None));
        assert!(bus.off_handler("evt", &h, None));
        bus.emit("evt", &[]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_off_all_wipes_every_scope() {
        let bus = EventBus::new();
        let scope = bus.register();
        bus.on("evt", handler(|_| {}), None).unwrap();
        bus.on("evt", handler(|_| {}), Some(scope)).unwrap();
        bus.on("other", handler(|_| {}), Some(scope)).unwrap();

        assert_eq!(bus.off_all("evt"), 2);
        assert_eq!(bus.subscriber_count("evt"), 0);
        assert_eq!(bus.subscriber_count("other"), 1);
    }

    #[test]
    fn test_ensure_registered_is_idempotent() {
        let bus = EventBus::new();
        let scope = bus.register();
        bus.on("evt", handler(|_| {}), Some(scope)).unwrap();

        bus.ensure_registered(scope).unwrap();
        assert_eq!(bus.subscriber_count("evt"), 1);

        bus.unregister(scope).unwrap();
        bus.ensure_registered(scope).unwrap();
        assert!(bus.is_registered(scope));
        assert_eq!(
            bus.ensure_registered(ScopeId::new(99)),
            Err(BusError::UnknownScope(ScopeId::new(99)))
        );
    }

    #[test]
    fn test_handler_may_unbind_a_later_handler() {
        let bus = EventBus::new();
        let (count, victim) = counter();
        let victim_for_killer = victim.clone();
        let bus_for_killer = bus.clone();
        bus.on("evt", handler(move |_| {
            bus_for_killer.off_handler("evt", &victim_for_killer, None);
        }), None).unwrap();
        bus.on("evt", victim, None).unwrap();

        assert_eq!(bus.emit("evt", &[]), 1);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
