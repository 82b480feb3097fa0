//! Identity and handle types for the event bus

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Isolation boundary for subscriptions.
///
/// Scope `0` is the reserved global scope; it is always registered and every
/// broadcast reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u64);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);

    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_global(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope-{}", self.0)
    }
}

/// Identity of a handler binding, unique within its scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

/// Callback invoked with the arguments of an emitted event
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Wrap a closure as a [`Handler`].
///
/// Keep the returned value around if you want to unbind by identity later;
/// binding the same `Handler` twice in one scope reuses the existing binding.
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&[Value]) + Send + Sync + 'static,
{
    Arc::new(f)
}

pub(crate) fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Token returned by `on`/`once`, passed back to `off`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub scope: ScopeId,
    pub event: String,
    pub handler: HandlerId,
}

/// Event bus errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Scope '{0}' is not registered")]
    UnknownScope(ScopeId),

    #[error("The global scope cannot be unregistered")]
    GlobalScope,
}

/// Result type for event bus operations
pub type BusResult<T> = std::result::Result<T, BusError>;
