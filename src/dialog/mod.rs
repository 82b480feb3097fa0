//! Dialog system for app-wide overlays
//!
//! Dialogs are requested by name from the [`DialogManager`], which resolves
//! the name against caller-local registrations first and its global table
//! second. Each dialog owns an event bus scope for its own events and walks
//! a small show/close state machine; the manager tracks what is on screen
//! so an external renderer can mount it in order.

pub mod context;
pub mod instance;
pub mod manager;
pub mod register;
mod state;
pub mod types;

pub use context::DialogContext;
pub use instance::{Dialog, WeakDialog};
pub use manager::{DialogManager, DialogScope};
pub use register::builtin_dialogs;
pub use types::*;
