//! Dialogs every shell knows about at startup

use super::types::{dialog_names, ComponentRef, DialogRegistration};

/// Built-in registrations: component only, no default options
pub fn builtin_dialogs() -> Vec<(&'static str, DialogRegistration)> {
    vec![
        (
            dialog_names::PHOTO_PREVIEW,
            DialogRegistration::component(ComponentRef::new(dialog_names::PHOTO_PREVIEW)),
        ),
        (
            dialog_names::CONFIRM,
            DialogRegistration::component(ComponentRef::new(dialog_names::CONFIRM)),
        ),
    ]
}
