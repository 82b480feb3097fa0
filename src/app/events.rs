//! Notifications the shell sends to whatever renders it

use crate::dialog::DialogId;
use serde::{Deserialize, Serialize};

/// Events that can occur in the shell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShellEvent {
    /// A dialog entered the visible list
    DialogShown {
        id: DialogId,
        name: String,
    },

    /// A dialog left the visible list
    DialogClosed {
        id: DialogId,
        name: String,
    },

    /// The router moved to another page
    Navigated {
        route: String,
    },

    /// The server reported the login as no longer valid
    LoginInvalid,
}

impl ShellEvent {
    /// Get the dialog ID associated with this event, if any
    pub fn dialog_id(&self) -> Option<&DialogId> {
        match self {
            ShellEvent::DialogShown { id, .. } | ShellEvent::DialogClosed { id, .. } => Some(id),
            ShellEvent::Navigated { .. } | ShellEvent::LoginInvalid => None,
        }
    }

    /// Check if this event changes what dialogs are on screen
    pub fn is_dialog_event(&self) -> bool {
        self.dialog_id().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_tagged() {
        let event = ShellEvent::DialogShown {
            id: DialogId::new("Dialog-1-1"),
            name: "Confirm".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "dialog_shown");
        assert_eq!(json["id"], "Dialog-1-1");

        let json = serde_json::to_value(ShellEvent::LoginInvalid).unwrap();
        assert_eq!(json["type"], "login_invalid");
        assert!(!ShellEvent::LoginInvalid.is_dialog_event());
    }
}
