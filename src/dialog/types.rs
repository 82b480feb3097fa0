//! Core dialog types
//!
//! Identifiers, options, registrations and the display snapshot handed to
//! renderers.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::future::Future;

/// Unique identifier for dialog instances
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId(pub String);

impl DialogId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Time plus random suffix. Collisions are unlikely, not impossible.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let salt: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("Dialog-{}-{}", millis, salt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DialogId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DialogId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for DialogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Properties passed through to the rendered dialog component
pub type DialogProps = Map<String, Value>;

/// Presentation options. Every field is optional so that partial option sets
/// can be layered over each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogOptions {
    /// Whether tapping the mask closes the dialog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_close: Option<bool>,

    /// Entrance/exit animation of the dialog body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anim_name: Option<String>,

    /// Animation of the mask
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_anim_name: Option<String>,

    /// Mask background color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mask_bg_color: Option<String>,
}

impl DialogOptions {
    /// Baseline every dialog starts from
    pub fn defaults() -> Self {
        Self {
            mask_close: Some(true),
            anim_name: Some("bounce".to_string()),
            mask_anim_name: Some("fade".to_string()),
            mask_bg_color: Some("rgba(0, 0, 0, 0.8)".to_string()),
        }
    }

    pub fn with_mask_close(mut self, mask_close: bool) -> Self {
        self.mask_close = Some(mask_close);
        self
    }

    pub fn with_anim_name(mut self, anim_name: impl Into<String>) -> Self {
        self.anim_name = Some(anim_name.into());
        self
    }

    pub fn with_mask_anim_name(mut self, mask_anim_name: impl Into<String>) -> Self {
        self.mask_anim_name = Some(mask_anim_name.into());
        self
    }

    pub fn with_mask_bg_color(mut self, color: impl Into<String>) -> Self {
        self.mask_bg_color = Some(color.into());
        self
    }

    /// Overlay the fields `other` sets
    pub fn merge(&mut self, other: &DialogOptions) {
        if other.mask_close.is_some() {
            self.mask_close = other.mask_close;
        }
        if other.anim_name.is_some() {
            self.anim_name = other.anim_name.clone();
        }
        if other.mask_anim_name.is_some() {
            self.mask_anim_name = other.mask_anim_name.clone();
        }
        if other.mask_bg_color.is_some() {
            self.mask_bg_color = other.mask_bg_color.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reference to a renderable component, as the renderer knows it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRef {
    /// Name the renderer mounts the component under
    pub name: String,

    /// Options the component declares for itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dialog_options: Option<DialogOptions>,
}

impl ComponentRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dialog_options: None,
        }
    }

    pub fn with_dialog_options(mut self, options: DialogOptions) -> Self {
        self.dialog_options = Some(options);
        self
    }
}

/// How a dialog name maps to something renderable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogRegistration {
    /// Just a component; its own declared options are the defaults
    BareComponent(ComponentRef),
    /// A component with a mount name and default options of its own
    ComponentWithOptions {
        component: ComponentRef,
        component_name: Option<String>,
        opts: Option<DialogOptions>,
    },
}

impl DialogRegistration {
    pub fn component(component: ComponentRef) -> Self {
        Self::BareComponent(component)
    }

    pub fn with_options(component: ComponentRef, opts: DialogOptions) -> Self {
        Self::ComponentWithOptions {
            component,
            component_name: None,
            opts: Some(opts),
        }
    }

    pub fn component_ref(&self) -> &ComponentRef {
        match self {
            Self::BareComponent(component) => component,
            Self::ComponentWithOptions { component, .. } => component,
        }
    }

    /// Name the renderer should mount for a dialog requested as `dialog_name`
    pub fn component_name(&self, dialog_name: &str) -> String {
        match self {
            Self::BareComponent(_) => dialog_name.to_string(),
            Self::ComponentWithOptions { component_name, .. } => component_name
                .clone()
                .unwrap_or_else(|| dialog_name.to_string()),
        }
    }

    /// Lowest-priority option layer contributed by the registration
    pub fn default_options(&self) -> DialogOptions {
        match self {
            Self::BareComponent(component) => component.dialog_options.clone().unwrap_or_default(),
            Self::ComponentWithOptions { component, opts, .. } => opts
                .clone()
                .or_else(|| component.dialog_options.clone())
                .unwrap_or_default(),
        }
    }
}

/// Lifecycle of a dialog instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPhase {
    /// Created, not on screen
    #[default]
    Hidden,
    /// On screen
    Showing,
    /// Close accepted, exit animation running
    Closing,
    /// Removed from every registry
    Destroyed,
}

/// Display state of one dialog, what a renderer needs to mount it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogView {
    pub id: DialogId,
    pub name: String,
    pub component_name: String,
    pub props: DialogProps,
    pub opts: DialogOptions,
    pub is_local: bool,
    pub is_showing: bool,
}

/// Answer of a before-close guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDecision {
    Allow,
    Block,
}

/// What a call to `close()` ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The dialog was torn down
    Closed,
    /// The before-close guard refused
    Blocked,
    /// Another close is already in flight
    AlreadyClosing,
    /// Nothing left to close
    Destroyed,
}

/// Veto point consulted before a dialog closes.
///
/// Guards may suspend (e.g. to ask for confirmation); the dialog stays
/// showing meanwhile.
#[async_trait]
pub trait CloseGuard: Send + Sync {
    async fn before_close(&self) -> CloseDecision;
}

#[async_trait]
impl<F, Fut> CloseGuard for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = CloseDecision> + Send,
{
    async fn before_close(&self) -> CloseDecision {
        (self)().await
    }
}

/// Result type for dialog operations
pub type DialogResult<T> = std::result::Result<T, DialogError>;

/// Dialog-specific error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DialogError {
    #[error("Dialog with ID '{0}' not found")]
    NotFound(DialogId),

    #[error("Dialog with ID '{0}' is closing or destroyed")]
    Destroyed(DialogId),
}

/// Names of the dialogs every shell registers at startup
pub mod dialog_names {
    pub const CONFIRM: &str = "Confirm";
    pub const PHOTO_PREVIEW: &str = "PhotoPreview";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_merge_later_wins() {
        let mut opts = DialogOptions::defaults();
        opts.merge(&DialogOptions::default().with_anim_name("slide"));
        opts.merge(&DialogOptions::default().with_mask_close(false));

        assert_eq!(opts.anim_name.as_deref(), Some("slide"));
        assert_eq!(opts.mask_close, Some(false));
        assert_eq!(opts.mask_anim_name.as_deref(), Some("fade"));
    }

    #[test]
    fn test_registration_resolution() {
        let declared = DialogOptions::default().with_anim_name("zoom");
        let bare = DialogRegistration::component(
            ComponentRef::new("Sheet").with_dialog_options(declared.clone()),
        );
        assert_eq!(bare.component_name("Share"), "Share");
        assert_eq!(bare.default_options(), declared);

        let configured = DialogRegistration::ComponentWithOptions {
            component: ComponentRef::new("Sheet").with_dialog_options(declared.clone()),
            component_name: Some("BottomSheet".to_string()),
            opts: None,
        };
        assert_eq!(configured.component_name("Share"), "BottomSheet");
        assert_eq!(configured.default_options(), declared);

        let explicit = DialogOptions::default().with_mask_close(false);
        let configured = DialogRegistration::with_options(ComponentRef::new("Sheet"), explicit.clone());
        assert_eq!(configured.component_name("Share"), "Share");
        assert_eq!(configured.default_options(), explicit);
    }

    #[test]
    fn test_generated_ids_have_prefix() {
        let id = DialogId::generate();
        assert!(id.as_str().starts_with("Dialog-"));
        assert_eq!(id.as_str().split('-').count(), 3);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = DialogView {
            id: DialogId::new("Dialog-1-2"),
            name: "Confirm".to_string(),
            component_name: "Confirm".to_string(),
            props: DialogProps::new(),
            opts: DialogOptions::defaults(),
            is_local: false,
            is_showing: true,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["componentName"], "Confirm");
        assert_eq!(json["isShowing"], true);
        assert_eq!(json["opts"]["maskBgColor"], "rgba(0, 0, 0, 0.8)");
    }
}
