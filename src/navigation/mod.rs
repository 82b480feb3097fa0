//! Tab-aware navigation
//!
//! Tab pages are switched in place (`replace`) so the history never grows
//! a stack of tabs; every other page is pushed.

mod router;

pub use router::{MemoryRouter, RouteLocation, Router, RouterError, RouterResult};

use crate::app::ShellEvent;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// One entry of the tab bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabItem {
    /// Label shown under the icon
    pub name: String,
    pub icon: String,
    pub route_name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<String>,
}

impl TabItem {
    pub fn new(
        name: impl Into<String>,
        icon: impl Into<String>,
        route_name: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            route_name: route_name.into(),
            path: path.into(),
            badge: None,
        }
    }

    /// The `home` and `profile` tabs
    pub fn defaults() -> Vec<TabItem> {
        vec![
            TabItem::new("Home", "home", "home", "/"),
            TabItem::new("Profile", "person", "profile", "/profile"),
        ]
    }
}

/// What a navigation call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    Navigated,
    /// `switch_tab` to something that is not a tab page
    NotATabPage,
    /// `navigate_back` while on a tab page
    StayedOnTab,
    /// Nothing left in the history
    NoHistory,
    /// No router yet
    Uninitialized,
    Failed(RouterError),
}

pub struct NavigationManager {
    tabs: Vec<TabItem>,
    show_tab_bar: bool,
    router: RwLock<Option<Arc<dyn Router>>>,
    events: Mutex<Option<mpsc::UnboundedSender<ShellEvent>>>,
}

impl NavigationManager {
    pub fn new(tabs: Vec<TabItem>) -> Self {
        Self {
            tabs,
            show_tab_bar: true,
            router: RwLock::new(None),
            events: Mutex::new(None),
        }
    }

    /// Turn the tab bar on or off for every page
    pub fn with_tab_bar(mut self, show: bool) -> Self {
        self.show_tab_bar = show;
        self
    }

    pub fn init(&self, router: Arc<dyn Router>) {
        debug!("Navigation initialized with {} tab(s)", self.tabs.len());
        *self.router.write() = Some(router);
    }

    pub fn set_event_sender(&self, sender: mpsc::UnboundedSender<ShellEvent>) {
        *self.events.lock() = Some(sender);
    }

    pub fn tabs(&self) -> &[TabItem] {
        &self.tabs
    }

    pub fn is_tab_page(&self, route_name: &str) -> bool {
        self.tabs.iter().any(|tab| tab.route_name == route_name)
    }

    pub fn show_tab_bar(&self) -> bool {
        self.show_tab_bar
    }

    /// Whether the tab bar should be drawn right now: enabled and on a tab page
    pub fn tab_bar_visible(&self) -> bool {
        if !self.show_tab_bar {
            return false;
        }
        let router = self.router.read().clone();
        router
            .and_then(|router| router.current())
            .is_some_and(|route| self.is_tab_page(&route.name))
    }

    /// History-back guard: leaving a tab page through history is refused
    pub fn allow_history_back(&self, from: &str) -> bool {
        !self.is_tab_page(from)
    }

    pub fn current(&self) -> Option<RouteLocation> {
        self.router().and_then(|router| router.current())
    }

    fn router(&self) -> Option<Arc<dyn Router>> {
        let router = self.router.read().clone();
        if router.is_none() {
            error!("Navigation used before init");
        }
        router
    }

    pub async fn switch_tab(&self, route: impl Into<RouteLocation>) -> NavigationOutcome {
        let route = route.into();
        let Some(router) = self.router() else {
            return NavigationOutcome::Uninitialized;
        };
        if !self.is_tab_page(&route.name) {
            warn!("switch_tab only works for tab pages, got '{}'", route.name);
            return NavigationOutcome::NotATabPage;
        }
        let result = router.replace(&route).await;
        self.finish(route, result)
    }

    /// Push a page; tab pages are switched to instead
    pub async fn navigate_to(&self, route: impl Into<RouteLocation>) -> NavigationOutcome {
        let route = route.into();
        if self.is_tab_page(&route.name) {
            return self.switch_tab(route).await;
        }
        let Some(router) = self.router() else {
            return NavigationOutcome::Uninitialized;
        };
        let result = router.push(&route).await;
        self.finish(route, result)
    }

    pub async fn navigate_back(&self) -> NavigationOutcome {
        let Some(router) = self.router() else {
            return NavigationOutcome::Uninitialized;
        };
        if let Some(current) = router.current() {
            if self.is_tab_page(&current.name) {
                return NavigationOutcome::StayedOnTab;
            }
        }
        if !router.back() {
            return NavigationOutcome::NoHistory;
        }
        match router.current() {
            Some(route) => self.finish(route, Ok(())),
            None => NavigationOutcome::Navigated,
        }
    }

    pub async fn redirect_to(&self, route: impl Into<RouteLocation>) -> NavigationOutcome {
        let route = route.into();
        let Some(router) = self.router() else {
            return NavigationOutcome::Uninitialized;
        };
        let result = router.replace(&route).await;
        self.finish(route, result)
    }

    fn finish(&self, route: RouteLocation, result: RouterResult<()>) -> NavigationOutcome {
        match result {
            Ok(()) => {
                debug!("Navigated to '{}'", route.name);
                if let Some(sender) = &*self.events.lock() {
                    let _ = sender.send(ShellEvent::Navigated { route: route.name });
                }
                NavigationOutcome::Navigated
            }
            Err(e) => {
                warn!("Navigation failed: {}", e);
                NavigationOutcome::Failed(e)
            }
        }
    }
}

impl std::fmt::Debug for NavigationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationManager")
            .field("tabs", &self.tabs)
            .field("show_tab_bar", &self.show_tab_bar)
            .field("initialized", &self.router.read().is_some())
            .finish()
    }
}
