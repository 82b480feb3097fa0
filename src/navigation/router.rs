//! Router abstraction and an in-memory history implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("Unknown route '{0}'")]
    UnknownRoute(String),
}

pub type RouterResult<T> = Result<T, RouterError>;

/// A named route plus its query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteLocation {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query: BTreeMap<String, String>,
}

impl RouteLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: BTreeMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

impl From<&str> for RouteLocation {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Page router the navigation layer drives
#[async_trait]
pub trait Router: Send + Sync {
    /// Open `route` on top of the history
    async fn push(&self, route: &RouteLocation) -> RouterResult<()>;

    /// Swap the current entry for `route`
    async fn replace(&self, route: &RouteLocation) -> RouterResult<()>;

    /// Pop one entry; false when there is nothing to go back to
    fn back(&self) -> bool;

    fn current(&self) -> Option<RouteLocation>;
}

/// History stack over a fixed set of route names
#[derive(Debug)]
pub struct MemoryRouter {
    known: HashSet<String>,
    history: Mutex<Vec<RouteLocation>>,
}

impl MemoryRouter {
    pub fn new<I, S>(routes: I, initial: RouteLocation) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut known: HashSet<String> = routes.into_iter().map(Into::into).collect();
        known.insert(initial.name.clone());
        Self {
            known,
            history: Mutex::new(vec![initial]),
        }
    }

    pub fn depth(&self) -> usize {
        self.history.lock().len()
    }

    fn check(&self, route: &RouteLocation) -> RouterResult<()> {
        if self.known.contains(&route.name) {
            Ok(())
        } else {
            Err(RouterError::UnknownRoute(route.name.clone()))
        }
    }
}

#[async_trait]
impl Router for MemoryRouter {
    async fn push(&self, route: &RouteLocation) -> RouterResult<()> {
        self.check(route)?;
        self.history.lock().push(route.clone());
        Ok(())
    }

    async fn replace(&self, route: &RouteLocation) -> RouterResult<()> {
        self.check(route)?;
        let mut history = self.history.lock();
        history.pop();
        history.push(route.clone());
        Ok(())
    }

    fn back(&self) -> bool {
        let mut history = self.history.lock();
        if history.len() > 1 {
            history.pop();
            true
        } else {
            false
        }
    }

    fn current(&self) -> Option<RouteLocation> {
        self.history.lock().last().cloned()
    }
}
