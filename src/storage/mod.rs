//! Namespaced key-value storage with optional expiry
//!
//! Values are wrapped in a small envelope before they reach the backend:
//!
//! ```text
//! {"v": <value>, "e": <ttl seconds or -1>, "t": <unix seconds when saved>}
//! ```
//!
//! Entries whose envelope is unreadable or expired are removed on load.

mod store;

pub use store::{FileStore, MemoryStore};

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// String-keyed backend holding serialized values
pub trait KeyValueStore: Send + Sync {
    fn get_raw(&self, key: &str) -> StorageResult<Option<String>>;
    fn set_raw(&self, key: &str, value: String) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
    fn clear(&self) -> StorageResult<()>;
}

/// Storage handle that prefixes every key with a namespace
#[derive(Clone)]
pub struct NamespacedStorage {
    namespace: String,
    store: Arc<dyn KeyValueStore>,
}

impl NamespacedStorage {
    pub fn new(namespace: impl Into<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            namespace: namespace.into(),
            store,
        }
    }

    /// Namespaced storage over a fresh [`MemoryStore`]
    pub fn in_memory(namespace: impl Into<String>) -> Self {
        Self::new(namespace, Arc::new(MemoryStore::new()))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    /// Store `value` under `key`, expiring after `ttl` when given.
    /// A zero ttl never expires.
    pub fn save<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> StorageResult<()> {
        let expires = match ttl {
            Some(ttl) if ttl.as_secs() > 0 => json!(ttl.as_secs()),
            _ => json!(-1),
        };
        let envelope = json!({
            "v": serde_json::to_value(value)?,
            "e": expires,
            "t": Utc::now().timestamp(),
        });
        self.store.set_raw(&self.key(key), envelope.to_string())
    }

    /// Value under `key`, or `None` when absent, unreadable or expired
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.load_at(key, Utc::now().timestamp())
    }

    fn load_at<T: DeserializeOwned>(&self, key: &str, now: i64) -> Option<T> {
        let full_key = self.key(key);
        let raw = match self.store.get_raw(&full_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read '{}': {}", full_key, e);
                return None;
            }
        };

        match Self::unwrap_envelope(&raw, now) {
            Some(value) => match serde_json::from_value(value) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Stored value for '{}' has unexpected shape: {}", full_key, e);
                    None
                }
            },
            None => {
                debug!("Dropping stale or malformed entry '{}'", full_key);
                self.discard(&full_key);
                None
            }
        }
    }

    /// Payload of a live envelope
    fn unwrap_envelope(raw: &str, now: i64) -> Option<Value> {
        let mut envelope: Value = serde_json::from_str(raw).ok()?;
        let expires = envelope.get("e").and_then(Value::as_f64).filter(|e| *e != 0.0)?;
        let saved_at = envelope.get("t").and_then(Value::as_f64).filter(|t| *t != 0.0)?;

        if expires != -1.0 && saved_at + expires <= now as f64 {
            return None;
        }
        Some(envelope.get_mut("v").map(Value::take).unwrap_or(Value::Null))
    }

    /// Store `value` as plain JSON under the exact key `key`
    pub fn custom_save<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        self.store.set_raw(key, serde_json::to_string(value)?)
    }

    /// Plain JSON value under the exact key `key`
    pub fn custom_load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get_raw(key).ok().flatten()?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Can't parse '{}': {}", key, e);
                None
            }
        }
    }

    pub fn clear(&self, key: &str) -> StorageResult<()> {
        self.store.remove(&self.key(key))
    }

    /// Wipe the whole backend, other namespaces included
    pub fn clear_all(&self) -> StorageResult<()> {
        self.store.clear()
    }

    fn discard(&self, full_key: &str) {
        if let Err(e) = self.store.remove(full_key) {
            warn!("Failed to remove '{}': {}", full_key, e);
        }
    }
}

impl std::fmt::Debug for NamespacedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedStorage")
            .field("namespace", &self.namespace)
            .finish()
    }
}
