//! Registry of job bodies.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use jobkeeper_protocols::runnable::Runnable;

/// Maps a stable registry key to a job body.
///
/// Populated by collaborators once at process startup; purely in-memory
/// and rebuilt on every start. Re-registering a key replaces the previous
/// entry (deliberate, used for hot-swapping bodies in tests).
pub struct RunnableRegistry {
    runnables: DashMap<String, Arc<dyn Runnable>>,
}

impl RunnableRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            runnables: DashMap::new(),
        }
    }

    /// Register a runnable under a key. Last registration wins.
    pub fn register(&self, key: impl Into<String>, runnable: Arc<dyn Runnable>) {
        let key = key.into();
        if self.runnables.insert(key.clone(), runnable).is_some() {
            debug!(key = %key, "runnable re-registered, previous entry replaced");
        }
    }

    /// Look up a runnable by key.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Runnable>> {
        self.runnables.get(key).map(|r| r.clone())
    }

    /// Whether a runnable is registered under this key.
    pub fn contains(&self, key: &str) -> bool {
        self.runnables.contains_key(key)
    }

    /// All registered keys.
    pub fn keys(&self) -> Vec<String> {
        self.runnables.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of registered runnables.
    pub fn len(&self) -> usize {
        self.runnables.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.runnables.is_empty()
    }
}

impl Default for RunnableRegistry {
    fn default() -> Self {
        Self::new()
    }
}
