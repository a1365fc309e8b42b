//! Directory listings and the advisory "has unreconciled changes" signal.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use super::RemoteStore;
use crate::error::{AppError, Result};
use crate::tree::path;

/// Source of child listings for the tree.
#[async_trait]
pub trait ListingOracle: Send + Sync {
    /// Immediate child names of `path`; directories end in `/`. Missing is empty.
    async fn get_listing(&self, path: &str) -> Result<Vec<String>>;

    /// Whether the subtree at `path` has changes not yet reconciled.
    async fn has_diff(&self, path: &str) -> Result<bool>;

    /// Called after `path` was loaded successfully.
    fn reconciled(&self, _path: &str) {}

    /// Called when the store reports `path` as changed.
    fn record_change(&self, _path: &str) {}
}

/// Paths reported changed by a store watcher and not reloaded since.
#[derive(Debug, Clone, Default)]
pub struct DiffTracker {
    pending: Arc<Mutex<BTreeSet<String>>>,
}

impl DiffTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn mark(&self, path: &str) {
        self.lock().insert(path.to_string());
    }

    /// True if any pending change lies at or below `dir`.
    pub fn has_diff(&self, dir: &str) -> bool {
        self.lock()
            .range(dir.to_string()..)
            .next()
            .is_some_and(|p| path::is_self_or_descendant(p, dir))
    }

    /// Forget changes whose containing directory is `dir`.
    pub fn clear_children(&self, dir: &str) {
        self.lock()
            .retain(|p| p.as_str() == dir || path::parent_of(p) != Some(dir));
    }
}

/// Listings read from directory documents of a store.
pub struct StoreListing {
    store: Arc<dyn RemoteStore>,
    diffs: DiffTracker,
}

impl StoreListing {
    pub fn new(store: Arc<dyn RemoteStore>, diffs: DiffTracker) -> Self {
        Self { store, diffs }
    }

    /// Child names from a directory document, accepting the `items` envelope.
    pub fn names_from_document(dir: &str, value: &Value) -> Result<Vec<String>> {
        let object = value
            .as_object()
            .ok_or_else(|| AppError::MalformedListing(dir.to_string()))?;
        let items = match object.get("items") {
            Some(Value::Object(items)) if object.contains_key("@context") => items,
            _ => object,
        };
        Ok(items.keys().cloned().collect())
    }
}

#[async_trait]
impl ListingOracle for StoreListing {
    async fn get_listing(&self, dir: &str) -> Result<Vec<String>> {
        let Some(doc) = self.store.get(dir).await? else {
            return Ok(Vec::new());
        };
        let value = doc
            .body
            .as_json()
            .ok_or_else(|| AppError::MalformedListing(dir.to_string()))?;
        Self::names_from_document(dir, value)
    }

    async fn has_diff(&self, dir: &str) -> Result<bool> {
        Ok(self.diffs.has_diff(dir))
    }

    fn reconciled(&self, dir: &str) {
        self.diffs.clear_children(dir);
    }

    fn record_change(&self, path: &str) {
        self.diffs.mark(path);
    }
}
