//! The persisted set of open directories.
//!
//! Stored as one JSON object `{ "<path>": true, ... }` at [`OPEN_SET_PATH`].
//! Absent keys (or an absent document) mean closed. Writes are conditional on
//! the revision that was read; when another device wrote in between, the local
//! version is written over it. There is no merge.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::remote::{Body, RemoteStore};
use crate::tree::path;

/// Well-known location of the open-set document.
pub const OPEN_SET_PATH: &str = "/.open-trees";

/// Directory paths currently open.
///
/// Entries that are not understood (relative keys, values other than `true`)
/// are carried through untouched so another client's data survives our writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenSet {
    paths: BTreeSet<String>,
    foreign: Map<String, Value>,
}

impl OpenSet {
    /// Read a stored document, ignoring keys that are not absolute paths.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            warn!("open-set document is not a JSON object; treating as empty");
            return Self::default();
        };
        let mut set = Self::default();
        for (key, open) in object {
            if path::validate(key).is_err() {
                warn!(key = key.as_str(), "ignoring malformed open-set key");
            } else if open.as_bool() == Some(true) {
                set.paths.insert(key.clone());
                continue;
            }
            set.foreign.insert(key.clone(), open.clone());
        }
        set
    }

    pub fn to_value(&self) -> Value {
        let mut object = self.foreign.clone();
        for p in &self.paths {
            object.insert(p.clone(), Value::Bool(true));
        }
        Value::Object(object)
    }

    /// Mark `dir` open. Returns false if it already was.
    pub fn insert(&mut self, dir: &str) -> bool {
        self.foreign.remove(dir);
        self.paths.insert(dir.to_string())
    }

    /// Drop `dir` and every path below it. Returns how many were removed.
    ///
    /// The public tree is its own entry point: closing the root leaves it alone.
    pub fn remove_subtree(&mut self, dir: &str) -> usize {
        let owned = |p: &str| {
            path::is_self_or_descendant(p, dir)
                && path::entry_point_for(p) == path::entry_point_for(dir)
        };
        let before = self.paths.len() + self.foreign.len();
        self.paths.retain(|p| !owned(p));
        self.foreign
            .retain(|key, _| path::validate(key).is_err() || !owned(key));
        before - self.paths.len() - self.foreign.len()
    }

    /// Open paths in sorted order (ancestors before their descendants).
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Reads and writes the open-set document in a store.
pub struct OpenSetStore {
    store: Arc<dyn RemoteStore>,
    path: String,
}

impl OpenSetStore {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            path: OPEN_SET_PATH.to_string(),
        }
    }

    async fn read(&self) -> Result<(OpenSet, Option<String>)> {
        match self.store.get(&self.path).await? {
            Some(doc) => {
                let set = match doc.body.as_json() {
                    Some(value) => OpenSet::from_value(value),
                    None => {
                        warn!(path = self.path.as_str(), "open-set document is not JSON");
                        OpenSet::default()
                    }
                };
                Ok((set, doc.revision))
            }
            None => Ok((OpenSet::default(), None)),
        }
    }

    /// Current open-set; an absent document is an empty set.
    pub async fn load(&self) -> Result<OpenSet> {
        Ok(self.read().await?.0)
    }

    /// Read-modify-write: open `dir`, or close it together with its descendants.
    pub async fn store_opened(&self, dir: &str, open: bool) -> Result<()> {
        let (mut set, revision) = self.read().await?;
        let changed = if open {
            set.insert(dir)
        } else {
            set.remove_subtree(dir) > 0
        };
        if !changed {
            debug!(dir, open, "open-set unchanged");
            return Ok(());
        }
        self.write(&set, revision.as_deref()).await
    }

    async fn write(&self, set: &OpenSet, revision: Option<&str>) -> Result<()> {
        let body = Body::json(set.to_value());
        match self.store.put(&self.path, &body, revision).await {
            Ok(_) => Ok(()),
            Err(AppError::Conflict(_)) => self.resolve_conflict(&body).await,
            Err(e) => Err(e),
        }
    }

    /// The local version always wins over the displaced remote one.
    async fn resolve_conflict(&self, local: &Body) -> Result<()> {
        warn!(
            path = self.path.as_str(),
            "open-set changed remotely; keeping local version"
        );
        self.store.set(&self.path, Some(local)).await
    }
}
