//! In-process store: documents in a map, directories derived from key prefixes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{Body, Document, RemoteStore};
use crate::error::{AppError, Result};
use crate::tree::path;

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<String, (Body, u64)>,
    next_revision: u64,
    /// Paths whose reads fail with a transport error.
    failing: HashSet<String>,
    /// Writes from "another device", applied right before our next put to the path.
    concurrent: HashMap<String, Body>,
    puts: usize,
}

impl Inner {
    fn store(&mut self, path: &str, body: Body) -> u64 {
        self.next_revision += 1;
        let revision = self.next_revision;
        self.documents.insert(path.to_string(), (body, revision));
        revision
    }
}

/// A `RemoteStore` that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a document without going through the async API.
    pub fn insert(&self, path: &str, body: Body) {
        self.lock().store(path, body);
    }

    /// Make reads of `path` fail (or succeed again).
    pub fn set_failing(&self, path: &str, failing: bool) {
        let mut inner = self.lock();
        if failing {
            inner.failing.insert(path.to_string());
        } else {
            inner.failing.remove(path);
        }
    }

    /// Queue a write by another device that lands just before our next put to `path`.
    pub fn simulate_concurrent_write(&self, path: &str, body: Body) {
        self.lock().concurrent.insert(path.to_string(), body);
    }

    /// Current body at `path`.
    pub fn body(&self, path: &str) -> Option<Body> {
        self.lock().documents.get(path).map(|(body, _)| body.clone())
    }

    /// Number of puts served so far.
    pub fn put_count(&self) -> usize {
        self.lock().puts
    }

    fn listing(inner: &Inner, dir: &str) -> Option<Value> {
        let mut items = Map::new();
        for (key, (_, revision)) in inner.documents.range(dir.to_string()..) {
            let Some(rest) = key.strip_prefix(dir) else {
                break;
            };
            let item = match rest.find('/') {
                Some(idx) => &rest[..=idx],
                None => rest,
            };
            if !item.is_empty() {
                items.insert(item.to_string(), Value::from(*revision));
            }
        }
        if items.is_empty() {
            None
        } else {
            Some(Value::Object(items))
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, path: &str) -> Result<Option<Document>> {
        let inner = self.lock();
        if inner.failing.contains(path) {
            return Err(AppError::Transport(format!("GET {} failed", path)));
        }
        if path::is_directory(path) {
            return Ok(Self::listing(&inner, path).map(|value| Document {
                body: Body::json(value),
                revision: None,
            }));
        }
        Ok(inner.documents.get(path).map(|(body, revision)| Document {
            body: body.clone(),
            revision: Some(revision.to_string()),
        }))
    }

    async fn put(
        &self,
        path: &str,
        body: &Body,
        if_match: Option<&str>,
    ) -> Result<Option<String>> {
        let mut inner = self.lock();
        if let Some(other) = inner.concurrent.remove(path) {
            inner.store(path, other);
        }
        if let Some(expected) = if_match {
            let current = inner.documents.get(path).map(|(_, rev)| rev.to_string());
            if current.as_deref() != Some(expected) {
                return Err(AppError::Conflict(path.to_string()));
            }
        }
        inner.puts += 1;
        let revision = inner.store(path, body.clone());
        Ok(Some(revision.to_string()))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.lock().documents.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn directory_listing_derived_from_keys() {
        let store = MemoryStore::new();
        store.insert("/docs/a.txt", Body::text("a", "text/plain"));
        store.insert("/docs/sub/b.txt", Body::text("b", "text/plain"));
        store.insert("/notes.txt", Body::text("n", "text/plain"));

        let root = store.get("/").await.unwrap().unwrap();
        let keys: Vec<&String> = root.body.as_json().unwrap().as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["docs/", "notes.txt"]);

        let docs = store.get("/docs/").await.unwrap().unwrap();
        let keys: Vec<&String> = docs.body.as_json().unwrap().as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a.txt", "sub/"]);
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let store = MemoryStore::new();
        assert!(store.get("/nope").await.unwrap().is_none());
        assert!(store.get("/empty/").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn conditional_put_detects_stale_revision() {
        let store = MemoryStore::new();
        let rev = store.put("/doc", &Body::json(json!({})), None).await.unwrap();
        store.put("/doc", &Body::json(json!({"x": 1})), None).await.unwrap();
        let err = store
            .put("/doc", &Body::json(json!({"y": 1})), rev.as_deref())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn set_none_deletes() {
        let store = MemoryStore::new();
        store.set("/doc", Some(&Body::json(json!(1)))).await.unwrap();
        assert!(store.body("/doc").is_some());
        store.set("/doc", None).await.unwrap();
        assert!(store.body("/doc").is_none());
    }

    #[tokio::test]
    async fn failing_path_reports_transport_error() {
        let store = MemoryStore::new();
        store.set_failing("/docs/", true);
        assert!(matches!(
            store.get("/docs/").await,
            Err(AppError::Transport(_))
        ));
    }
}
