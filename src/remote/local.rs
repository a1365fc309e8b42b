//! A directory on disk served as a store. Useful offline and with the watcher.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;

use super::body::{DEFAULT_CONTENT_TYPE, JSON_MIME};
use super::{Body, Document, Payload, RemoteStore};
use crate::error::{AppError, Result};
use crate::tree::path;

/// Store backed by the filesystem below `root`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Filesystem location for a store path. `..` segments are refused.
    fn fs_path(&self, store_path: &str) -> Result<PathBuf> {
        path::validate(store_path)?;
        let parts = path::segments(store_path);
        if parts.iter().any(|p| *p == "..") {
            return Err(AppError::InvalidPath(store_path.to_string()));
        }
        Ok(parts.iter().fold(self.root.clone(), |acc, p| acc.join(p)))
    }

    async fn revision_of(fs_path: &Path) -> Option<String> {
        let meta = fs::metadata(fs_path).await.ok()?;
        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Some(format!("{:x}-{:x}", modified, meta.len()))
    }

    /// Bodies carry no stored MIME type on disk; sniff one.
    fn sniff(bytes: Vec<u8>) -> Body {
        match String::from_utf8(bytes) {
            Ok(text) => match serde_json::from_str::<Value>(&text) {
                Ok(value) if value.is_object() || value.is_array() => Body::json(value),
                _ => Body::text(text, "text/plain"),
            },
            Err(err) => Body::binary(err.into_bytes(), DEFAULT_CONTENT_TYPE),
        }
    }

    async fn listing(dir: &Path) -> Result<Option<Value>> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut items = Map::new();
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            items.insert(name, Value::Bool(true));
        }
        Ok(Some(Value::Object(items)))
    }
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn get(&self, store_path: &str) -> Result<Option<Document>> {
        let fs_path = self.fs_path(store_path)?;
        if path::is_directory(store_path) {
            return Ok(Self::listing(&fs_path).await?.map(|value| Document {
                body: Body::json(value),
                revision: None,
            }));
        }
        let bytes = match fs::read(&fs_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Document {
            body: Self::sniff(bytes),
            revision: Self::revision_of(&fs_path).await,
        }))
    }

    async fn put(
        &self,
        store_path: &str,
        body: &Body,
        if_match: Option<&str>,
    ) -> Result<Option<String>> {
        if path::is_directory(store_path) {
            return Err(AppError::InvalidPath(store_path.to_string()));
        }
        let fs_path = self.fs_path(store_path)?;
        if let Some(expected) = if_match {
            if Self::revision_of(&fs_path).await.as_deref() != Some(expected) {
                return Err(AppError::Conflict(store_path.to_string()));
            }
        }
        if let Some(parent) = fs_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let bytes = match (&body.payload, body.mime_type.as_str()) {
            (Payload::Json(value), JSON_MIME) => serde_json::to_vec_pretty(value)?,
            _ => body.to_bytes(),
        };
        fs::write(&fs_path, bytes).await?;
        Ok(Self::revision_of(&fs_path).await)
    }

    async fn delete(&self, store_path: &str) -> Result<()> {
        let fs_path = self.fs_path(store_path)?;
        match fs::remove_file(&fs_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
