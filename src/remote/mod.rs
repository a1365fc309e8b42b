//! Access to the remote key/hierarchy store.
//!
//! Every backend speaks the same small surface: read a document, write it
//! (optionally conditional on a revision), delete it. Directory paths read
//! back as JSON objects whose keys are the child names.

pub mod body;
pub mod http;
pub mod listing;
pub mod local;
#[cfg(test)]
pub mod memory;
pub mod watcher;

use async_trait::async_trait;

use crate::error::Result;

pub use body::{Body, Payload};

/// A document read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub body: Body,
    /// Opaque revision token (HTTP ETag), when the backend provides one.
    pub revision: Option<String>,
}

/// Authenticated read/write/delete against a remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read `path`. A missing document is `Ok(None)`, not an error.
    async fn get(&self, path: &str) -> Result<Option<Document>>;

    /// Write `body` to `path`, returning the new revision.
    ///
    /// With `if_match`, the write only succeeds while the stored revision
    /// still equals it; otherwise it fails with `AppError::Conflict`.
    async fn put(&self, path: &str, body: &Body, if_match: Option<&str>)
        -> Result<Option<String>>;

    /// Remove `path`. Removing a missing document succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Write `body`, or delete when `body` is `None`.
    async fn set(&self, path: &str, body: Option<&Body>) -> Result<()> {
        match body {
            Some(body) => self.put(path, body, None).await.map(|_| ()),
            None => self.delete(path).await,
        }
    }
}
