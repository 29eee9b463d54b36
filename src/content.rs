//! Content resolution
//!
//! Turns a content key into bytes and a mime type, limiting how many fetches
//! hit the object store at the same time.

use crate::config::{DEFAULT_MIME_TYPE, STORAGE_FETCH_CONCURRENCY};
use crate::storage::{ObjectStore, StorageError};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

/// Errors returned by [`ContentResolver::resolve`]
#[derive(Error, Debug)]
pub enum ContentError {
    /// The store has no object under the key
    #[error("Content {key} is absent from the store")]
    ContentAbsent {
        /// Requested content key
        key: String,
    },
    /// Any other store failure
    #[error(transparent)]
    Storage(StorageError),
    /// The resolver was closed for shutdown
    #[error("Content fetch gate is closed")]
    GateClosed,
}

/// Deliverable content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPayload {
    /// Content key the payload was fetched for
    pub key: String,
    /// Raw bytes
    pub bytes: Bytes,
    /// Mime type, defaulting to `application/octet-stream`
    pub mime_type: String,
}

/// Resolves content keys against one bucket through a global fetch gate
pub struct ContentResolver {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    gate: Semaphore,
}

impl ContentResolver {
    /// Resolver with the default concurrency cap
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self::with_concurrency(store, bucket, STORAGE_FETCH_CONCURRENCY)
    }

    /// Resolver with a custom concurrency cap
    #[must_use]
    pub fn with_concurrency(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        max_in_flight: usize,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            gate: Semaphore::new(max_in_flight),
        }
    }

    /// Fetch the content stored under `key`.
    ///
    /// Waits without timeout while all fetch slots are taken.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::ContentAbsent` if the key does not exist and
    /// `ContentError::Storage` for any other store failure.
    pub async fn resolve(&self, key: &str) -> Result<ContentPayload, ContentError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| ContentError::GateClosed)?;

        let object = self
            .store
            .get_object(&self.bucket, key)
            .await
            .map_err(|e| match e {
                StorageError::NotFound { .. } => ContentError::ContentAbsent {
                    key: key.to_string(),
                },
                other => ContentError::Storage(other),
            })?;

        let mime_type = object
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

        debug!(key = %key, mime_type = %mime_type, size = object.bytes.len(), "Resolved content");

        Ok(ContentPayload {
            key: key.to_string(),
            bytes: object.bytes,
            mime_type,
        })
    }

    /// Stop accepting fetches. Callers waiting for a slot and all later
    /// calls fail with `ContentError::GateClosed`; running fetches finish.
    pub fn close(&self) {
        self.gate.close();
    }

    /// Number of fetch slots currently free
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.gate.available_permits()
    }
}
