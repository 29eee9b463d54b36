//! Media delivery with handle reuse
//!
//! Once a content key has been uploaded through the transport, the handle the
//! platform assigned to it is remembered for the life of the process and all
//! later deliveries of that key reuse it instead of fetching the bytes again.

use crate::content::{ContentError, ContentResolver};
use crate::transport::{
    ChatTransport, DeliveryHandle, MediaKind, MediaSource, ReplyKeyboard, TransportError,
};
use moka::future::Cache;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while delivering media
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Resolving the content failed
    #[error(transparent)]
    Content(#[from] ContentError),
    /// Sending through the transport failed
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Failure of a concurrent upload of the same key that this call waited on
    #[error("{0}")]
    Shared(Arc<DeliveryError>),
}

impl DeliveryError {
    /// Whether the failure is a missing object in the store
    #[must_use]
    pub fn is_content_absent(&self) -> bool {
        match self {
            Self::Content(ContentError::ContentAbsent { .. }) => true,
            Self::Shared(inner) => inner.is_content_absent(),
            _ => false,
        }
    }

    fn from_shared(err: Arc<Self>) -> Self {
        Arc::try_unwrap(err).unwrap_or_else(Self::Shared)
    }
}

/// Process-wide content key -> delivery handle map.
///
/// Entries are never evicted. Concurrent first requests for one key are
/// collapsed so that only one of them uploads.
#[derive(Clone)]
pub struct DeliveryHandleCache {
    handles: Cache<String, DeliveryHandle>,
}

impl Default for DeliveryHandleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DeliveryHandleCache {
    /// Create an empty, unbounded cache
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Cache::builder().build(),
        }
    }

    /// Cached handle for `key`
    pub async fn get(&self, key: &str) -> Option<DeliveryHandle> {
        self.handles.get(key).await
    }

    /// Return the cached handle or run `init` once for all concurrent callers.
    ///
    /// Errors are not cached; the next call runs `init` again.
    ///
    /// # Errors
    ///
    /// Returns the error produced by whichever `init` ran.
    pub async fn get_or_try_insert_with<F, E>(
        &self,
        key: &str,
        init: F,
    ) -> Result<DeliveryHandle, Arc<E>>
    where
        F: Future<Output = Result<DeliveryHandle, E>>,
        E: Send + Sync + 'static,
    {
        self.handles.try_get_with(key.to_string(), init).await
    }

    /// Number of cached handles
    pub async fn len(&self) -> u64 {
        self.handles.run_pending_tasks().await;
        self.handles.entry_count()
    }

    /// Whether no handle has been cached yet
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Delivers photo and voice content, fetching each key at most once
pub struct MediaDelivery {
    resolver: ContentResolver,
    handles: DeliveryHandleCache,
}

impl MediaDelivery {
    /// Combine a resolver with a handle cache
    #[must_use]
    pub const fn new(resolver: ContentResolver, handles: DeliveryHandleCache) -> Self {
        Self { resolver, handles }
    }

    /// Handle cache shared by all deliveries
    #[must_use]
    pub const fn handles(&self) -> &DeliveryHandleCache {
        &self.handles
    }

    /// Send the media stored under `key` to `chat_id`.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError` if the content cannot be resolved or sent.
    pub async fn deliver(
        &self,
        transport: &dyn ChatTransport,
        chat_id: i64,
        kind: MediaKind,
        key: &str,
        keyboard: &ReplyKeyboard,
    ) -> Result<DeliveryHandle, DeliveryError> {
        if let Some(handle) = self.handles.get(key).await {
            debug!(key = %key, kind = %kind, "Delivery handle cache hit");
            return self
                .send_handle(transport, chat_id, kind, handle, keyboard)
                .await;
        }

        let uploaded_here = AtomicBool::new(false);
        let handle = self
            .handles
            .get_or_try_insert_with(key, async {
                uploaded_here.store(true, Ordering::Relaxed);
                debug!(key = %key, kind = %kind, "Delivery handle cache miss, uploading");
                let payload = self.resolver.resolve(key).await?;
                let handle = transport
                    .send_media(chat_id, kind, MediaSource::Upload(payload), keyboard)
                    .await?;
                Ok::<_, DeliveryError>(handle)
            })
            .await
            .map_err(DeliveryError::from_shared)?;

        if uploaded_here.load(Ordering::Relaxed) {
            return Ok(handle);
        }

        // Another chat uploaded this key while we waited
        self.send_handle(transport, chat_id, kind, handle, keyboard)
            .await
    }

    /// Refuse new uploads; used on shutdown
    pub fn close(&self) {
        self.resolver.close();
    }

    async fn send_handle(
        &self,
        transport: &dyn ChatTransport,
        chat_id: i64,
        kind: MediaKind,
        handle: DeliveryHandle,
        keyboard: &ReplyKeyboard,
    ) -> Result<DeliveryHandle, DeliveryError> {
        transport
            .send_media(chat_id, kind, MediaSource::Handle(handle.clone()), keyboard)
            .await?;
        Ok(handle)
    }
}
