//! Object store access
//!
//! Provides read access to node media kept in MinIO / AWS S3.

use crate::config::Settings;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object under the requested key
    #[error("Object {key} not found in bucket {bucket}")]
    NotFound {
        /// Bucket that was queried
        bucket: String,
        /// Missing key
        key: String,
    },
    /// Error retrieving object from S3
    #[error("S3 Get error: {0}")]
    S3Get(Box<SdkError<GetObjectError>>),
    /// Error reading the object body
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Raw object as returned by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object body
    pub bytes: Bytes,
    /// Content type reported by the store, if any
    pub content_type: Option<String>,
}

/// Interface for object store backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch a whole object.
    ///
    /// Must return `StorageError::NotFound` when the key does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError>;
}

/// S3-compatible object store (MinIO in production)
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Create a client for the configured MinIO / S3 endpoint
    pub async fn new(settings: &Settings) -> Self {
        let credentials = Credentials::new(
            &settings.minio_access_key,
            &settings.minio_secret_key,
            None,
            None,
            "minio-storage",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(settings.minio_region.clone()))
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .endpoint_url(settings.minio_endpoint_url())
            // MinIO serves buckets on the path, not as subdomains
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject, StorageError> {
        debug!("Downloading {} from bucket {}", key, bucket);

        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let content_type = output.content_type().map(str::to_string);
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
                    .into_bytes();
                debug!("Done downloading {} from bucket {}", key, bucket);
                Ok(StoredObject {
                    bytes,
                    content_type,
                })
            }
            Err(SdkError::ServiceError(err)) if err.err().is_no_such_key() => {
                debug!("File {} not found in bucket {}", key, bucket);
                Err(StorageError::NotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
            }
            Err(e) => Err(StorageError::S3Get(Box::new(e))),
        }
    }
}
