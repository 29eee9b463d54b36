//! Configuration and settings management
//!
//! Scalar settings (tokens, storage credentials, fixed messages) are layered
//! from config files and the environment. The node catalog lives in its own
//! YAML file so that question and node keys are kept verbatim.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Maximum number of object store fetches in flight across the process.
pub const STORAGE_FETCH_CONCURRENCY: usize = 50;

/// Mime type reported when the object store does not know the content type.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Application settings loaded from config files and environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub tg_token: String,
    /// Chat that receives code redemption audit events
    pub tg_admin_chat: i64,

    /// MinIO / S3 host, with or without scheme
    pub minio_host: String,
    /// Use https when the host has no scheme
    #[serde(default)]
    pub minio_secure: bool,
    /// Bucket holding photo and voice content
    pub minio_bucket: String,
    /// Access key for the object store
    pub minio_access_key: String,
    /// Secret key for the object store
    pub minio_secret_key: String,
    /// Region passed to the S3 client
    #[serde(default = "default_minio_region")]
    pub minio_region: String,

    /// Bot display name, synced on startup
    pub name: String,

    /// Welcome message for `/start`
    pub start_message: String,
    /// Fallback reply for anything the current state does not understand
    pub default_message: String,
    /// Reply sent when handling a message fails
    pub error_message: String,

    /// Label of the back button (global escape token)
    pub back_button: String,
    /// Reply sent together with the main menu after going back
    pub back_message: String,

    /// Label of the help button
    pub help_button: String,
    /// Prompt sent when entering the personal questions mode
    pub help_message: String,

    /// Path to the YAML file with nodes and personal answers
    #[serde(default = "default_nodes_file")]
    pub nodes_file: String,
}

fn default_minio_region() -> String {
    "us-east-1".to_string()
}

fn default_nodes_file() -> String {
    "config/nodes.yaml".to_string()
}

impl Settings {
    /// Create new settings by loading from files and environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required key is missing or malformed.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Endpoint URL for the S3 client.
    ///
    /// Hosts configured without a scheme get one based on `minio_secure`.
    #[must_use]
    pub fn minio_endpoint_url(&self) -> String {
        if self.minio_host.starts_with("http://") || self.minio_host.starts_with("https://") {
            return self.minio_host.clone();
        }
        let scheme = if self.minio_secure { "https" } else { "http" };
        format!("{scheme}://{}", self.minio_host)
    }
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if one of the present sources cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    Config::builder()
        .add_source(File::with_name("config/config").required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg. `TG_ADMIN_CHAT=-100123 ./node-gate-bot`
        .add_source(
            Environment::default()
                .separator("__")
                .try_parsing(true)
                .ignore_empty(true),
        )
        .build()
}

/// Kind of content a node delivers
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// `content` is sent as a text message
    Text,
    /// `content` is an object key of a photo
    Photo,
    /// `content` is an object key of a voice message
    Voice,
}

/// Node record as written in the nodes file
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NodeRecord {
    /// Button label and lookup key
    pub name: String,
    /// Secret code, absent for open nodes
    #[serde(default)]
    pub code: Option<String>,
    /// Inline text or object key, depending on `type`
    pub content: String,
    /// Content kind
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Prompt shown while waiting for the code
    pub message: String,
}

/// Errors while reading the nodes file
#[derive(Error, Debug)]
pub enum CatalogFileError {
    /// The file could not be read
    #[error("Failed to read nodes file {path}: {source}")]
    Io {
        /// Path that was read
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The file is not valid YAML for the catalog shape
    #[error("Failed to parse nodes file {path}: {source}")]
    Yaml {
        /// Path that was parsed
        path: String,
        /// Underlying YAML error
        source: serde_yaml::Error,
    },
}

/// Contents of the nodes file
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CatalogFile {
    /// Ordered node records; order defines the keyboard layout
    #[serde(default)]
    pub node_codes: Vec<NodeRecord>,
    /// Question to answer mapping for the personal mode
    #[serde(default)]
    pub personal: HashMap<String, String>,
}

impl CatalogFile {
    /// Parse the catalog from YAML text. An empty document yields an empty catalog.
    ///
    /// # Errors
    ///
    /// Returns a `serde_yaml::Error` if the document does not match the catalog shape.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Read and parse the catalog from a file.
    ///
    /// # Errors
    ///
    /// Returns a `CatalogFileError` if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogFileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| CatalogFileError::Yaml {
            path: path.display().to_string(),
            source,
        })
    }
}
