//! Storage abstraction trait
//!
//! Every backend implements [`Storage`] so the replacement protocol, the
//! sweeper and the reconciler work against any object store.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use folio_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("List failed: {0}")]
    ListFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unknown storage bucket: {0}")]
    UnknownBucket(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Object store collaborator.
///
/// `put` has upsert semantics: it must succeed when an object already exists
/// at `key`, replacing it as a whole.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` at `key`, replacing any existing object
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> StorageResult<()>;

    /// Read the full object at `key`
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete every key in `keys`. Keys that do not exist are not an error.
    async fn delete(&self, keys: &[String]) -> StorageResult<()>;

    /// Publicly reachable URL for `key`
    fn public_url(&self, key: &str) -> String;

    /// All objects whose key starts with `prefix`
    async fn list(&self, prefix: &str) -> StorageResult<Vec<ObjectMeta>>;

    /// Name of the bucket this backend serves
    fn bucket(&self) -> &str;

    fn backend_type(&self) -> StorageBackend;
}
