//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use skatehub_core::MediaError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to set public-read access: {0}")]
    AccessPolicyFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for MediaError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(key) => MediaError::DuplicateKey(key),
            StorageError::ConfigError(msg) => MediaError::Internal(msg),
            other => MediaError::StorageUpload(other.to_string()),
        }
    }
}

/// One object found by [`Storage::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Storage key, `{key}.{extension}` for media objects
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) must implement this trait.
/// The media pipeline works against `Arc<dyn Storage>` so the configured
/// client is built once and injected.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `storage_key`.
    ///
    /// Create-only: if an object already exists at `storage_key` the write is
    /// refused with [`StorageError::AlreadyExists`] and the existing object is
    /// left untouched.
    async fn put_object(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Make an existing object publicly readable.
    async fn make_public(&self, storage_key: &str) -> StorageResult<()>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// List stored objects, optionally restricted to keys starting with `prefix`.
    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<StoredObject>>;

    /// Root URL objects are served from, without a trailing slash
    fn base_url(&self) -> &str;

    /// Public URL for a storage key: `{base_url}/{storage_key}`
    fn public_url(&self, storage_key: &str) -> String {
        format!("{}/{}", self.base_url().trim_end_matches('/'), storage_key)
    }

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject keys that could escape the store's namespace.
pub(crate) fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.contains("..") || storage_key.starts_with('/') || storage_key.contains('\\') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
