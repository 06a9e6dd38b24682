//! Object store uploader
//!
//! Turns a byte buffer into a publicly readable object: a create-only put
//! followed by the public-read step, each bounded by a timeout. An object that
//! was written but could not be made public is removed again, so a successful
//! return always means the object is readable at the returned URL.

use crate::traits::Storage;
use bytes::Bytes;
use skatehub_core::{MediaError, MediaResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone)]
pub struct ObjectUploader {
    storage: Arc<dyn Storage>,
    timeout: Duration,
}

impl ObjectUploader {
    pub fn new(storage: Arc<dyn Storage>, timeout: Duration) -> Self {
        Self { storage, timeout }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn base_url(&self) -> &str {
        self.storage.base_url()
    }

    /// Upload `data` under `storage_key` and return its public URL.
    ///
    /// Fails with `DuplicateKey` if the key is already taken in the store and
    /// with `StorageUpload` for every other store failure, including timeouts.
    #[tracing::instrument(skip(self, data), fields(key = %storage_key, size_bytes = data.len()))]
    pub async fn upload(
        &self,
        data: Bytes,
        storage_key: &str,
        content_type: &str,
    ) -> MediaResult<String> {
        let start = std::time::Instant::now();

        match timeout(
            self.timeout,
            self.storage.put_object(storage_key, data, content_type),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    key = %storage_key,
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Upload timed out"
                );
                return Err(MediaError::StorageUpload(format!(
                    "upload of {} timed out after {:?}",
                    storage_key, self.timeout
                )));
            }
        }

        let acl_result = match timeout(self.timeout, self.storage.make_public(storage_key)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.timeout)),
        };

        if let Err(reason) = acl_result {
            tracing::error!(
                key = %storage_key,
                error = %reason,
                "Failed to make object public, removing it"
            );
            if let Err(e) = self.storage.delete(storage_key).await {
                tracing::warn!(
                    key = %storage_key,
                    error = %e,
                    "Failed to remove private object; it will be reported as an orphan"
                );
            }
            return Err(MediaError::StorageUpload(format!(
                "failed to make {} public: {}",
                storage_key, reason
            )));
        }

        let url = self.storage.public_url(storage_key);

        tracing::info!(
            key = %storage_key,
            url = %url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object uploaded"
        );

        Ok(url)
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use crate::traits::{StorageError, StorageResult, StoredObject};
    use crate::{LocalStorage, StorageBackend};
    use async_trait::async_trait;

    /// Wraps a real backend and fails or stalls selected steps.
    struct FaultyStorage {
        inner: LocalStorage,
        fail_public: bool,
        stall_put: bool,
    }

    #[async_trait]
    impl Storage for FaultyStorage {
        async fn put_object(&self, key: &str, data: Bytes, ct: &str) -> StorageResult<()> {
            if self.stall_put {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.inner.put_object(key, data, ct).await
        }

        async fn make_public(&self, key: &str) -> StorageResult<()> {
            if self.fail_public {
                return Err(StorageError::AccessPolicyFailed("access denied".to_string()));
            }
            self.inner.make_public(key).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.inner.delete(key).await
        }

        async fn exists(&self, key: &str) -> StorageResult<bool> {
            self.inner.exists(key).await
        }

        async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<StoredObject>> {
            self.inner.list(prefix).await
        }

        fn base_url(&self) -> &str {
            self.inner.base_url()
        }

        fn backend_type(&self) -> StorageBackend {
            StorageBackend::Local
        }
    }

    async fn faulty(dir: &std::path::Path, fail_public: bool, stall_put: bool) -> Arc<FaultyStorage> {
        let inner = LocalStorage::new(dir, "http://cdn.test".to_string())
            .await
            .unwrap();
        Arc::new(FaultyStorage {
            inner,
            fail_public,
            stall_put,
        })
    }

    #[tokio::test]
    async fn test_upload_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let storage = faulty(dir.path(), false, false).await;
        let uploader = ObjectUploader::new(storage.clone(), Duration::from_secs(5));

        let url = uploader
            .upload(Bytes::from_static(b"data"), "KEY.png", "image/png")
            .await
            .unwrap();

        assert_eq!(url, "http://cdn.test/KEY.png");
        assert!(storage.exists("KEY.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_public_read_failure_removes_object() {
        let dir = tempfile::tempdir().unwrap();
        let storage = faulty(dir.path(), true, false).await;
        let uploader = ObjectUploader::new(storage.clone(), Duration::from_secs(5));

        let result = uploader
            .upload(Bytes::from_static(b"data"), "KEY.png", "image/png")
            .await;

        assert!(matches!(result, Err(MediaError::StorageUpload(_))));
        assert!(!storage.exists("KEY.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = faulty(dir.path(), false, true).await;
        let uploader = ObjectUploader::new(storage, Duration::from_millis(50));

        let result = uploader
            .upload(Bytes::from_static(b"data"), "SLOW.mp4", "video/mp4")
            .await;

        match result {
            Err(MediaError::StorageUpload(detail)) => assert!(detail.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_taken_key_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let storage = faulty(dir.path(), false, false).await;
        let uploader = ObjectUploader::new(storage, Duration::from_secs(5));

        uploader
            .upload(Bytes::from_static(b"one"), "SAME.png", "image/png")
            .await
            .unwrap();
        let result = uploader
            .upload(Bytes::from_static(b"two"), "SAME.png", "image/png")
            .await;

        assert!(matches!(result, Err(MediaError::DuplicateKey(_))));
    }
}
