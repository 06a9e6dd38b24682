use crate::traits::{validate_key, Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

/// Directory under the base path where writes are staged before being moved into place
const STAGING_DIR: &str = ".staging";

/// Local filesystem storage implementation
///
/// Each write is staged in a temporary file under `{base_path}/.staging` and then
/// renamed into place without clobbering. A staged file that never reaches its
/// final path is removed when the `NamedTempFile` is dropped, whatever the exit path.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/skatehub/media")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:5000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(base_path.join(STAGING_DIR))
            .await
            .map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    base_path.display(),
                    e
                ))
            })?;

        Ok(LocalStorage {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn staging_dir(&self) -> PathBuf {
        self.base_path.join(STAGING_DIR)
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        if storage_key == STAGING_DIR || storage_key.starts_with(&format!("{}/", STAGING_DIR)) {
            return Err(StorageError::InvalidKey(
                "Storage key points into the staging area".to_string(),
            ));
        }

        let path = self.base_path.join(storage_key);
        if path.strip_prefix(&self.base_path).is_err() {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Write `data` to a temp file in `staging_dir`, then move it to `target` unless
/// something already exists there.
fn stage_and_persist(staging_dir: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
    let mut staged = NamedTempFile::new_in(staging_dir)?;
    staged.write_all(data)?;
    staged.as_file().sync_all()?;
    staged.persist_noclobber(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_object(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();
        let staging_dir = self.staging_dir();
        let target = path.clone();

        let result = tokio::task::spawn_blocking(move || {
            stage_and_persist(&staging_dir, &target, &data)
        })
        .await
        .map_err(|e| StorageError::BackendError(format!("Staging task failed: {}", e)))?;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path.display(),
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Local storage put failed"
            );
            if e.kind() == io::ErrorKind::AlreadyExists {
                StorageError::AlreadyExists(storage_key.to_string())
            } else {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                ))
            }
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    async fn make_public(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        path = %path.display(),
                        key = %storage_key,
                        "Local storage make_public failed"
                    );
                    StorageError::AccessPolicyFailed(format!("{}: {}", path.display(), e))
                })?;
        }

        tracing::debug!(key = %storage_key, "Local storage object is public");
        Ok(())
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut pending = vec![self.base_path.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let meta = entry.metadata().await?;

                if meta.is_dir() {
                    if path != self.staging_dir() {
                        pending.push(path);
                    }
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.base_path) else {
                    continue;
                };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if prefix.is_some_and(|p| !key.starts_with(p)) {
                    continue;
                }

                let last_modified: DateTime<Utc> = meta.modified()?.into();
                objects.push(StoredObject {
                    key,
                    size: meta.len(),
                    last_modified,
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir, "http://localhost:5000/media/".to_string())
            .await
            .unwrap()
    }

    fn staged_files(dir: &Path) -> usize {
        std::fs::read_dir(dir.join(STAGING_DIR)).unwrap().count()
    }

    #[tokio::test]
    async fn test_put_object_and_public_url() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put_object("ABCD1234.png", Bytes::from_static(b"png bytes"), "image/png")
            .await
            .unwrap();

        assert!(storage.exists("ABCD1234.png").await.unwrap());
        assert_eq!(
            std::fs::read(dir.path().join("ABCD1234.png")).unwrap(),
            b"png bytes"
        );
        assert_eq!(
            storage.public_url("ABCD1234.png"),
            "http://localhost:5000/media/ABCD1234.png"
        );
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_put_object_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put_object("KEY.mp4", Bytes::from_static(b"first"), "video/mp4")
            .await
            .unwrap();
        let result = storage
            .put_object("KEY.mp4", Bytes::from_static(b"second"), "video/mp4")
            .await;

        assert!(matches!(result, Err(StorageError::AlreadyExists(ref k)) if k == "KEY.mp4"));
        assert_eq!(std::fs::read(dir.path().join("KEY.mp4")).unwrap(), b"first");
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_put_leaves_no_staged_file() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        // A directory squatting on the target path makes the final move fail.
        std::fs::create_dir(dir.path().join("TAKEN.png")).unwrap();

        let result = storage
            .put_object("TAKEN.png", Bytes::from_static(b"data"), "image/png")
            .await;

        assert!(result.is_err());
        assert_eq!(staged_files(dir.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_make_public_sets_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put_object("PUBLIC.jpg", Bytes::from_static(b"jpg"), "image/jpeg")
            .await
            .unwrap();
        storage.make_public("PUBLIC.jpg").await.unwrap();

        let mode = std::fs::metadata(dir.path().join("PUBLIC.jpg"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_make_public_missing_object() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.make_public("MISSING.png").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.delete("../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .put_object(".staging/evil", Bytes::from_static(b"x"), "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_ok() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert!(storage.delete("NOPE.png").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_filters_prefix_and_skips_staging() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        for key in ["AAA.png", "AAB.mp4", "BBB.jpg"] {
            storage
                .put_object(key, Bytes::from_static(b"data"), "application/octet-stream")
                .await
                .unwrap();
        }
        std::fs::write(dir.path().join(STAGING_DIR).join("leftover"), b"x").unwrap();

        let all = storage.list(None).await.unwrap();
        let keys: Vec<&str> = all.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["AAA.png", "AAB.mp4", "BBB.jpg"]);
        assert!(all.iter().all(|o| o.size == 4));

        let filtered = storage.list(Some("AA")).await.unwrap();
        assert_eq!(filtered.len(), 2);
    }
}
