//! Mock Storage implementation for testing

use super::{lock, TEST_BASE_URL};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use skatehub_storage::{Storage, StorageBackend, StorageError, StorageResult, StoredObject};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
struct MockObject {
    data: Bytes,
    content_type: String,
    public: bool,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Faults {
    failing_puts: usize,
    fail_make_public: bool,
    fail_deletes: bool,
    put_delay: Option<Duration>,
}

/// Mock storage implementation that stores objects in memory
pub struct MockStorage {
    objects: Mutex<HashMap<String, MockObject>>,
    faults: Mutex<Faults>,
    put_attempts: Mutex<usize>,
    base_url: String,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::with_base_url(TEST_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            faults: Mutex::new(Faults::default()),
            put_attempts: Mutex::new(0),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Every put fails with `UploadFailed` until cleared.
    pub fn fail_uploads(&self) {
        lock(&self.faults).failing_puts = usize::MAX;
    }

    /// The next `count` puts fail with `UploadFailed`.
    pub fn fail_next_uploads(&self, count: usize) {
        lock(&self.faults).failing_puts = count;
    }

    pub fn fail_make_public(&self) {
        lock(&self.faults).fail_make_public = true;
    }

    pub fn fail_deletes(&self) {
        lock(&self.faults).fail_deletes = true;
    }

    /// Puts sleep for `delay` before doing anything.
    pub fn delay_uploads(&self, delay: Duration) {
        lock(&self.faults).put_delay = Some(delay);
    }

    pub fn clear_faults(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Place an object directly, bypassing faults.
    pub fn insert_object(&self, key: &str, data: impl Into<Bytes>, last_modified: DateTime<Utc>) {
        lock(&self.objects).insert(
            key.to_string(),
            MockObject {
                data: data.into(),
                content_type: "application/octet-stream".to_string(),
                public: true,
                last_modified,
            },
        );
    }

    pub fn has_object(&self, key: &str) -> bool {
        lock(&self.objects).contains_key(key)
    }

    pub fn object(&self, key: &str) -> Option<Bytes> {
        lock(&self.objects).get(key).map(|o| o.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        lock(&self.objects).get(key).map(|o| o.content_type.clone())
    }

    pub fn is_public(&self, key: &str) -> bool {
        lock(&self.objects).get(key).is_some_and(|o| o.public)
    }

    pub fn object_count(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = lock(&self.objects).keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of `put_object` calls, including failed ones
    pub fn put_attempts(&self) -> usize {
        *lock(&self.put_attempts)
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put_object(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        *lock(&self.put_attempts) += 1;

        let delay = lock(&self.faults).put_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        {
            let mut faults = lock(&self.faults);
            if faults.failing_puts > 0 {
                faults.failing_puts -= 1;
                return Err(StorageError::UploadFailed(
                    "simulated store rejection".to_string(),
                ));
            }
        }

        let mut objects = lock(&self.objects);
        if objects.contains_key(storage_key) {
            return Err(StorageError::AlreadyExists(storage_key.to_string()));
        }
        objects.insert(
            storage_key.to_string(),
            MockObject {
                data,
                content_type: content_type.to_string(),
                public: false,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn make_public(&self, storage_key: &str) -> StorageResult<()> {
        if lock(&self.faults).fail_make_public {
            return Err(StorageError::AccessPolicyFailed(
                "simulated ACL rejection".to_string(),
            ));
        }
        match lock(&self.objects).get_mut(storage_key) {
            Some(object) => {
                object.public = true;
                Ok(())
            }
            None => Err(StorageError::NotFound(storage_key.to_string())),
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        if lock(&self.faults).fail_deletes {
            return Err(StorageError::DeleteFailed(
                "simulated delete failure".to_string(),
            ));
        }
        lock(&self.objects).remove(storage_key);
        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        Ok(self.has_object(storage_key))
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<StoredObject>> {
        let mut objects: Vec<StoredObject> = lock(&self.objects)
            .iter()
            .filter(|(key, _)| prefix.map_or(true, |p| key.starts_with(p)))
            .map(|(key, object)| StoredObject {
                key: key.clone(),
                size: object.data.len() as u64,
                last_modified: object.last_modified,
            })
            .collect();
        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
