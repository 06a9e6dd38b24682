//! Mock asset repository for testing without database

use super::lock;
use async_trait::async_trait;
use skatehub_core::{Asset, MediaError, MediaResult, NewAsset};
use skatehub_db::AssetRepository;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Faults {
    fail_inserts: bool,
    duplicate_inserts: bool,
}

/// In-memory asset table keyed by `key`, unique like the real one.
#[derive(Default)]
pub struct MockAssetRepository {
    rows: Mutex<HashMap<String, Asset>>,
    faults: Mutex<Faults>,
}

impl MockAssetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts fail with an internal database-style error.
    pub fn fail_inserts(&self) {
        lock(&self.faults).fail_inserts = true;
    }

    /// Inserts fail as if a concurrent call had recorded the same key.
    pub fn reject_inserts_as_duplicate(&self) {
        lock(&self.faults).duplicate_inserts = true;
    }

    /// Seed a row directly.
    pub fn insert_row(&self, asset: Asset) {
        lock(&self.rows).insert(asset.key.clone(), asset);
    }

    pub fn count(&self) -> usize {
        lock(&self.rows).len()
    }

    pub fn assets(&self) -> Vec<Asset> {
        lock(&self.rows).values().cloned().collect()
    }
}

#[async_trait]
impl AssetRepository for MockAssetRepository {
    async fn insert(&self, asset: &NewAsset) -> MediaResult<Asset> {
        {
            let faults = lock(&self.faults);
            if faults.fail_inserts {
                return Err(MediaError::Internal(
                    "simulated database failure".to_string(),
                ));
            }
            if faults.duplicate_inserts {
                return Err(MediaError::DuplicateKey(asset.key.clone()));
            }
        }

        let mut rows = lock(&self.rows);
        if rows.contains_key(&asset.key) {
            return Err(MediaError::DuplicateKey(asset.key.clone()));
        }
        let stored = asset.clone().into_asset();
        rows.insert(stored.key.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_by_key(&self, key: &str) -> MediaResult<Option<Asset>> {
        Ok(lock(&self.rows).get(key).cloned())
    }

    async fn get_by_id(&self, id: Uuid) -> MediaResult<Option<Asset>> {
        Ok(lock(&self.rows).values().find(|a| a.id == id).cloned())
    }

    async fn key_exists(&self, key: &str) -> MediaResult<bool> {
        Ok(lock(&self.rows).contains_key(key))
    }

    async fn existing_storage_keys(&self, storage_keys: &[String]) -> MediaResult<HashSet<String>> {
        let rows = lock(&self.rows);
        Ok(storage_keys
            .iter()
            .filter(|sk| rows.values().any(|a| &a.storage_key() == *sk))
            .cloned()
            .collect())
    }

    async fn delete_by_key(&self, key: &str) -> MediaResult<Option<Asset>> {
        Ok(lock(&self.rows).remove(key))
    }
}
