//! Media asset manager
//!
//! Turns a submitted payload into a persisted `Asset`:
//!
//! 1. classify the payload and reject anything off the allow-list
//! 2. decode it to raw bytes
//! 3. pick a fresh storage key
//! 4. read image dimensions
//! 5. upload `{key}.{extension}` and make it public
//! 6. insert the `asset` row
//!
//! A failure at any step stops the pipeline. Nothing reaches the object store
//! before step 5, and the row is only written after the object is confirmed
//! public. If the insert fails the object is deleted again; if that delete also
//! fails, or the caller is cancelled between steps 5 and 6, the object is left
//! as an orphan for [`OrphanReconciler`](crate::reconcile::OrphanReconciler).

use anyhow::Context;
use bytes::Bytes;
use skatehub_core::{Asset, MediaConfig, MediaError, MediaKind, MediaResult, NewAsset};
use skatehub_db::{AssetRepository, PgAssetRepository};
use skatehub_processing::{extract_dimensions, MediaClassifier, PayloadDescriptor};
use skatehub_storage::{create_storage, KeyGenerator, ObjectUploader, Storage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::reconcile::OrphanReconciler;

/// Tunables read from `MediaConfig`
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub max_payload_bytes: usize,
    /// Upper bound on keys tried per call when a key is already taken
    pub key_attempts: u32,
    /// Extra upload attempts after a transient store failure, each under a fresh key
    pub upload_retries: u32,
    /// Check the relational store for the key before uploading
    pub recheck_keys: bool,
    pub upload_timeout: Duration,
    pub orphan_grace: Duration,
}

impl From<&MediaConfig> for ManagerOptions {
    fn from(config: &MediaConfig) -> Self {
        Self {
            max_payload_bytes: config.max_payload_bytes,
            key_attempts: config.key_attempts.max(1),
            upload_retries: config.upload_retries,
            recheck_keys: true,
            upload_timeout: config.upload_timeout(),
            orphan_grace: config.orphan_grace_period(),
        }
    }
}

pub struct MediaAssetManager {
    classifier: MediaClassifier,
    keys: KeyGenerator,
    uploader: ObjectUploader,
    repository: Arc<dyn AssetRepository>,
    options: ManagerOptions,
}

impl MediaAssetManager {
    pub fn new(
        storage: Arc<dyn Storage>,
        repository: Arc<dyn AssetRepository>,
        config: &MediaConfig,
    ) -> Self {
        let options = ManagerOptions::from(config);
        Self {
            classifier: MediaClassifier::from_config(config),
            keys: KeyGenerator::new(config.key_length),
            uploader: ObjectUploader::new(storage, options.upload_timeout),
            repository,
            options,
        }
    }

    /// Build the configured storage backend and Postgres repository, running
    /// migrations on the way.
    pub async fn connect(config: &MediaConfig) -> anyhow::Result<Self> {
        let storage = create_storage(config)
            .await
            .context("Failed to initialize storage backend")?;
        let pool = skatehub_db::setup_database(config).await?;
        let repository = Arc::new(PgAssetRepository::new(pool));
        Ok(Self::new(storage, repository, config))
    }

    /// Replace the key generator, e.g. with a seeded one in tests.
    pub fn with_key_generator(mut self, keys: KeyGenerator) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_options(mut self, options: ManagerOptions) -> Self {
        self.uploader = ObjectUploader::new(self.uploader.storage().clone(), options.upload_timeout);
        self.options = options;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        self.uploader.storage()
    }

    pub fn repository(&self) -> &Arc<dyn AssetRepository> {
        &self.repository
    }

    /// Reconciler over the same store and repository as this manager.
    pub fn reconciler(&self) -> OrphanReconciler {
        OrphanReconciler::new(
            self.storage().clone(),
            self.repository.clone(),
            self.options.orphan_grace,
        )
    }

    /// Classify, upload and record a payload.
    ///
    /// Fails with `UnsupportedMediaKind`, `PayloadTooLarge`, `CorruptMedia`,
    /// `StorageUpload`, `DuplicateKey` or `Database`; on failure no row exists
    /// for this call.
    #[tracing::instrument(skip_all, fields(media.kind, asset.key))]
    pub async fn create_asset(&self, payload: PayloadDescriptor) -> MediaResult<Asset> {
        let start = Instant::now();
        let max = self.options.max_payload_bytes;

        let estimated = payload.estimated_size();
        if estimated > max {
            return Err(MediaError::PayloadTooLarge {
                size: estimated,
                max,
            });
        }

        let kind = self.classifier.classify(&payload)?;
        tracing::Span::current().record("media.kind", tracing::field::display(&kind));

        let data = payload.into_bytes(max)?;

        let key = self.fresh_key().await?;

        let dimensions = extract_dimensions(data.clone(), &kind).await?;

        let (key, url) = self.upload(data, &kind, key).await?;
        tracing::Span::current().record("asset.key", tracing::field::display(&key));

        let new_asset = NewAsset::new(self.uploader.base_url(), key, kind.extension(), dimensions);
        let storage_key = new_asset.storage_key();

        match self.repository.insert(&new_asset).await {
            Ok(asset) => {
                tracing::info!(
                    asset.id = %asset.id,
                    url = %url,
                    width = ?asset.width,
                    height = ?asset.height,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Asset created"
                );
                Ok(asset)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    key = %storage_key,
                    "Failed to record asset, removing uploaded object"
                );
                self.discard_object(&storage_key).await;
                Err(e)
            }
        }
    }

    /// Fetch an asset by its storage key stem.
    pub async fn get_asset(&self, key: &str) -> MediaResult<Asset> {
        self.repository
            .get_by_key(key)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Asset {} not found", key)))
    }

    pub async fn get_asset_by_id(&self, id: Uuid) -> MediaResult<Asset> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Asset {} not found", id)))
    }

    /// Delete an asset's row, then its object.
    ///
    /// The row goes first so no row ever points at a missing object. If the
    /// object delete fails the error is returned and the object is an orphan.
    #[tracing::instrument(skip(self))]
    pub async fn delete_asset(&self, key: &str) -> MediaResult<Asset> {
        let asset = self
            .repository
            .delete_by_key(key)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Asset {} not found", key)))?;

        let storage_key = asset.storage_key();
        self.storage().delete(&storage_key).await.map_err(|e| {
            tracing::error!(
                error = %e,
                key = %storage_key,
                "Asset row deleted but object removal failed; object is now an orphan"
            );
            MediaError::from(e)
        })?;

        tracing::info!(asset.id = %asset.id, key = %storage_key, "Asset deleted");
        Ok(asset)
    }

    /// Generate a key, optionally confirming the relational store has not used it.
    async fn fresh_key(&self) -> MediaResult<String> {
        let mut key = self.keys.generate();
        if !self.options.recheck_keys {
            return Ok(key);
        }

        for attempt in 1..=self.options.key_attempts {
            if !self.repository.key_exists(&key).await? {
                return Ok(key);
            }
            tracing::warn!(key = %key, attempt, "Generated key already recorded, regenerating");
            if attempt < self.options.key_attempts {
                key = self.keys.generate();
            }
        }

        Err(MediaError::DuplicateKey(key))
    }

    /// Upload under `{key}.{extension}`, moving to a fresh key when the store
    /// already holds one or when a transient failure is retried.
    async fn upload(
        &self,
        data: Bytes,
        kind: &MediaKind,
        mut key: String,
    ) -> MediaResult<(String, String)> {
        let mut collisions = 0;
        let mut retries = 0;

        loop {
            let storage_key = format!("{}.{}", key, kind.extension());
            match self
                .uploader
                .upload(data.clone(), &storage_key, kind.content_type())
                .await
            {
                Ok(url) => return Ok((key, url)),
                Err(MediaError::DuplicateKey(_)) if collisions + 1 < self.options.key_attempts => {
                    collisions += 1;
                    tracing::warn!(key = %storage_key, "Storage key already taken, regenerating");
                }
                Err(MediaError::StorageUpload(detail)) if retries < self.options.upload_retries => {
                    retries += 1;
                    tracing::warn!(
                        key = %storage_key,
                        error = %detail,
                        retry = retries,
                        "Upload failed, retrying under a fresh key"
                    );
                }
                Err(e) => return Err(e),
            }
            key = self.fresh_key().await?;
        }
    }

    async fn discard_object(&self, storage_key: &str) {
        if let Err(e) = self.storage().delete(storage_key).await {
            tracing::warn!(
                error = %e,
                key = %storage_key,
                "Failed to remove object after persistence failure; it will be reported as an orphan"
            );
        }
    }
}
