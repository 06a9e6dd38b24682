//! Asset repository: persistence for the `asset` table.

use async_trait::async_trait;
use skatehub_core::{Asset, MediaError, MediaResult, NewAsset};
use sqlx::{PgPool, Postgres};
use std::collections::HashSet;
use uuid::Uuid;

const ASSET_COLUMNS: &str = "id, base_url, key, extension, width, height, created_at";

/// Storage of `Asset` rows.
///
/// The media pipeline only talks to this trait so it can run against an
/// in-memory implementation in tests.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Insert a row in a single atomic statement.
    ///
    /// Fails with `DuplicateKey` if the key is already recorded.
    async fn insert(&self, asset: &NewAsset) -> MediaResult<Asset>;

    async fn get_by_key(&self, key: &str) -> MediaResult<Option<Asset>>;

    async fn get_by_id(&self, id: Uuid) -> MediaResult<Option<Asset>>;

    async fn key_exists(&self, key: &str) -> MediaResult<bool>;

    /// Of the given object-store keys (`{key}.{extension}`), those that have a row.
    async fn existing_storage_keys(&self, storage_keys: &[String]) -> MediaResult<HashSet<String>>;

    /// Delete a row by key, returning it if it existed.
    async fn delete_by_key(&self, key: &str) -> MediaResult<Option<Asset>>;
}

/// Postgres-backed asset repository
#[derive(Clone)]
pub struct PgAssetRepository {
    pool: PgPool,
}

impl PgAssetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_insert_error(err: sqlx::Error, key: &str) -> MediaError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            MediaError::DuplicateKey(key.to_string())
        }
        _ => MediaError::Database(err),
    }
}

#[async_trait]
impl AssetRepository for PgAssetRepository {
    #[tracing::instrument(skip(self, asset), fields(db.table = "asset", asset.key = %asset.key))]
    async fn insert(&self, asset: &NewAsset) -> MediaResult<Asset> {
        let query = format!(
            r#"
            INSERT INTO asset (id, base_url, key, extension, width, height, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            ASSET_COLUMNS
        );

        sqlx::query_as::<Postgres, Asset>(&query)
            .bind(asset.id)
            .bind(&asset.base_url)
            .bind(&asset.key)
            .bind(&asset.extension)
            .bind(asset.width())
            .bind(asset.height())
            .bind(asset.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_insert_error(e, &asset.key))
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset"))]
    async fn get_by_key(&self, key: &str) -> MediaResult<Option<Asset>> {
        let query = format!("SELECT {} FROM asset WHERE key = $1", ASSET_COLUMNS);
        let asset = sqlx::query_as::<Postgres, Asset>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset", db.record_id = %id))]
    async fn get_by_id(&self, id: Uuid) -> MediaResult<Option<Asset>> {
        let query = format!("SELECT {} FROM asset WHERE id = $1", ASSET_COLUMNS);
        let asset = sqlx::query_as::<Postgres, Asset>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset"))]
    async fn key_exists(&self, key: &str) -> MediaResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM asset WHERE key = $1)")
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    #[tracing::instrument(skip(self, storage_keys), fields(db.table = "asset", count = storage_keys.len()))]
    async fn existing_storage_keys(&self, storage_keys: &[String]) -> MediaResult<HashSet<String>> {
        if storage_keys.is_empty() {
            return Ok(HashSet::new());
        }

        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT key || '.' || extension FROM asset WHERE key || '.' || extension = ANY($1)",
        )
        .bind(storage_keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "asset"))]
    async fn delete_by_key(&self, key: &str) -> MediaResult<Option<Asset>> {
        let query = format!("DELETE FROM asset WHERE key = $1 RETURNING {}", ASSET_COLUMNS);
        let asset = sqlx::query_as::<Postgres, Asset>(&query)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(asset)
    }
}
