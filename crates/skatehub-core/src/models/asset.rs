use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "sqlx")]
use sqlx::FromRow;

/// Pixel dimensions of a decoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Durable record of one stored media object.
///
/// The object lives at `{base_url}/{key}.{extension}`. `width` and `height` are
/// either both set (images) or both `None` (video); the `asset` table enforces
/// the same pairing with a CHECK constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(FromRow))]
pub struct Asset {
    pub id: Uuid,
    pub base_url: String,
    pub key: String,
    pub extension: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// Object-store key: `{key}.{extension}`
    pub fn storage_key(&self) -> String {
        format!("{}.{}", self.key, self.extension)
    }

    /// Public URL of the stored object
    pub fn url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.storage_key()
        )
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(Dimensions::new(w.max(0) as u32, h.max(0) as u32)),
            _ => None,
        }
    }

    /// Projection consumed by templates and the JSON API
    pub fn to_response(&self) -> AssetResponse {
        AssetResponse::from(self)
    }
}

/// An asset that has been uploaded but not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAsset {
    pub id: Uuid,
    pub base_url: String,
    pub key: String,
    pub extension: String,
    pub dimensions: Option<Dimensions>,
    pub created_at: DateTime<Utc>,
}

impl NewAsset {
    /// Assigns a fresh id and stamps `created_at` with the current time.
    pub fn new(
        base_url: impl Into<String>,
        key: impl Into<String>,
        extension: impl Into<String>,
        dimensions: Option<Dimensions>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            base_url: base_url.into(),
            key: key.into(),
            extension: extension.into(),
            dimensions,
            created_at: Utc::now(),
        }
    }

    pub fn storage_key(&self) -> String {
        format!("{}.{}", self.key, self.extension)
    }

    pub fn width(&self) -> Option<i32> {
        self.dimensions
            .map(|d| i32::try_from(d.width).unwrap_or(i32::MAX))
    }

    pub fn height(&self) -> Option<i32> {
        self.dimensions
            .map(|d| i32::try_from(d.height).unwrap_or(i32::MAX))
    }

    pub fn into_asset(self) -> Asset {
        Asset {
            id: self.id,
            width: self.width(),
            height: self.height(),
            base_url: self.base_url,
            key: self.key,
            extension: self.extension,
            created_at: self.created_at,
        }
    }
}

/// Public projection of an asset: `{url, created_at}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetResponse {
    pub url: String,
    pub created_at: String,
}

impl From<&Asset> for AssetResponse {
    fn from(asset: &Asset) -> Self {
        Self {
            url: asset.url(),
            created_at: asset.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}
