//! Skatehub database layer
//!
//! Persistence for `Asset` rows: the `AssetRepository` seam used by the media
//! pipeline, its Postgres implementation, and pool setup with embedded migrations.

pub mod asset;
pub mod setup;

pub use asset::{AssetRepository, PgAssetRepository};
pub use setup::{connect, setup_database, MIGRATOR};
