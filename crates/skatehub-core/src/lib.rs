//! Skatehub Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! the skatehub media crates: the `Asset` record, the classified `MediaKind`, the
//! `MediaError` taxonomy every pipeline stage reports, and `MediaConfig`.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::MediaConfig;
pub use error::{ErrorMetadata, LogLevel, MediaError, MediaResult};
pub use models::{Asset, AssetResponse, Dimensions, MediaFamily, MediaKind, NewAsset};
pub use storage_types::StorageBackend;
