//! Skatehub Storage Library
//!
//! Object-store access for the media pipeline: the `Storage` trait with S3 and
//! local filesystem backends, the storage key generator, and `ObjectUploader`,
//! which turns a byte buffer into a publicly readable object.
//!
//! # Storage key format
//!
//! Objects are stored flat under `{key}.{extension}`, where `key` comes from
//! [`KeyGenerator`]. Keys must not contain `..` or a leading `/`.
//!
//! Writes are create-only: a backend refuses to overwrite an existing object
//! and reports [`StorageError::AlreadyExists`] instead, so an object written by
//! a call always belongs to that call.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod uploader;

// Re-export commonly used types
pub use factory::create_storage;
pub use keys::KeyGenerator;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use skatehub_core::StorageBackend;
pub use traits::{Storage, StorageError, StorageResult, StoredObject};
pub use uploader::ObjectUploader;
