//! Test helpers for the media pipeline
//!
//! In-memory implementations of `Storage` and `AssetRepository` with fault
//! injection, plus payload fixtures. No database or object store is needed.

pub mod fixtures;
pub mod mock_repository;
pub mod mock_storage;

pub use fixtures::*;
pub use mock_repository::MockAssetRepository;
pub use mock_storage::MockStorage;

use crate::MediaAssetManager;
use skatehub_core::MediaConfig;
use skatehub_storage::KeyGenerator;
use std::sync::{Arc, Mutex, MutexGuard};

pub const TEST_BASE_URL: &str = "https://skate-hub.s3.us-east-1.amazonaws.com";

/// Lock a mock's state, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Configuration with defaults suitable for tests
pub fn test_config() -> MediaConfig {
    MediaConfig {
        s3_bucket: Some("skate-hub".to_string()),
        ..MediaConfig::default()
    }
}

/// Manager wired to fresh mocks with a seeded key generator.
pub fn mock_manager(
    seed: u64,
) -> (MediaAssetManager, Arc<MockStorage>, Arc<MockAssetRepository>) {
    mock_manager_with_config(seed, &test_config())
}

pub fn mock_manager_with_config(
    seed: u64,
    config: &MediaConfig,
) -> (MediaAssetManager, Arc<MockStorage>, Arc<MockAssetRepository>) {
    let storage = Arc::new(MockStorage::new());
    let repository = Arc::new(MockAssetRepository::new());
    let manager = MediaAssetManager::new(storage.clone(), repository.clone(), config)
        .with_key_generator(KeyGenerator::seeded(seed, config.key_length));
    (manager, storage, repository)
}
