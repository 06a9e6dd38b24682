//! Skatehub media pipeline
//!
//! `MediaAssetManager` is the entry point for the web layer: it accepts an
//! uploaded file or inline base64 payload and returns a persisted `Asset` whose
//! object is publicly readable, or a typed `MediaError`.
//!
//! ```ignore
//! let config = MediaConfig::from_env()?;
//! init_telemetry(&config.log_format)?;
//! let manager = MediaAssetManager::connect(&config).await?;
//! let asset = manager
//!     .create_asset(PayloadDescriptor::data_uri(form.image))
//!     .await?;
//! render(asset.to_response());
//! ```

pub mod manager;
pub mod reconcile;
pub mod telemetry;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use manager::{ManagerOptions, MediaAssetManager};
pub use reconcile::{OrphanReconciler, ReconcileReport};
pub use telemetry::init_telemetry;

pub use skatehub_core::{Asset, AssetResponse, MediaConfig, MediaError, MediaResult};
pub use skatehub_processing::PayloadDescriptor;
