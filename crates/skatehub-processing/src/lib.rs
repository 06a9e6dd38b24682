//! Skatehub Processing Library
//!
//! The in-memory stages of media ingestion: turning a submitted payload into
//! raw bytes, classifying what those bytes really are against the allow-list,
//! and reading pixel dimensions out of images.

pub mod classifier;
pub mod extract;
pub mod payload;

pub use classifier::{sniff, MediaClassifier};
pub use extract::{decode_dimensions, extract_dimensions};
pub use payload::PayloadDescriptor;
