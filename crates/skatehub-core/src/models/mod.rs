//! Data models for the media pipeline
//!
//! `asset` holds the durable record of a stored media object; `media_kind` holds
//! the classified type of a payload.

mod asset;
mod media_kind;

pub use asset::*;
pub use media_kind::*;
