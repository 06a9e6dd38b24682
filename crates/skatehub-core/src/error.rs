//! Error types module
//!
//! Every stage of the media pipeline (classification, decoding, dimension
//! extraction, upload, persistence) reports failure as a `MediaError`. Callers
//! always receive a typed outcome; nothing is logged and dropped.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected rejections like unsupported media
    Debug,
    /// Warning level - for bad input that still deserves attention
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to a client.
///
/// The presentation layer sits outside this workspace; this trait lets it build a
/// user-facing message and status without matching on internals.
pub trait ErrorMetadata {
    /// HTTP status code hint
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "UNSUPPORTED_MEDIA_KIND")
    fn error_code(&self) -> &'static str;

    /// Whether the same request may succeed if retried
    fn is_recoverable(&self) -> bool;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Unsupported media kind: {0}")]
    UnsupportedMediaKind(String),

    #[error("Corrupt media: {0}")]
    CorruptMedia(String),

    #[error("Payload too large: {size} bytes (max: {max} bytes)")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Storage upload error: {0}")]
    StorageUpload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate asset key: {0}")]
    DuplicateKey(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Result alias used across the pipeline crates
pub type MediaResult<T> = Result<T, MediaError>;

#[cfg(feature = "sqlx")]
impl From<SqlxError> for MediaError {
    fn from(err: SqlxError) -> Self {
        MediaError::Database(err)
    }
}

impl From<anyhow::Error> for MediaError {
    fn from(err: anyhow::Error) -> Self {
        MediaError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for MediaError {
    fn from(err: io::Error) -> Self {
        MediaError::Internal(format!("IO error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, log_level).
fn media_error_static_metadata(err: &MediaError) -> (u16, &'static str, bool, LogLevel) {
    match err {
        MediaError::UnsupportedMediaKind(_) => {
            (415, "UNSUPPORTED_MEDIA_KIND", false, LogLevel::Debug)
        }
        MediaError::CorruptMedia(_) => (422, "CORRUPT_MEDIA", false, LogLevel::Warn),
        MediaError::PayloadTooLarge { .. } => (413, "PAYLOAD_TOO_LARGE", false, LogLevel::Debug),
        MediaError::StorageUpload(_) => (503, "STORAGE_UPLOAD_ERROR", true, LogLevel::Error),
        MediaError::NotFound(_) => (404, "NOT_FOUND", false, LogLevel::Debug),
        MediaError::DuplicateKey(_) => (500, "DUPLICATE_KEY", true, LogLevel::Error),
        MediaError::Database(_) => (500, "DATABASE_ERROR", true, LogLevel::Error),
        MediaError::Internal(_) => (500, "INTERNAL_ERROR", false, LogLevel::Error),
        MediaError::InternalWithSource { .. } => (500, "INTERNAL_ERROR", false, LogLevel::Error),
    }
}

impl MediaError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            MediaError::UnsupportedMediaKind(_) => "UnsupportedMediaKind",
            MediaError::CorruptMedia(_) => "CorruptMedia",
            MediaError::PayloadTooLarge { .. } => "PayloadTooLarge",
            MediaError::StorageUpload(_) => "StorageUpload",
            MediaError::NotFound(_) => "NotFound",
            MediaError::DuplicateKey(_) => "DuplicateKey",
            MediaError::Database(_) => "Database",
            MediaError::Internal(_) => "Internal",
            MediaError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including the source chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for MediaError {
    fn http_status_code(&self) -> u16 {
        media_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        media_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        media_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        media_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            MediaError::UnsupportedMediaKind(subtype) => {
                format!("{} is not supported", subtype)
            }
            MediaError::CorruptMedia(_) => "The uploaded media could not be read".to_string(),
            MediaError::PayloadTooLarge { max, .. } => {
                format!("Media exceeds the maximum size of {} bytes", max)
            }
            MediaError::StorageUpload(_) => {
                "Failed to store media, please try again".to_string()
            }
            MediaError::NotFound(ref msg) => msg.clone(),
            MediaError::DuplicateKey(_)
            | MediaError::Database(_)
            | MediaError::Internal(_)
            | MediaError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
