//! Configuration module
//!
//! `MediaConfig` covers everything the media pipeline reads at startup: the
//! relational store, the object-store backend, the media allow-list, key
//! generation, and upload bounds.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;
const DB_TIMEOUT_SECS: u64 = 30;
const S3_REGION: &str = "us-east-1";
const ALLOWED_SUBTYPES: &str = "png,jpg,jpeg,mp4";
const KEY_LENGTH: usize = 16;
const MIN_KEY_LENGTH: usize = 8;
const MAX_KEY_LENGTH: usize = 64;
const KEY_ATTEMPTS: u32 = 3;
const MAX_PAYLOAD_MB: usize = 100;
const UPLOAD_TIMEOUT_SECS: u64 = 30;
const UPLOAD_RETRIES: u32 = 0;
const ORPHAN_GRACE_SECS: u64 = 3600;

/// Media pipeline configuration
#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub environment: String,
    pub log_format: String,
    // Relational store
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    // Object store
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub s3_public_base_url: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Media pipeline
    pub allowed_subtypes: Vec<String>,
    pub key_length: usize,
    pub key_attempts: u32,
    pub max_payload_bytes: usize,
    pub upload_timeout_secs: u64,
    /// Extra upload attempts on transient failure, each under a fresh key. 0 = no retry.
    pub upload_retries: u32,
    /// Minimum age of an unreferenced object before reconciliation reports it.
    pub orphan_grace_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_format: "pretty".to_string(),
            database_url: None,
            db_max_connections: DB_MAX_CONNECTIONS,
            db_timeout_seconds: DB_TIMEOUT_SECS,
            storage_backend: StorageBackend::S3,
            s3_bucket: None,
            s3_region: S3_REGION.to_string(),
            s3_endpoint: None,
            s3_public_base_url: None,
            local_storage_path: None,
            local_storage_base_url: None,
            allowed_subtypes: split_list(ALLOWED_SUBTYPES),
            key_length: KEY_LENGTH,
            key_attempts: KEY_ATTEMPTS,
            max_payload_bytes: MAX_PAYLOAD_MB * 1024 * 1024,
            upload_timeout_secs: UPLOAD_TIMEOUT_SECS,
            upload_retries: UPLOAD_RETRIES,
            orphan_grace_secs: ORPHAN_GRACE_SECS,
        }
    }
}

/// Parse an optional numeric setting; a value that is present but malformed is an error.
fn parse_number<T: FromStr>(value: Option<String>, name: &str, default: T) -> Result<T, anyhow::Error> {
    match value {
        Some(value) => value
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got {:?}", name, value)),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl MediaConfig {
    /// Load `.env` (if present) and read configuration from the process environment.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or(defaults.environment);

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.storage_backend,
        };

        let max_payload_mb: usize =
            parse_number(var("MEDIA_MAX_PAYLOAD_MB"), "MEDIA_MAX_PAYLOAD_MB", MAX_PAYLOAD_MB)?;
        let max_payload_bytes = max_payload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("MEDIA_MAX_PAYLOAD_MB is too large"))?;

        let config = MediaConfig {
            environment,
            log_format: var("LOG_FORMAT")
                .map(|s| s.to_lowercase())
                .unwrap_or(defaults.log_format),
            database_url: var("DATABASE_URL"),
            db_max_connections: parse_number(
                var("DB_MAX_CONNECTIONS"),
                "DB_MAX_CONNECTIONS",
                DB_MAX_CONNECTIONS,
            )?,
            db_timeout_seconds: parse_number(
                var("DB_TIMEOUT_SECONDS"),
                "DB_TIMEOUT_SECONDS",
                DB_TIMEOUT_SECS,
            )?,
            storage_backend,
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION")
                .or_else(|| var("AWS_REGION"))
                .unwrap_or(defaults.s3_region),
            s3_endpoint: var("S3_ENDPOINT"),
            s3_public_base_url: var("S3_PUBLIC_BASE_URL"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            allowed_subtypes: var("MEDIA_ALLOWED_SUBTYPES")
                .map(|s| split_list(&s))
                .unwrap_or(defaults.allowed_subtypes),
            key_length: parse_number(var("MEDIA_KEY_LENGTH"), "MEDIA_KEY_LENGTH", KEY_LENGTH)?,
            key_attempts: parse_number(
                var("MEDIA_KEY_ATTEMPTS"),
                "MEDIA_KEY_ATTEMPTS",
                KEY_ATTEMPTS,
            )?,
            max_payload_bytes,
            upload_timeout_secs: parse_number(
                var("MEDIA_UPLOAD_TIMEOUT_SECS"),
                "MEDIA_UPLOAD_TIMEOUT_SECS",
                UPLOAD_TIMEOUT_SECS,
            )?,
            upload_retries: parse_number(
                var("MEDIA_UPLOAD_RETRIES"),
                "MEDIA_UPLOAD_RETRIES",
                UPLOAD_RETRIES,
            )?,
            orphan_grace_secs: parse_number(
                var("MEDIA_ORPHAN_GRACE_SECS"),
                "MEDIA_ORPHAN_GRACE_SECS",
                ORPHAN_GRACE_SECS,
            )?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.allowed_subtypes.is_empty() {
            return Err(anyhow::anyhow!(
                "MEDIA_ALLOWED_SUBTYPES must name at least one subtype"
            ));
        }

        if !(MIN_KEY_LENGTH..=MAX_KEY_LENGTH).contains(&self.key_length) {
            return Err(anyhow::anyhow!(
                "MEDIA_KEY_LENGTH must be between {} and {}",
                MIN_KEY_LENGTH,
                MAX_KEY_LENGTH
            ));
        }

        if self.key_attempts == 0 {
            return Err(anyhow::anyhow!("MEDIA_KEY_ATTEMPTS must be at least 1"));
        }

        if self.upload_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "MEDIA_UPLOAD_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Root URL under which stored objects are publicly served.
    ///
    /// For S3: the explicit override, else `{endpoint}/{bucket}` for S3-compatible
    /// providers, else `https://{bucket}.s3.{region}.amazonaws.com`.
    pub fn public_base_url(&self) -> Option<String> {
        let url = match self.storage_backend {
            StorageBackend::S3 => {
                if let Some(url) = &self.s3_public_base_url {
                    url.clone()
                } else {
                    let bucket = self.s3_bucket.as_deref()?;
                    match &self.s3_endpoint {
                        Some(endpoint) => {
                            format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
                        }
                        None => format!("https://{}.s3.{}.amazonaws.com", bucket, self.s3_region),
                    }
                }
            }
            StorageBackend::Local => self.local_storage_base_url.clone()?,
        };
        Some(url.trim_end_matches('/').to_string())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn orphan_grace_period(&self) -> Duration {
        Duration::from_secs(self.orphan_grace_secs)
    }

    pub fn is_subtype_allowed(&self, subtype: &str) -> bool {
        let subtype = subtype.to_lowercase();
        self.allowed_subtypes.iter().any(|s| *s == subtype)
    }
}
