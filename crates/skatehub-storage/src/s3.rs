use crate::traits::{validate_key, Storage, StorageError, StorageResult, StoredObject};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use object_store::aws::{AmazonS3, AmazonS3Builder, S3ConditionalPut};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStoreExt, PutMode, PutOptions, PutPayload,
    Result as ObjectResult,
};

/// Canned ACL header sent with every request so written objects are public-read
const ACL_HEADER: &str = "x-amz-acl";
const ACL_PUBLIC_READ: &str = "public-read";

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    base_url: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `public_base_url` - Optional override for the URL objects are served from
    ///   (e.g. a CDN in front of the bucket)
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            HeaderName::from_static(ACL_HEADER),
            HeaderValue::from_static(ACL_PUBLIC_READ),
        );

        // Build AmazonS3 object store from environment and explicit settings.
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region.clone())
            .with_bucket_name(bucket.clone())
            .with_conditional_put(S3ConditionalPut::ETagMatch)
            .with_client_options(ClientOptions::new().with_default_headers(default_headers));

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        let base_url = public_base_url
            .unwrap_or_else(|| derive_base_url(&bucket, &region, endpoint_url.as_deref()));

        Ok(S3Storage {
            store,
            bucket,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Public root URL for a bucket.
///
/// For AWS S3: `https://{bucket}.s3.{region}.amazonaws.com`.
/// For S3-compatible providers, path-style under the endpoint: `{endpoint}/{bucket}`.
fn derive_base_url(bucket: &str, region: &str, endpoint_url: Option<&str>) -> String {
    match endpoint_url {
        Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), bucket),
        None => format!("https://{}.s3.{}.amazonaws.com", bucket, region),
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_object(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<()> {
        validate_key(storage_key)?;
        let size = data.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            mode: PutMode::Create,
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> =
            object_store::ObjectStore::put_opts(&self.store, &location, PutPayload::from(data), opts)
                .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put failed"
            );
            match e {
                ObjectStoreError::AlreadyExists { .. } | ObjectStoreError::Precondition { .. } => {
                    StorageError::AlreadyExists(storage_key.to_string())
                }
                other => StorageError::UploadFailed(other.to_string()),
            }
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            content_type = %content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(())
    }

    /// The canned ACL travels with the write itself; this confirms the object
    /// landed and is therefore readable at its public URL.
    async fn make_public(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());

        match self.store.head(&location).await {
            Ok(_) => Ok(()),
            Err(ObjectStoreError::NotFound { .. }) => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    "S3 public-read confirmation failed"
                );
                Err(StorageError::AccessPolicyFailed(e.to_string()))
            }
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        validate_key(storage_key)?;
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(_) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        validate_key(storage_key)?;
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn list(&self, prefix: Option<&str>) -> StorageResult<Vec<StoredObject>> {
        let start = std::time::Instant::now();

        // object_store prefixes match whole path segments, so filter key prefixes here.
        let metas: Vec<_> = object_store::ObjectStore::list(&self.store, None)
            .try_collect()
            .await
            .map_err(|e: ObjectStoreError| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    "S3 list failed"
                );
                StorageError::BackendError(e.to_string())
            })?;

        let objects: Vec<StoredObject> = metas
            .into_iter()
            .map(|meta| StoredObject {
                key: meta.location.to_string(),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            })
            .filter(|obj| prefix.map_or(true, |p| obj.key.starts_with(p)))
            .collect();

        tracing::debug!(
            bucket = %self.bucket,
            count = objects.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 list successful"
        );

        Ok(objects)
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
