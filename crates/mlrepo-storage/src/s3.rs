use crate::keys::{encode_key, join_url, validate_key};
use crate::traits::{ProgressFn, Storage, StorageError, StorageResult, UploadProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::collections::HashMap;

/// S3 storage implementation
///
/// Holds one object store client per configured bucket.
#[derive(Clone)]
pub struct S3Storage {
    stores: HashMap<String, AmazonS3>,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    public_base_url: Option<String>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `buckets` - Bucket names this instance may read and write
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `public_base_url` - Optional base for public URLs, used as `{base}/{bucket}/{key}`
    pub async fn new<I, S>(
        buckets: I,
        region: String,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut stores = HashMap::new();

        for bucket in buckets {
            let bucket: String = bucket.into();
            validate_key(&bucket)?;

            let mut builder = AmazonS3Builder::from_env()
                .with_region(region.clone())
                .with_bucket_name(bucket.clone());

            if let Some(ref endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder
                    .with_endpoint(endpoint.clone())
                    .with_allow_http(allow_http);
            }

            let store = builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?;

            stores.insert(bucket, store);
        }

        if stores.is_empty() {
            return Err(StorageError::ConfigError(
                "At least one bucket must be configured".to_string(),
            ));
        }

        Ok(S3Storage {
            stores,
            region,
            endpoint_url,
            public_base_url,
        })
    }

    fn store(&self, bucket: &str) -> StorageResult<&AmazonS3> {
        self.stores
            .get(bucket)
            .ok_or_else(|| StorageError::UnknownBucket(bucket.to_string()))
    }

    fn location(&self, bucket: &str, key: &str) -> StorageResult<(&AmazonS3, Path)> {
        let store = self.store(bucket)?;
        validate_key(key)?;
        Ok((store, Path::from(key.to_string())))
    }

    /// Generate public URL for S3 object
    ///
    /// An explicit public base wins. Otherwise S3-compatible providers use path-style
    /// `{endpoint}/{bucket}/{key}` and AWS uses `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
    fn generate_url(&self, bucket: &str, key: &str) -> String {
        if let Some(ref base) = self.public_base_url {
            join_url(base, bucket, key)
        } else if let Some(ref endpoint) = self.endpoint_url {
            join_url(endpoint, bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket,
                self.region,
                encode_key(key)
            )
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> StorageResult<String> {
        let (store, location) = self.location(bucket, key)?;
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        if let Some(ref report) = progress {
            report(UploadProgress {
                loaded: 0,
                total: size,
            });
        }

        let result: ObjectResult<_> = store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        if let Some(ref report) = progress {
            report(UploadProgress {
                loaded: size,
                total: size,
            });
        }

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(self.generate_url(bucket, key))
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let (store, location) = self.location(bucket, key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => {
                StorageError::NotFound(format!("{}/{}", bucket, key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let (store, location) = self.location(bucket, key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let (store, location) = self.location(bucket, key)?;
        match store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String> {
        self.location(bucket, key)?;
        Ok(self.generate_url(bucket, key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
