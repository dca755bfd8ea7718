use crate::keys::{join_url, validate_key};
use crate::traits::{ProgressFn, Storage, StorageError, StorageResult, UploadProgress};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Write granularity; progress is reported after every chunk.
const WRITE_CHUNK_SIZE: usize = 64 * 1024;

/// Local filesystem storage implementation
///
/// Blobs are stored as `{base_path}/{bucket}/{key}` and served from
/// `{base_url}/{bucket}/{key}` by whatever static file server fronts the directory.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    buckets: HashSet<String>,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "/var/lib/mlrepo")
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:8080/files")
    /// * `buckets` - Bucket names; one directory is created for each
    pub async fn new<I, S>(
        base_path: impl Into<PathBuf>,
        base_url: String,
        buckets: I,
    ) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_path = base_path.into();
        let buckets: HashSet<String> = buckets.into_iter().map(Into::into).collect();

        for bucket in &buckets {
            validate_key(bucket)?;
            let dir = base_path.join(bucket);
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            base_path,
            base_url,
            buckets,
        })
    }

    /// Convert bucket and key to a filesystem path with security validation
    fn blob_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        if !self.buckets.contains(bucket) {
            return Err(StorageError::UnknownBucket(bucket.to_string()));
        }
        validate_key(key)?;

        let bucket_dir = self.base_path.join(bucket);
        let path = bucket_dir.join(key);

        if path.parent() != Some(bucket_dir.as_path()) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside its bucket".to_string(),
            ));
        }

        Ok(path)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> StorageResult<String> {
        let path = self.blob_path(bucket, key)?;
        let total = data.len() as u64;
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let mut loaded = 0u64;
        for chunk in data.chunks(WRITE_CHUNK_SIZE) {
            file.write_all(chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            loaded += chunk.len() as u64;
            if let Some(ref report) = progress {
                report(UploadProgress { loaded, total });
            }
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        if total == 0 {
            if let Some(ref report) = progress {
                report(UploadProgress {
                    loaded: 0,
                    total: 0,
                });
            }
        }

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        self.public_url(bucket, key)
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.blob_path(bucket, key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(format!("{}/{}", bucket, key)));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.blob_path(bucket, key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }

        fs::remove_file(&path).await.map_err(|e| {
            StorageError::DeleteFailed(format!("Failed to delete file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        let path = self.blob_path(bucket, key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String> {
        self.blob_path(bucket, key)?;
        Ok(join_url(&self.base_url, bucket, key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    async fn storage(dir: &std::path::Path) -> LocalStorage {
        LocalStorage::new(
            dir,
            "http://localhost:8080/files".to_string(),
            ["ml-models", "datasets"],
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_local_storage_upload_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let data = Bytes::from_static(b"weights");
        let url = storage
            .upload("ml-models", "1700000000000-model.pth", data.clone(), None)
            .await
            .unwrap();

        assert_eq!(
            url,
            "http://localhost:8080/files/ml-models/1700000000000-model.pth"
        );
        assert!(dir
            .path()
            .join("ml-models")
            .join("1700000000000-model.pth")
            .exists());

        let downloaded = storage
            .download("ml-models", "1700000000000-model.pth")
            .await
            .unwrap();
        assert_eq!(data.to_vec(), downloaded);
    }

    #[tokio::test]
    async fn test_upload_reports_progress_up_to_total() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |p: UploadProgress| {
            sink.lock().unwrap().push(p.percent());
        });

        let data = Bytes::from(vec![7u8; WRITE_CHUNK_SIZE * 2 + 10]);
        storage
            .upload("datasets", "1-big.csv", data, Some(progress))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_double_dot_in_file_name_is_stored() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .upload("ml-models", "1-resnet..v2.pth", Bytes::from_static(b"w"), None)
            .await
            .unwrap();

        assert!(dir.path().join("ml-models").join("1-resnet..v2.pth").exists());
        assert!(storage
            .upload("ml-models", "1-x/../../escape", Bytes::from_static(b"w"), None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unknown_bucket_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage
            .upload("other", "1-a.pt", Bytes::from_static(b"x"), None)
            .await;
        assert!(matches!(result, Err(StorageError::UnknownBucket(_))));
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("ml-models", "../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.delete("ml-models", "../datasets/x.csv").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("ml-models", "/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("ml-models", "nested/key").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_local_storage_delete() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .upload("datasets", "5-data.csv", Bytes::from_static(b"a,b"), None)
            .await
            .unwrap();
        assert!(storage.exists("datasets", "5-data.csv").await.unwrap());

        storage.delete("datasets", "5-data.csv").await.unwrap();
        assert!(!storage.exists("datasets", "5-data.csv").await.unwrap());

        // Missing blobs are not an error
        assert!(storage.delete("datasets", "5-data.csv").await.is_ok());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download("datasets", "9-missing.csv").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_public_url_encodes_key() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let url = storage.public_url("datasets", "3-my data.csv").unwrap();
        assert_eq!(url, "http://localhost:8080/files/datasets/3-my%20data.csv");
    }
}
