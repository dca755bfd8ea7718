//! Mock Storage implementation for testing

use async_trait::async_trait;
use bytes::Bytes;
use mlrepo_storage::{
    ProgressFn, Storage, StorageBackend, StorageError, StorageResult, UploadProgress,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock storage implementation that stores blobs in memory
///
/// Uploads can be made to fail for specific file names (matched against the
/// `-{file_name}` suffix of the key) or for every key. Deletes and public URL
/// resolution can be made to fail as a whole.
pub struct MockStorage {
    blobs: Arc<Mutex<HashMap<(String, String), Vec<u8>>>>,
    failing_names: Mutex<HashSet<String>>,
    fail_all_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    fail_public_urls: AtomicBool,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    max_progress: Mutex<Option<f64>>,
    base_url: String,
}

impl MockStorage {
    pub fn new() -> Self {
        Self {
            blobs: Arc::new(Mutex::new(HashMap::new())),
            failing_names: Mutex::new(HashSet::new()),
            fail_all_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_public_urls: AtomicBool::new(false),
            upload_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            max_progress: Mutex::new(None),
            base_url: "https://storage.test".to_string(),
        }
    }

    /// Make uploads of `file_name` fail.
    pub fn fail_uploads_for(&self, file_name: &str) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    pub fn fail_all_uploads(&self, fail: bool) {
        self.fail_all_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_public_urls(&self, fail: bool) {
        self.fail_public_urls.store(fail, Ordering::SeqCst);
    }

    pub fn clear_failures(&self) {
        self.failing_names.lock().unwrap().clear();
        self.fail_all_uploads(false);
        self.fail_deletes(false);
        self.fail_public_urls(false);
    }

    /// Put a blob directly (for test setup)
    pub fn put_blob(&self, bucket: &str, key: &str, data: Vec<u8>) {
        self.blobs
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), data);
    }

    pub fn has_blob(&self, bucket: &str, key: &str) -> bool {
        self.blobs
            .lock()
            .unwrap()
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Highest progress percentage reported to any upload callback.
    pub fn max_progress_reported(&self) -> Option<f64> {
        *self.max_progress.lock().unwrap()
    }

    fn upload_should_fail(&self, key: &str) -> bool {
        if self.fail_all_uploads.load(Ordering::SeqCst) {
            return true;
        }
        let names = self.failing_names.lock().unwrap();
        names
            .iter()
            .any(|name| key.ends_with(&format!("-{}", name)))
    }

    fn url_for(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, bucket, key)
    }

    fn report(&self, progress: &Option<ProgressFn>, value: UploadProgress) {
        if let Some(report) = progress {
            report(value);
            let mut max = self.max_progress.lock().unwrap();
            let percent = value.percent();
            if max.map_or(true, |m| percent > m) {
                *max = Some(percent);
            }
        }
    }
}

impl Default for MockStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        progress: Option<ProgressFn>,
    ) -> StorageResult<String> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);

        if self.upload_should_fail(key) {
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}",
                key
            )));
        }

        let total = data.len() as u64;
        self.report(
            &progress,
            UploadProgress {
                loaded: total / 2,
                total,
            },
        );
        self.put_blob(bucket, key, data.to_vec());
        self.report(
            &progress,
            UploadProgress {
                loaded: total,
                total,
            },
        );

        Ok(self.url_for(bucket, key))
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure for {}",
                key
            )));
        }

        self.blobs
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self.has_blob(bucket, key))
    }

    fn public_url(&self, bucket: &str, key: &str) -> StorageResult<String> {
        if self.fail_public_urls.load(Ordering::SeqCst) {
            return Err(StorageError::BackendError(format!(
                "injected url failure for {}/{}",
                bucket, key
            )));
        }
        Ok(self.url_for(bucket, key))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
