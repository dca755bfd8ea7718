//! In-memory `UploadRepository` for testing

use async_trait::async_trait;
use mlrepo_core::models::{FileCategory, NewUpload, SortKey, UploadRecord};
use mlrepo_core::AppError;
use mlrepo_db::UploadRepository;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Stores upload rows in a `Vec`; inserts, lists and deletes can be made to fail.
#[derive(Default)]
pub struct InMemoryUploadRepository {
    rows: Mutex<Vec<UploadRecord>>,
    failing_inserts: Mutex<HashSet<String>>,
    fail_lists: AtomicBool,
    fail_deletes: AtomicBool,
    insert_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryUploadRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make inserts of rows named `file_name` fail.
    pub fn fail_inserts_for(&self, file_name: &str) {
        self.failing_inserts
            .lock()
            .unwrap()
            .insert(file_name.to_string());
    }

    pub fn fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Insert a row directly (for test setup)
    pub fn seed(&self, record: UploadRecord) {
        self.rows.lock().unwrap().push(record);
    }

    /// Snapshot of all rows in insertion order
    pub fn records(&self) -> Vec<UploadRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn injected(operation: &str) -> AppError {
        AppError::Internal(format!("injected {} failure", operation))
    }
}

#[async_trait]
impl UploadRepository for InMemoryUploadRepository {
    async fn insert(&self, upload: NewUpload) -> Result<UploadRecord, AppError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        if self
            .failing_inserts
            .lock()
            .unwrap()
            .contains(&upload.file_name)
        {
            return Err(Self::injected("insert"));
        }

        let record = UploadRecord {
            id: Uuid::new_v4(),
            file_name: upload.file_name,
            file_type: upload.file_type,
            bucket: upload.bucket,
            size: upload.size,
            uploaded_at: upload.uploaded_at,
        };
        self.rows.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list(
        &self,
        file_type: Option<FileCategory>,
        sort: SortKey,
    ) -> Result<Vec<UploadRecord>, AppError> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(Self::injected("list"));
        }

        let mut rows: Vec<UploadRecord> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| file_type.map_or(true, |t| r.file_type == t))
            .cloned()
            .collect();
        sort.sort(&mut rows);
        Ok(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, AppError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected("delete"));
        }

        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != id);
        Ok(rows.len() != before)
    }
}
