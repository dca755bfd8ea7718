use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use mlrepo_core::keys::{now_millis, storage_key};
use mlrepo_core::models::{FileCategory, NewUpload};
use mlrepo_core::validation::{validate_file_size, validate_file_type};
use mlrepo_core::{AppError, BucketConfig, Config};
use mlrepo_db::UploadRepository;
use mlrepo_storage::{ProgressFn, Storage, UploadProgress};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::observer::UploadObserver;
use super::types::{
    CandidateFile, CommitSummary, FailureStage, FileOutcome, PendingFile, StageRejection,
    StageReport,
};

type ProgressMap = Arc<Mutex<HashMap<Uuid, f64>>>;

/// Stages files for upload and commits them to storage and the metadata table.
///
/// The staged batch, the per-file progress map and the observer list belong to
/// this instance. A commit uploads every staged file concurrently; each file is
/// persisted or fails independently of the others.
pub struct UploadCoordinator {
    storage: Arc<dyn Storage>,
    uploads: Arc<dyn UploadRepository>,
    buckets: BucketConfig,
    max_file_size: Option<u64>,
    pending: Vec<PendingFile>,
    progress: ProgressMap,
    observers: Vec<Arc<dyn UploadObserver>>,
    last_stamp: Option<DateTime<Utc>>,
}

impl UploadCoordinator {
    pub fn new(
        storage: Arc<dyn Storage>,
        uploads: Arc<dyn UploadRepository>,
        buckets: BucketConfig,
    ) -> Self {
        Self {
            storage,
            uploads,
            buckets,
            max_file_size: None,
            pending: Vec::new(),
            progress: Arc::new(Mutex::new(HashMap::new())),
            observers: Vec::new(),
            last_stamp: None,
        }
    }

    pub fn from_config(
        storage: Arc<dyn Storage>,
        uploads: Arc<dyn UploadRepository>,
        config: &Config,
    ) -> Self {
        Self::new(storage, uploads, config.buckets.clone())
            .with_max_file_size(config.max_file_size_bytes)
    }

    /// Reject files larger than `limit` bytes at staging time. `None` disables the check.
    pub fn with_max_file_size(mut self, limit: Option<u64>) -> Self {
        self.max_file_size = limit;
        self
    }

    pub fn subscribe(&mut self, observer: Arc<dyn UploadObserver>) {
        self.observers.push(observer);
    }

    /// Add files to the batch under `category`.
    ///
    /// Files whose extension is not allowed for the category (or that exceed the
    /// size limit) are reported in `rejected` and never staged. Staging is additive.
    pub fn stage(&mut self, files: Vec<CandidateFile>, category: FileCategory) -> StageReport {
        let mut report = StageReport::default();

        for file in files {
            let checked = validate_file_type(&file.name, category).and_then(|_| {
                validate_file_size(&file.name, file.data.len() as u64, self.max_file_size)
            });

            match checked {
                Ok(()) => {
                    let local_id = Uuid::new_v4();
                    tracing::debug!(
                        local_id = %local_id,
                        file_name = %file.name,
                        category = %category,
                        size_bytes = file.data.len(),
                        "File staged"
                    );
                    self.pending.push(PendingFile {
                        local_id,
                        file_name: file.name,
                        data: file.data,
                        category,
                    });
                    report.accepted.push(local_id);
                }
                Err(error) => {
                    tracing::warn!(
                        file_name = %file.name,
                        category = %category,
                        error = %error,
                        "File rejected at staging"
                    );
                    report.rejected.push(StageRejection {
                        file_name: file.name,
                        category,
                        error,
                    });
                }
            }
        }

        report
    }

    /// Remove a staged file and its progress entry. Returns false if it was not staged.
    pub fn unstage(&mut self, local_id: Uuid) -> bool {
        let before = self.pending.len();
        self.pending.retain(|file| file.local_id != local_id);
        self.lock_progress().remove(&local_id);
        self.pending.len() != before
    }

    pub fn pending(&self) -> &[PendingFile] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Upload progress of a staged file in percent, if its upload has started.
    pub fn progress(&self, local_id: Uuid) -> Option<f64> {
        self.lock_progress().get(&local_id).copied()
    }

    /// Upload and record every staged file.
    ///
    /// Fails only for an empty batch. Per-file failures are reported in the
    /// summary; those files stay staged so the commit can be retried.
    pub async fn commit(&mut self) -> Result<CommitSummary, AppError> {
        if self.pending.is_empty() {
            return Err(AppError::EmptyBatch);
        }

        let start = std::time::Instant::now();
        let attempted = self.pending.len();
        let stamps = self.assign_timestamps();

        let outcomes: Vec<FileOutcome> =
            join_all(self.pending.iter().zip(stamps).map(|(file, uploaded_at)| {
                commit_file(
                    self.storage.as_ref(),
                    self.uploads.as_ref(),
                    self.buckets.bucket_for(file.category),
                    file,
                    uploaded_at,
                    self.progress.clone(),
                )
            }))
            .await;

        let persisted_ids: HashSet<Uuid> = outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .map(FileOutcome::local_id)
            .collect();

        self.pending
            .retain(|file| !persisted_ids.contains(&file.local_id));
        {
            let mut progress = self.lock_progress();
            progress.retain(|id, _| !persisted_ids.contains(id));
        }

        let summary = CommitSummary {
            attempted,
            succeeded: persisted_ids.len(),
            outcomes,
        };

        if summary.all_succeeded() {
            self.pending.clear();
            self.lock_progress().clear();
            tracing::info!(
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "All files uploaded successfully"
            );
            for observer in &self.observers {
                observer.on_commit_finished(&summary);
            }
        } else {
            tracing::warn!(
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Some files failed to upload"
            );
        }

        if summary.succeeded > 0 {
            let records = summary.persisted();
            for observer in &self.observers {
                observer.on_files_persisted(&records);
            }
        }

        Ok(summary)
    }

    /// One upload timestamp per staged file, in staging order.
    ///
    /// Files with the same category and name get consecutive milliseconds, and
    /// no timestamp repeats one handed out by an earlier commit, so each file
    /// lands on a storage key of its own.
    fn assign_timestamps(&mut self) -> Vec<DateTime<Utc>> {
        let mut base = now_millis();
        if let Some(last) = self.last_stamp {
            if base <= last {
                base = last + Duration::milliseconds(1);
            }
        }

        let mut seen: HashMap<(FileCategory, &str), i64> = HashMap::new();
        let stamps: Vec<DateTime<Utc>> = self
            .pending
            .iter()
            .map(|file| {
                let offset = seen
                    .entry((file.category, file.file_name.as_str()))
                    .or_insert(0);
                let stamp = base + Duration::milliseconds(*offset);
                *offset += 1;
                stamp
            })
            .collect();

        if let Some(latest) = stamps.iter().max() {
            self.last_stamp = Some(*latest);
        }
        stamps
    }

    fn lock_progress(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, f64>> {
        self.progress
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Upload one file, then insert its row; remove the blob again if the insert fails.
async fn commit_file(
    storage: &dyn Storage,
    uploads: &dyn UploadRepository,
    bucket: &str,
    file: &PendingFile,
    uploaded_at: DateTime<Utc>,
    progress: ProgressMap,
) -> FileOutcome {
    let key = storage_key(uploaded_at, &file.file_name);
    let local_id = file.local_id;

    set_progress(&progress, local_id, 0.0);
    let report: ProgressFn = {
        let progress = progress.clone();
        Arc::new(move |p: UploadProgress| set_progress(&progress, local_id, p.percent()))
    };

    if let Err(e) = storage
        .upload(bucket, &key, file.data.clone(), Some(report))
        .await
    {
        tracing::error!(
            error = %e,
            bucket = %bucket,
            key = %key,
            file_name = %file.file_name,
            "Upload failed"
        );
        return FileOutcome::Failed {
            local_id,
            file_name: file.file_name.clone(),
            stage: FailureStage::Upload,
            error: e.into(),
        };
    }

    let new_upload = NewUpload {
        file_name: file.file_name.clone(),
        file_type: file.category,
        bucket: bucket.to_string(),
        size: file.size() as i64,
        uploaded_at,
    };

    match uploads.insert(new_upload).await {
        Ok(record) => FileOutcome::Persisted { local_id, record },
        Err(error) => {
            tracing::error!(
                error = %error,
                bucket = %bucket,
                key = %key,
                file_name = %file.file_name,
                "Metadata insert failed, removing uploaded blob"
            );

            let blob_removed = match storage.delete(bucket, &key).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %key,
                        "Failed to remove blob after metadata insert failure"
                    );
                    false
                }
            };

            FileOutcome::Failed {
                local_id,
                file_name: file.file_name.clone(),
                stage: FailureStage::Insert { blob_removed },
                error,
            }
        }
    }
}

fn set_progress(progress: &ProgressMap, local_id: Uuid, percent: f64) {
    let mut map = progress
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    map.insert(local_id, percent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{InMemoryUploadRepository, MockStorage, RecordingObserver};
    use crate::RefreshSignal;

    struct Fixture {
        storage: Arc<MockStorage>,
        uploads: Arc<InMemoryUploadRepository>,
        coordinator: UploadCoordinator,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MockStorage::new());
        let uploads = Arc::new(InMemoryUploadRepository::new());
        let coordinator =
            UploadCoordinator::new(storage.clone(), uploads.clone(), BucketConfig::default());
        Fixture {
            storage,
            uploads,
            coordinator,
        }
    }

    fn file(name: &str, size: usize) -> CandidateFile {
        CandidateFile::new(name, vec![1u8; size])
    }

    #[test]
    fn stage_accepts_allowed_extensions_only() {
        let mut f = fixture();

        let report = f.coordinator.stage(
            vec![file("model.pth", 10), file("notes.txt", 5), file("MODEL.ONNX", 3)],
            FileCategory::Model,
        );

        assert_eq!(report.accepted.len(), 2);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].file_name, "notes.txt");
        assert!(matches!(
            report.rejected[0].error,
            AppError::InvalidFileType { .. }
        ));
        assert_eq!(f.coordinator.pending().len(), 2);
    }

    #[test]
    fn stage_is_additive() {
        let mut f = fixture();
        f.coordinator
            .stage(vec![file("a.pt", 1)], FileCategory::Model);
        f.coordinator
            .stage(vec![file("b.csv", 1)], FileCategory::Dataset);

        let names: Vec<_> = f
            .coordinator
            .pending()
            .iter()
            .map(|p| p.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.pt", "b.csv"]);
    }

    #[test]
    fn stage_enforces_optional_size_limit() {
        let storage = Arc::new(MockStorage::new());
        let uploads = Arc::new(InMemoryUploadRepository::new());
        let mut coordinator = UploadCoordinator::new(storage, uploads, BucketConfig::default())
            .with_max_file_size(Some(100));

        let report = coordinator.stage(
            vec![file("small.csv", 100), file("big.csv", 101)],
            FileCategory::Dataset,
        );

        assert_eq!(report.accepted.len(), 1);
        assert!(matches!(
            report.rejected[0].error,
            AppError::PayloadTooLarge { size: 101, .. }
        ));
    }

    #[test]
    fn unstage_removes_file_and_is_noop_when_absent() {
        let mut f = fixture();
        let report = f
            .coordinator
            .stage(vec![file("a.pt", 1), file("b.pt", 1)], FileCategory::Model);

        assert!(f.coordinator.unstage(report.accepted[0]));
        assert_eq!(f.coordinator.pending().len(), 1);
        assert!(!f.coordinator.unstage(report.accepted[0]));
        assert!(!f.coordinator.unstage(Uuid::new_v4()));
        assert_eq!(f.coordinator.pending().len(), 1);
    }

    #[tokio::test]
    async fn empty_commit_does_no_io() {
        let mut f = fixture();
        let result = f.coordinator.commit().await;

        assert!(matches!(result, Err(AppError::EmptyBatch)));
        assert_eq!(f.storage.upload_calls(), 0);
        assert_eq!(f.uploads.insert_calls(), 0);
    }

    #[tokio::test]
    async fn commit_persists_blob_and_row() {
        let mut f = fixture();
        let observer = Arc::new(RecordingObserver::new());
        f.coordinator.subscribe(observer.clone());
        f.coordinator
            .stage(vec![file("model.pth", 1024)], FileCategory::Model);

        let summary = f.coordinator.commit().await.unwrap();

        assert_eq!(summary.attempted, 1);
        assert_eq!(summary.succeeded, 1);
        assert!(summary.all_succeeded());
        assert!(f.coordinator.is_empty());

        let rows = f.uploads.records();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.file_name, "model.pth");
        assert_eq!(row.file_type, FileCategory::Model);
        assert_eq!(row.bucket, "ml-models");
        assert_eq!(row.size, 1024);

        assert!(f.storage.has_blob("ml-models", &row.storage_key()));
        assert_eq!(observer.persisted_batches(), 1);
        assert_eq!(observer.finished_commits(), 1);
    }

    #[tokio::test]
    async fn progress_is_tracked_during_commit_and_cleared_after() {
        let mut f = fixture();
        let report = f
            .coordinator
            .stage(vec![file("data.csv", 64)], FileCategory::Dataset);
        let id = report.accepted[0];
        assert_eq!(f.coordinator.progress(id), None);

        f.storage.fail_uploads_for("data.csv");
        f.coordinator.commit().await.unwrap();
        // Failed files keep their last reported progress.
        assert_eq!(f.coordinator.progress(id), Some(0.0));

        f.storage.clear_failures();
        f.coordinator.commit().await.unwrap();
        assert_eq!(f.coordinator.progress(id), None);
        assert_eq!(f.storage.max_progress_reported(), Some(100.0));
    }

    #[tokio::test]
    async fn insert_failure_removes_uploaded_blob() {
        let mut f = fixture();
        let observer = Arc::new(RecordingObserver::new());
        f.coordinator.subscribe(observer.clone());
        f.uploads.fail_inserts_for("b.pt");
        f.coordinator.stage(
            vec![file("a.pt", 1), file("b.pt", 2), file("c.pt", 3)],
            FileCategory::Model,
        );

        let summary = f.coordinator.commit().await.unwrap();

        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.to_string(), "2/3 files uploaded successfully");
        assert_eq!(f.uploads.records().len(), 2);
        assert_eq!(f.storage.blob_count(), 2);
        assert_eq!(f.storage.delete_calls(), 1);

        let failed: Vec<_> = summary
            .outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Failed {
                    file_name, stage, ..
                } => Some((file_name.clone(), *stage)),
                _ => None,
            })
            .collect();
        assert_eq!(
            failed,
            vec![(
                "b.pt".to_string(),
                FailureStage::Insert { blob_removed: true }
            )]
        );

        // Only the failed file stays staged
        let names: Vec<_> = f
            .coordinator
            .pending()
            .iter()
            .map(|p| p.file_name.clone())
            .collect();
        assert_eq!(names, vec!["b.pt"]);

        assert_eq!(observer.persisted_batches(), 1);
        assert_eq!(observer.last_persisted_count(), 2);
        assert_eq!(observer.finished_commits(), 0);
    }

    #[tokio::test]
    async fn failed_compensation_is_reported() {
        let mut f = fixture();
        f.uploads.fail_inserts_for("a.pt");
        f.storage.fail_deletes(true);
        f.coordinator.stage(vec![file("a.pt", 1)], FileCategory::Model);

        let summary = f.coordinator.commit().await.unwrap();

        assert!(matches!(
            summary.outcomes[0],
            FileOutcome::Failed {
                stage: FailureStage::Insert {
                    blob_removed: false
                },
                ..
            }
        ));
        assert_eq!(f.storage.blob_count(), 1);
    }

    #[tokio::test]
    async fn upload_failure_skips_insert_and_keeps_others() {
        let mut f = fixture();
        f.storage.fail_uploads_for("bad.csv");
        f.coordinator.stage(
            vec![file("good.csv", 4), file("bad.csv", 4)],
            FileCategory::Dataset,
        );

        let summary = f.coordinator.commit().await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(f.uploads.insert_calls(), 1);
        assert_eq!(f.uploads.records()[0].bucket, "datasets");
        assert!(matches!(
            summary.outcomes[1],
            FileOutcome::Failed {
                stage: FailureStage::Upload,
                error: AppError::Storage(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn total_failure_does_not_notify_observers() {
        let mut f = fixture();
        let signal = RefreshSignal::new();
        f.coordinator.subscribe(Arc::new(signal.clone()));
        f.storage.fail_all_uploads(true);
        f.coordinator.stage(vec![file("a.pt", 1)], FileCategory::Model);

        let summary = f.coordinator.commit().await.unwrap();

        assert_eq!(summary.succeeded, 0);
        assert_eq!(signal.generation(), 0);
        assert_eq!(f.coordinator.pending().len(), 1);
    }

    #[tokio::test]
    async fn commit_key_matches_record_derived_key() {
        let mut f = fixture();
        f.coordinator
            .stage(vec![file("weights v2.h5", 8)], FileCategory::Model);
        f.coordinator.commit().await.unwrap();

        let record = &f.uploads.records()[0];
        let key = record.storage_key();
        assert!(key.ends_with("-weights v2.h5"));
        assert_eq!(
            key,
            format!("{}-weights v2.h5", record.uploaded_at.timestamp_millis())
        );
        assert!(f.storage.has_blob("ml-models", &key));
    }

    #[tokio::test]
    async fn same_name_in_one_batch_gets_distinct_blobs() {
        let mut f = fixture();
        f.coordinator.stage(
            vec![file("m.pt", 1), file("m.pt", 2), file("other.pt", 3)],
            FileCategory::Model,
        );

        let summary = f.coordinator.commit().await.unwrap();
        assert_eq!(summary.succeeded, 3);

        let rows = f.uploads.records();
        let mut keys: Vec<String> = rows.iter().map(|r| r.storage_key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), 3);
        assert_eq!(f.storage.blob_count(), 3);
        for row in &rows {
            assert!(f.storage.has_blob(&row.bucket, &row.storage_key()));
        }
    }

    #[tokio::test]
    async fn consecutive_commits_never_reuse_a_key() {
        let mut f = fixture();
        f.coordinator.stage(vec![file("m.pt", 1)], FileCategory::Model);
        f.coordinator.commit().await.unwrap();
        f.coordinator.stage(vec![file("m.pt", 2)], FileCategory::Model);
        f.coordinator.commit().await.unwrap();

        let rows = f.uploads.records();
        assert_eq!(rows.len(), 2);
        assert_ne!(rows[0].storage_key(), rows[1].storage_key());
        assert_eq!(f.storage.blob_count(), 2);
    }

    #[tokio::test]
    async fn deleting_one_duplicate_keeps_the_other_blob() {
        let mut f = fixture();
        f.coordinator
            .stage(vec![file("m.pt", 1), file("m.pt", 1)], FileCategory::Model);
        f.coordinator.commit().await.unwrap();

        let rows = f.uploads.records();
        f.storage
            .delete(&rows[0].bucket, &rows[0].storage_key())
            .await
            .unwrap();

        assert!(f.storage.has_blob(&rows[1].bucket, &rows[1].storage_key()));
    }
}
