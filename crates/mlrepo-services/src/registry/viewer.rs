use mlrepo_core::models::{ListQuery, SortKey, TypeFilter, UploadRecord};
use mlrepo_core::{AppError, ErrorMetadata, LogLevel};
use mlrepo_db::UploadRepository;
use mlrepo_storage::Storage;
use std::sync::Arc;
use tokio::sync::watch;

use super::types::{DeleteConfirmation, DeleteOutcome, DownloadTicket, SaveAs};
use crate::upload::RefreshSignal;

/// Lists persisted uploads and performs download and delete on them.
///
/// Holds the current filter, sort and search selection together with the last
/// listing (or the error that replaced it).
pub struct FileRegistryViewer {
    storage: Arc<dyn Storage>,
    uploads: Arc<dyn UploadRepository>,
    query: ListQuery,
    entries: Vec<UploadRecord>,
    last_error: Option<AppError>,
    refresh_rx: Option<watch::Receiver<u64>>,
}

impl FileRegistryViewer {
    pub fn new(storage: Arc<dyn Storage>, uploads: Arc<dyn UploadRepository>) -> Self {
        Self {
            storage,
            uploads,
            query: ListQuery::default(),
            entries: Vec::new(),
            last_error: None,
            refresh_rx: None,
        }
    }

    /// Re-list whenever `signal` reports newly persisted uploads.
    pub fn with_refresh_signal(mut self, signal: &RefreshSignal) -> Self {
        self.refresh_rx = Some(signal.subscribe());
        self
    }

    pub fn with_query(mut self, query: ListQuery) -> Self {
        self.query = query;
        self
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn entries(&self) -> &[UploadRecord] {
        &self.entries
    }

    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    /// Rows matching `query`: category filter and order come from the metadata
    /// table, the file name search is applied here.
    pub async fn list(&self, query: &ListQuery) -> Result<Vec<UploadRecord>, AppError> {
        let mut records = self
            .uploads
            .list(query.filter.category(), query.sort)
            .await?;
        records.retain(|record| query.matches_search(record));
        Ok(records)
    }

    /// Re-run the current query. Errors are logged and kept in `last_error`,
    /// leaving an empty listing.
    pub async fn refresh(&mut self) -> &[UploadRecord] {
        match self.list(&self.query).await {
            Ok(records) => {
                tracing::debug!(
                    filter = %self.query.filter,
                    sort = %self.query.sort,
                    count = records.len(),
                    "Registry listing refreshed"
                );
                self.entries = records;
                self.last_error = None;
            }
            Err(error) => {
                log_error(&error, "Failed to list uploads");
                self.entries.clear();
                self.last_error = Some(error);
            }
        }
        &self.entries
    }

    pub async fn set_filter(&mut self, filter: TypeFilter) -> &[UploadRecord] {
        if self.query.filter != filter {
            self.query.filter = filter;
            self.refresh().await;
        }
        &self.entries
    }

    pub async fn set_sort(&mut self, sort: SortKey) -> &[UploadRecord] {
        if self.query.sort != sort {
            self.query.sort = sort;
            self.refresh().await;
        }
        &self.entries
    }

    pub async fn set_search(&mut self, search: impl Into<String>) -> &[UploadRecord] {
        let search = search.into();
        if self.query.search != search {
            self.query.search = search;
            self.refresh().await;
        }
        &self.entries
    }

    pub async fn set_query(&mut self, query: ListQuery) -> &[UploadRecord] {
        if self.query != query {
            self.query = query;
            self.refresh().await;
        }
        &self.entries
    }

    /// Refresh if the attached signal fired since the last check. Never blocks.
    pub async fn poll_refresh(&mut self) -> bool {
        let changed = match self.refresh_rx.as_mut() {
            Some(rx) => match rx.has_changed() {
                Ok(true) => {
                    rx.borrow_and_update();
                    true
                }
                _ => false,
            },
            None => false,
        };

        if changed {
            self.refresh().await;
        }
        changed
    }

    /// Wait for the attached signal to fire, then refresh.
    pub async fn wait_for_refresh(&mut self) -> Result<&[UploadRecord], AppError> {
        let rx = self
            .refresh_rx
            .as_mut()
            .ok_or_else(|| AppError::Internal("No refresh signal attached".to_string()))?;

        rx.changed()
            .await
            .map_err(|_| AppError::Internal("Refresh signal closed".to_string()))?;
        rx.borrow_and_update();

        Ok(self.refresh().await)
    }

    /// Resolve the public URL of `record`'s blob and hand it to `sink`.
    pub async fn download(
        &self,
        record: &UploadRecord,
        sink: &dyn SaveAs,
    ) -> Result<DownloadTicket, AppError> {
        let key = record.storage_key();
        let url = self.storage.public_url(&record.bucket, &key)?;
        let ticket = DownloadTicket {
            url,
            suggested_name: record.file_name.clone(),
        };

        sink.save(&ticket).await?;

        tracing::info!(
            id = %record.id,
            bucket = %record.bucket,
            key = %key,
            "Download handed off"
        );

        Ok(ticket)
    }

    /// Delete `record` after confirmation: blob first, then the row.
    ///
    /// A failed blob delete leaves the row in place. A failed row delete after
    /// the blob is gone is reported as `AppError::OrphanedBlob` and not repaired.
    pub async fn delete(
        &mut self,
        record: &UploadRecord,
        confirmation: &dyn DeleteConfirmation,
    ) -> Result<DeleteOutcome, AppError> {
        if !confirmation.confirm(record) {
            tracing::debug!(id = %record.id, "Delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let key = record.storage_key();

        if let Err(e) = self.storage.delete(&record.bucket, &key).await {
            let error: AppError = e.into();
            log_error(&error, "Failed to delete blob, keeping metadata row");
            return Err(error);
        }

        match self.uploads.delete(record.id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    id = %record.id,
                    "Metadata row was already gone when deleting"
                );
            }
            Err(e) => {
                let error = AppError::OrphanedBlob {
                    bucket: record.bucket.clone(),
                    key,
                    reason: e.to_string(),
                };
                log_error(&error, "Blob deleted but metadata row was not");
                return Err(error);
            }
        }

        tracing::info!(
            id = %record.id,
            bucket = %record.bucket,
            key = %key,
            "Upload deleted"
        );

        self.refresh().await;
        Ok(DeleteOutcome::Deleted)
    }
}

fn log_error(error: &AppError, message: &str) {
    match error.log_level() {
        LogLevel::Debug => tracing::debug!(error = %error, code = error.error_code(), "{}", message),
        LogLevel::Warn => tracing::warn!(error = %error, code = error.error_code(), "{}", message),
        LogLevel::Error => {
            tracing::error!(error = %error, code = error.error_code(), "{}", message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{InMemoryUploadRepository, MockStorage, RecordingSaveAs};
    use chrono::{TimeZone, Utc};
    use mlrepo_core::models::FileCategory;
    use uuid::Uuid;

    fn record(name: &str, category: FileCategory, size: i64, ms: i64) -> UploadRecord {
        UploadRecord {
            id: Uuid::new_v4(),
            file_name: name.to_string(),
            file_type: category,
            bucket: match category {
                FileCategory::Model => "ml-models".to_string(),
                FileCategory::Dataset => "datasets".to_string(),
            },
            size,
            uploaded_at: Utc.timestamp_millis_opt(ms).unwrap(),
        }
    }

    struct Fixture {
        storage: Arc<MockStorage>,
        uploads: Arc<InMemoryUploadRepository>,
        viewer: FileRegistryViewer,
    }

    fn fixture(records: Vec<UploadRecord>) -> Fixture {
        let storage = Arc::new(MockStorage::new());
        let uploads = Arc::new(InMemoryUploadRepository::new());
        for r in records {
            storage.put_blob(&r.bucket, &r.storage_key(), vec![0u8; r.size as usize]);
            uploads.seed(r);
        }
        let viewer = FileRegistryViewer::new(storage.clone(), uploads.clone());
        Fixture {
            storage,
            uploads,
            viewer,
        }
    }

    fn names(records: &[UploadRecord]) -> Vec<&str> {
        records.iter().map(|r| r.file_name.as_str()).collect()
    }

    fn sample() -> Vec<UploadRecord> {
        vec![
            record("resnet.pt", FileCategory::Model, 300, 1_000),
            record("Iris.csv", FileCategory::Dataset, 100, 2_000),
            record("bert.onnx", FileCategory::Model, 200, 3_000),
        ]
    }

    #[tokio::test]
    async fn list_filters_and_sorts() {
        let f = fixture(sample());

        let all = f.viewer.list(&ListQuery::default()).await.unwrap();
        assert_eq!(names(&all), vec!["bert.onnx", "Iris.csv", "resnet.pt"]);

        let models = f
            .viewer
            .list(&ListQuery {
                filter: TypeFilter::Model,
                sort: SortKey::Size,
                search: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(names(&models), vec!["resnet.pt", "bert.onnx"]);

        let oldest = f
            .viewer
            .list(&ListQuery {
                sort: SortKey::Oldest,
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(names(&oldest), vec!["resnet.pt", "Iris.csv", "bert.onnx"]);
    }

    #[tokio::test]
    async fn search_is_case_insensitive() {
        let f = fixture(sample());

        let hits = f
            .viewer
            .list(&ListQuery {
                search: "IRIS".to_string(),
                ..ListQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(names(&hits), vec!["Iris.csv"]);
    }

    #[tokio::test]
    async fn setters_refresh_only_on_change() {
        let mut f = fixture(sample());
        f.viewer.refresh().await;
        assert_eq!(f.viewer.entries().len(), 3);

        let datasets = f.viewer.set_filter(TypeFilter::Dataset).await;
        assert_eq!(names(datasets), vec!["Iris.csv"]);

        f.viewer.set_filter(TypeFilter::All).await;
        f.viewer.set_sort(SortKey::Name).await;
        assert_eq!(
            names(f.viewer.entries()),
            vec!["Iris.csv", "bert.onnx", "resnet.pt"]
        );

        f.viewer.set_search("net").await;
        assert_eq!(names(f.viewer.entries()), vec!["resnet.pt"]);

        // Unchanged value does not re-list, so injected failures stay invisible
        f.uploads.fail_lists(true);
        f.viewer.set_search("net").await;
        assert!(f.viewer.last_error().is_none());
        assert_eq!(f.viewer.entries().len(), 1);
    }

    #[tokio::test]
    async fn refresh_keeps_error_and_empties_listing() {
        let mut f = fixture(sample());
        f.viewer.refresh().await;
        f.uploads.fail_lists(true);

        let entries = f.viewer.refresh().await;
        assert!(entries.is_empty());
        assert!(f.viewer.last_error().is_some());

        f.uploads.fail_lists(false);
        f.viewer.refresh().await;
        assert!(f.viewer.last_error().is_none());
        assert_eq!(f.viewer.entries().len(), 3);
    }

    #[tokio::test]
    async fn download_uses_record_key_and_bucket() {
        let records = sample();
        let target = records[1].clone();
        let f = fixture(records);
        let sink = RecordingSaveAs::new();

        let ticket = f.viewer.download(&target, &sink).await.unwrap();

        assert_eq!(ticket.suggested_name, "Iris.csv");
        assert_eq!(ticket.url, "https://storage.test/datasets/2000-Iris.csv");
        assert_eq!(sink.tickets(), vec![ticket]);
        assert_eq!(f.uploads.records().len(), 3);
    }

    #[tokio::test]
    async fn download_url_failure_touches_nothing() {
        let records = sample();
        let target = records[0].clone();
        let f = fixture(records);
        f.storage.fail_public_urls(true);
        let sink = RecordingSaveAs::new();

        let result = f.viewer.download(&target, &sink).await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(sink.tickets().is_empty());
        assert_eq!(f.uploads.records().len(), 3);
        assert_eq!(f.storage.blob_count(), 3);
        assert_eq!(f.storage.delete_calls(), 0);
        assert_eq!(f.uploads.delete_calls(), 0);
    }

    #[tokio::test]
    async fn download_propagates_sink_failure() {
        let records = sample();
        let target = records[2].clone();
        let f = fixture(records);
        let sink = RecordingSaveAs::failing();

        let result = f.viewer.download(&target, &sink).await;

        assert!(matches!(result, Err(AppError::Internal(_))));
        assert!(sink.tickets().is_empty());
        assert_eq!(f.uploads.records().len(), 3);
        assert!(f.storage.has_blob("ml-models", &target.storage_key()));
    }

    #[tokio::test]
    async fn delete_declined_does_nothing() {
        let records = sample();
        let target = records[0].clone();
        let mut f = fixture(records);

        let outcome = f
            .viewer
            .delete(&target, &|_: &UploadRecord| false)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Declined);
        assert_eq!(f.storage.delete_calls(), 0);
        assert_eq!(f.uploads.delete_calls(), 0);
    }

    #[tokio::test]
    async fn delete_removes_blob_then_row_and_refreshes() {
        let records = sample();
        let target = records[0].clone();
        let mut f = fixture(records);
        f.viewer.refresh().await;

        let outcome = f
            .viewer
            .delete(&target, &|_: &UploadRecord| true)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted);
        assert!(!f.storage.has_blob("ml-models", &target.storage_key()));
        assert_eq!(f.uploads.records().len(), 2);
        assert!(!names(f.viewer.entries()).contains(&"resnet.pt"));
    }

    #[tokio::test]
    async fn blob_delete_failure_keeps_row() {
        let records = sample();
        let target = records[0].clone();
        let mut f = fixture(records);
        f.storage.fail_deletes(true);

        let result = f.viewer.delete(&target, &|_: &UploadRecord| true).await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(f.uploads.delete_calls(), 0);
        let listed = f.viewer.list(&ListQuery::default()).await.unwrap();
        assert!(names(&listed).contains(&"resnet.pt"));
    }

    #[tokio::test]
    async fn row_delete_failure_reports_orphaned_blob() {
        let records = sample();
        let target = records[0].clone();
        let mut f = fixture(records);
        f.uploads.fail_deletes(true);

        let result = f.viewer.delete(&target, &|_: &UploadRecord| true).await;

        match result {
            Err(AppError::OrphanedBlob { bucket, key, .. }) => {
                assert_eq!(bucket, "ml-models");
                assert_eq!(key, "1000-resnet.pt");
            }
            other => panic!("expected OrphanedBlob, got {:?}", other),
        }
        assert!(!f.storage.has_blob("ml-models", "1000-resnet.pt"));
        assert_eq!(f.uploads.records().len(), 3);
    }

    #[tokio::test]
    async fn poll_refresh_follows_signal() {
        let signal = RefreshSignal::new();
        let mut f = fixture(sample());
        let storage = f.storage.clone();
        let uploads = f.uploads.clone();
        f.viewer = FileRegistryViewer::new(storage, uploads.clone()).with_refresh_signal(&signal);

        assert!(!f.viewer.poll_refresh().await);

        uploads.seed(record("new.parquet", FileCategory::Dataset, 5, 4_000));
        signal.notify();

        assert!(f.viewer.poll_refresh().await);
        assert_eq!(f.viewer.entries()[0].file_name, "new.parquet");
        assert!(!f.viewer.poll_refresh().await);
    }

    #[tokio::test]
    async fn wait_for_refresh_without_signal_is_an_error() {
        let mut f = fixture(Vec::new());
        assert!(f.viewer.wait_for_refresh().await.is_err());
    }
}
