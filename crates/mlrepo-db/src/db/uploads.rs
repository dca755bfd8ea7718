//! Upload metadata repository: insert, list, get and delete rows of the `uploads` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mlrepo_core::models::{FileCategory, NewUpload, SortKey, UploadRecord};
use mlrepo_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

const UPLOAD_COLUMNS: &str = "id, file_name, file_type, bucket, size, uploaded_at";

/// Row type for the uploads table (for FromRow).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UploadRow {
    pub id: Uuid,
    pub file_name: String,
    pub file_type: String,
    pub bucket: String,
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

impl TryFrom<UploadRow> for UploadRecord {
    type Error = AppError;

    fn try_from(row: UploadRow) -> Result<Self, Self::Error> {
        let file_type = row.file_type.parse::<FileCategory>().map_err(|e| {
            AppError::Internal(format!("Row {} has an invalid file_type: {}", row.id, e))
        })?;

        Ok(UploadRecord {
            id: row.id,
            file_name: row.file_name,
            file_type,
            bucket: row.bucket,
            size: row.size,
            uploaded_at: row.uploaded_at,
        })
    }
}

/// Access to upload metadata.
///
/// The Postgres implementation is the production one; tests substitute an
/// in-memory store.
#[async_trait]
pub trait UploadRepository: Send + Sync {
    /// Insert a row and return it with its assigned id.
    async fn insert(&self, upload: NewUpload) -> Result<UploadRecord, AppError>;

    /// All rows, optionally restricted to one category, in `sort` order.
    async fn list(
        &self,
        file_type: Option<FileCategory>,
        sort: SortKey,
    ) -> Result<Vec<UploadRecord>, AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, AppError>;

    /// Delete a row. Returns false when no row had this id.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}

/// `ORDER BY` clause for a sort key. Ties fall back to `id` so listings are stable.
fn order_by_clause(sort: SortKey) -> String {
    let (column, ascending) = sort.order();
    let direction = if ascending { "ASC" } else { "DESC" };
    format!("ORDER BY {} {}, id ASC", column.as_str(), direction)
}

/// Repository for the uploads table.
#[derive(Clone)]
pub struct PgUploadRepository {
    pool: PgPool,
}

impl PgUploadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UploadRepository for PgUploadRepository {
    #[tracing::instrument(skip(self), fields(db.table = "uploads", db.operation = "insert"))]
    async fn insert(&self, upload: NewUpload) -> Result<UploadRecord, AppError> {
        let row = sqlx::query_as::<Postgres, UploadRow>(&format!(
            r#"
            INSERT INTO uploads (file_name, file_type, bucket, size, uploaded_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            UPLOAD_COLUMNS
        ))
        .bind(&upload.file_name)
        .bind(upload.file_type.as_str())
        .bind(&upload.bucket)
        .bind(upload.size)
        .bind(upload.uploaded_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    #[tracing::instrument(skip(self), fields(db.table = "uploads", db.operation = "select"))]
    async fn list(
        &self,
        file_type: Option<FileCategory>,
        sort: SortKey,
    ) -> Result<Vec<UploadRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM uploads WHERE ($1::text IS NULL OR file_type = $1) {}",
            UPLOAD_COLUMNS,
            order_by_clause(sort)
        );

        let rows = sqlx::query_as::<Postgres, UploadRow>(&sql)
            .bind(file_type.map(|c| c.as_str()))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(UploadRecord::try_from).collect()
    }

    #[tracing::instrument(skip(self), fields(db.table = "uploads", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> Result<Option<UploadRecord>, AppError> {
        let row = sqlx::query_as::<Postgres, UploadRow>(&format!(
            "SELECT {} FROM uploads WHERE id = $1",
            UPLOAD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UploadRecord::try_from).transpose()
    }

    #[tracing::instrument(skip(self), fields(db.table = "uploads", db.operation = "delete", db.record_id = %id))]
    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM uploads WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
