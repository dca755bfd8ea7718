use async_trait::async_trait;
use mlrepo_core::models::UploadRecord;
use mlrepo_core::AppError;

/// Where to fetch a blob from and what to call it locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTicket {
    pub url: String,
    pub suggested_name: String,
}

/// Receives a resolved download (a browser "save as", a file writer, ...).
#[async_trait]
pub trait SaveAs: Send + Sync {
    async fn save(&self, ticket: &DownloadTicket) -> Result<(), AppError>;
}

/// Asks the user to confirm a delete.
pub trait DeleteConfirmation {
    fn confirm(&self, record: &UploadRecord) -> bool;
}

impl<F> DeleteConfirmation for F
where
    F: Fn(&UploadRecord) -> bool,
{
    fn confirm(&self, record: &UploadRecord) -> bool {
        self(record)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The user declined; nothing was touched.
    Declined,
    /// Blob and row are both gone.
    Deleted,
}
