//! Database repositories for the data access layer
//
// Pool creation and migrations
pub mod setup;
//
// Upload metadata (`uploads` table)
pub mod uploads;

pub use setup::{connect, run_migrations};
pub use uploads::{PgUploadRepository, UploadRepository, UploadRow};
