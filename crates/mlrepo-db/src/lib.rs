//! mlrepo database layer
//!
//! Connection pool setup, migrations and the `uploads` metadata repository.

pub mod db;

pub use db::{connect, run_migrations, PgUploadRepository, UploadRepository, UploadRow};
