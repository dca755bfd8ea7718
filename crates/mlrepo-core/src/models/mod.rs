//! Domain models for the upload registry

pub mod category;
pub mod query;
pub mod upload;

pub use category::FileCategory;
pub use query::{ListQuery, SortColumn, SortKey, TypeFilter};
pub use upload::{NewUpload, UploadRecord};
