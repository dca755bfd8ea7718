//! Validation modules

pub mod file;

pub use file::{file_extension, validate_file_size, validate_file_type};
