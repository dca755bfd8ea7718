//! Shared constants

/// Name of the metadata table.
pub const UPLOADS_TABLE: &str = "uploads";

/// Default bucket for `model` uploads.
pub const DEFAULT_MODELS_BUCKET: &str = "ml-models";

/// Default bucket for `dataset` uploads.
pub const DEFAULT_DATASETS_BUCKET: &str = "datasets";
