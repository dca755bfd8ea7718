use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Category a file is uploaded under.
///
/// Each category has its own extension allow-list and its own storage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Model,
    Dataset,
}

const MODEL_EXTENSIONS: &[&str] = &["pkl", "onnx", "h5", "pt", "pth"];
const DATASET_EXTENSIONS: &[&str] = &["csv", "json", "zip", "parquet"];

impl FileCategory {
    pub const ALL: [FileCategory; 2] = [FileCategory::Model, FileCategory::Dataset];

    /// Allowed extensions, lowercase and without the leading dot.
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            FileCategory::Model => MODEL_EXTENSIONS,
            FileCategory::Dataset => DATASET_EXTENSIONS,
        }
    }

    /// Human-readable list of allowed extensions, e.g. ".pkl, .onnx, .h5, .pt, .pth".
    pub fn allowed_extensions_hint(&self) -> String {
        self.allowed_extensions()
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Model => "model",
            FileCategory::Dataset => "dataset",
        }
    }
}

impl FromStr for FileCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "model" => Ok(FileCategory::Model),
            "dataset" => Ok(FileCategory::Dataset),
            _ => Err(anyhow::anyhow!(
                "Invalid file category: {}. Must be 'model' or 'dataset'",
                s
            )),
        }
    }
}

impl Display for FileCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
