//! Listing parameters for the file registry: type filter, sort order and search text.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::category::FileCategory;
use super::upload::UploadRecord;

/// Restricts a listing to one category, or shows everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeFilter {
    #[default]
    All,
    Model,
    Dataset,
}

impl TypeFilter {
    /// The category to filter on, or `None` for `All`.
    pub fn category(&self) -> Option<FileCategory> {
        match self {
            TypeFilter::All => None,
            TypeFilter::Model => Some(FileCategory::Model),
            TypeFilter::Dataset => Some(FileCategory::Dataset),
        }
    }
}

impl From<FileCategory> for TypeFilter {
    fn from(category: FileCategory) -> Self {
        match category {
            FileCategory::Model => TypeFilter::Model,
            FileCategory::Dataset => TypeFilter::Dataset,
        }
    }
}

impl FromStr for TypeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(TypeFilter::All),
            "model" => Ok(TypeFilter::Model),
            "dataset" => Ok(TypeFilter::Dataset),
            _ => Err(anyhow::anyhow!(
                "Invalid type filter: {}. Must be 'all', 'model' or 'dataset'",
                s
            )),
        }
    }
}

impl Display for TypeFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            TypeFilter::All => write!(f, "all"),
            TypeFilter::Model => write!(f, "model"),
            TypeFilter::Dataset => write!(f, "dataset"),
        }
    }
}

/// Column a sort key orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    UploadedAt,
    FileName,
    Size,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::UploadedAt => "uploaded_at",
            SortColumn::FileName => "file_name",
            SortColumn::Size => "size",
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// `uploaded_at` descending
    #[default]
    Newest,
    /// `uploaded_at` ascending
    Oldest,
    /// `file_name` ascending
    Name,
    /// `size` descending
    Size,
}

impl SortKey {
    /// (column, ascending)
    pub fn order(&self) -> (SortColumn, bool) {
        match self {
            SortKey::Newest => (SortColumn::UploadedAt, false),
            SortKey::Oldest => (SortColumn::UploadedAt, true),
            SortKey::Name => (SortColumn::FileName, true),
            SortKey::Size => (SortColumn::Size, false),
        }
    }

    /// Sort records in memory the same way the metadata table orders them.
    pub fn sort(&self, records: &mut [UploadRecord]) {
        match self {
            SortKey::Newest => records.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at)),
            SortKey::Oldest => records.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at)),
            SortKey::Name => records.sort_by(|a, b| a.file_name.cmp(&b.file_name)),
            SortKey::Size => records.sort_by(|a, b| b.size.cmp(&a.size)),
        }
    }
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            _ => Err(anyhow::anyhow!(
                "Invalid sort key: {}. Must be 'newest', 'oldest', 'name' or 'size'",
                s
            )),
        }
    }
}

impl Display for SortKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            SortKey::Newest => write!(f, "newest"),
            SortKey::Oldest => write!(f, "oldest"),
            SortKey::Name => write!(f, "name"),
            SortKey::Size => write!(f, "size"),
        }
    }
}

/// Full set of listing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListQuery {
    pub filter: TypeFilter,
    pub sort: SortKey,
    pub search: String,
}

impl ListQuery {
    /// Case-insensitive substring match on the file name. An empty search matches everything.
    pub fn matches_search(&self, record: &UploadRecord) -> bool {
        if self.search.is_empty() {
            return true;
        }
        record
            .file_name
            .to_lowercase()
            .contains(&self.search.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn record(name: &str, size: i64, ms: i64) -> UploadRecord {
        UploadRecord {
            id: Uuid::new_v4(),
            file_name: name.to_string(),
            file_type: FileCategory::Model,
            bucket: "ml-models".to_string(),
            size,
            uploaded_at: Utc.timestamp_millis_opt(ms).unwrap(),
        }
    }

    #[test]
    fn sort_keys_map_to_columns() {
        assert_eq!(SortKey::Newest.order(), (SortColumn::UploadedAt, false));
        assert_eq!(SortKey::Oldest.order(), (SortColumn::UploadedAt, true));
        assert_eq!(SortKey::Name.order(), (SortColumn::FileName, true));
        assert_eq!(SortKey::Size.order(), (SortColumn::Size, false));
    }

    #[test]
    fn in_memory_sort_matches_order() {
        let mut records = vec![
            record("b.pt", 10, 2_000),
            record("a.pt", 30, 1_000),
            record("c.pt", 20, 3_000),
        ];

        SortKey::Newest.sort(&mut records);
        assert_eq!(records[0].file_name, "c.pt");

        SortKey::Oldest.sort(&mut records);
        assert_eq!(records[0].file_name, "a.pt");

        SortKey::Name.sort(&mut records);
        assert_eq!(records[2].file_name, "c.pt");

        SortKey::Size.sort(&mut records);
        assert_eq!(records[0].size, 30);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let query = ListQuery {
            search: "FOO".to_string(),
            ..Default::default()
        };
        assert!(query.matches_search(&record("my_foo_model.pt", 1, 0)));
        assert!(!query.matches_search(&record("bar.pt", 1, 0)));
        assert!(ListQuery::default().matches_search(&record("bar.pt", 1, 0)));
    }

    #[test]
    fn filter_parses_and_maps_to_category() {
        assert_eq!("all".parse::<TypeFilter>().unwrap().category(), None);
        assert_eq!(
            "dataset".parse::<TypeFilter>().unwrap().category(),
            Some(FileCategory::Dataset)
        );
        assert!("images".parse::<TypeFilter>().is_err());
        assert!("largest".parse::<SortKey>().is_err());
    }
}
