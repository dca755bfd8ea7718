//! Configuration module
//!
//! Backend endpoint, credentials and bucket names are injected through the
//! environment (optionally from a `.env` file). Nothing in the upload or
//! listing logic reads the environment directly; it receives a `Config`.

use std::env;

use crate::constants::{DEFAULT_DATASETS_BUCKET, DEFAULT_MODELS_BUCKET};
use crate::models::FileCategory;
use crate::storage_types::StorageBackend;

const MAX_CONNECTIONS: u32 = 5;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Bucket names, one per file category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketConfig {
    pub models: String,
    pub datasets: String,
}

impl BucketConfig {
    pub fn bucket_for(&self, category: FileCategory) -> &str {
        match category {
            FileCategory::Model => &self.models,
            FileCategory::Dataset => &self.datasets,
        }
    }

    /// All configured bucket names.
    pub fn names(&self) -> [&str; 2] {
        [&self.models, &self.datasets]
    }
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS_BUCKET.to_string(),
            datasets: DEFAULT_DATASETS_BUCKET.to_string(),
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub storage_backend: Option<StorageBackend>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers
    pub aws_region: Option<String>,
    pub storage_public_url: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    pub buckets: BucketConfig,
    pub max_file_size_bytes: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match var("STORAGE_BACKEND") {
            Some(s) => Some(s.parse::<StorageBackend>()?),
            None => None,
        };

        let max_file_size_bytes = match var("MAX_UPLOAD_SIZE_MB") {
            Some(s) => Some(
                s.trim()
                    .parse::<u64>()
                    .map_err(|_| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be a valid number"))?
                    .checked_mul(1024 * 1024)
                    .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_SIZE_MB is too large"))?,
            ),
            None => None,
        };

        let defaults = BucketConfig::default();
        let buckets = BucketConfig {
            models: var("MODELS_BUCKET").unwrap_or(defaults.models),
            datasets: var("DATASETS_BUCKET").unwrap_or(defaults.datasets),
        };

        let config = Config {
            environment,
            database_url: var("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
            storage_backend,
            s3_region: var("S3_REGION"),
            s3_endpoint: var("S3_ENDPOINT"),
            aws_region: var("AWS_REGION"),
            storage_public_url: var("STORAGE_PUBLIC_URL"),
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL"),
            buckets,
            max_file_size_bytes,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.database_url.starts_with("postgres://")
            && !self.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.buckets.models == self.buckets.datasets {
            return Err(anyhow::anyhow!(
                "MODELS_BUCKET and DATASETS_BUCKET must name different buckets"
            ));
        }

        match self.storage_backend() {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.storage_backend.unwrap_or(StorageBackend::S3)
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn storage_public_url(&self) -> Option<&str> {
        self.storage_public_url.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.local_storage_base_url.as_deref()
    }

    pub fn bucket_for(&self, category: FileCategory) -> &str {
        self.buckets.bucket_for(category)
    }
}
