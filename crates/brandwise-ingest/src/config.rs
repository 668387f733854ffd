//! Configuration management
//!
//! Compiled defaults, overridden by `.env` / `BRANDWISE_*` environment
//! variables, overridden in turn by CLI flags (see `main.rs`).

use crate::error::{IngestError, Result};
use crate::partition::{BrandCasing, PartitionLayout};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default feed API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.bazaarvoice.com";

/// API version sent with every request.
pub const DEFAULT_API_VERSION: &str = "5.4";

/// Default data directory (working file, archives, cursor, failure log).
pub const DEFAULT_DATA_DIR: &str = ".";

/// Default root of the per-brand partition files.
pub const DEFAULT_PARTITION_DIR: &str = "Brands";

/// Default destination of distributed source files.
pub const DEFAULT_ARCHIVE_DIR: &str = "Archives";

/// Name of the file fetched rows are appended to.
pub const DEFAULT_WORKING_FILE_NAME: &str = "Reviews.csv";

/// Name of the cursor file inside the data directory.
pub const DEFAULT_CURSOR_FILE_NAME: &str = "checkpoint.json";

/// Name of the passkey fallback file inside the data directory.
pub const PASSKEY_FILE_NAME: &str = "passkey.config";

/// Default records per page. Also the API maximum.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of rows grouped at a time during distribution.
pub const DEFAULT_CHUNK_ROWS: usize = 5_000;

/// Ingestion and distribution configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub api_base_url: String,
    #[serde(default, skip_serializing)]
    pub passkey: Option<String>,
    pub api_version: String,
    pub data_dir: PathBuf,
    pub working_file_name: String,
    pub cursor_file_name: String,
    pub page_size: u64,
    pub timeout_secs: u64,
    pub partition_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub casing: BrandCasing,
    pub layout: PartitionLayout,
    pub chunk_rows: usize,
}

/// Everything the partition engine needs, resolved against the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionConfig {
    pub source_dir: PathBuf,
    pub partition_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub working_file_name: String,
    pub casing: BrandCasing,
    pub layout: PartitionLayout,
    pub chunk_rows: usize,
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by whichever `BRANDWISE_*` variables are set.
    ///
    /// A variable that is set but unparsable is an error rather than being
    /// silently replaced by the default.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            api_base_url: env_string("BRANDWISE_API_BASE_URL").unwrap_or(defaults.api_base_url),
            passkey: env_string("BRANDWISE_PASSKEY"),
            api_version: defaults.api_version,
            data_dir: env_string("BRANDWISE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            working_file_name: defaults.working_file_name,
            cursor_file_name: defaults.cursor_file_name,
            page_size: env_parse("BRANDWISE_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            timeout_secs: env_parse("BRANDWISE_TIMEOUT_SECS")?.unwrap_or(defaults.timeout_secs),
            partition_dir: env_string("BRANDWISE_PARTITION_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.partition_dir),
            archive_dir: env_string("BRANDWISE_ARCHIVE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.archive_dir),
            casing: env_parse("BRANDWISE_BRAND_CASING")?.unwrap_or(defaults.casing),
            layout: env_parse("BRANDWISE_LAYOUT")?.unwrap_or(defaults.layout),
            chunk_rows: env_parse("BRANDWISE_CHUNK_ROWS")?.unwrap_or(defaults.chunk_rows),
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(IngestError::config("API base URL cannot be empty"));
        }

        if self.page_size == 0 || self.page_size > DEFAULT_PAGE_SIZE {
            return Err(IngestError::config(format!(
                "Page size must be between 1 and {DEFAULT_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }

        if self.timeout_secs == 0 {
            return Err(IngestError::config("Request timeout must be greater than 0"));
        }

        if self.chunk_rows == 0 {
            return Err(IngestError::config("Chunk size must be greater than 0"));
        }

        if self.working_file_name.trim().is_empty() || self.cursor_file_name.trim().is_empty() {
            return Err(IngestError::config("Working and cursor file names cannot be empty"));
        }

        Ok(())
    }

    pub fn working_file_path(&self) -> PathBuf {
        self.data_dir.join(&self.working_file_name)
    }

    pub fn cursor_path(&self) -> PathBuf {
        self.data_dir.join(&self.cursor_file_name)
    }

    pub fn passkey_path(&self) -> PathBuf {
        self.data_dir.join(PASSKEY_FILE_NAME)
    }

    pub fn failure_log_path(&self) -> PathBuf {
        self.data_dir.join(crate::diagnostics::FAILURE_LOG_NAME)
    }

    /// The API passkey: the configured value, else the contents of
    /// `passkey.config` in the data directory.
    pub fn resolve_passkey(&self) -> Result<String> {
        if let Some(passkey) = self.passkey.as_deref().map(str::trim) {
            if !passkey.is_empty() {
                return Ok(passkey.to_string());
            }
        }

        let path = self.passkey_path();
        match std::fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => Ok(contents.trim().to_string()),
            Ok(_) => Err(missing_passkey(&path)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(missing_passkey(&path)),
            Err(e) => Err(e.into()),
        }
    }

    /// Relative paths are taken to be inside the data directory.
    fn under_data_dir(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn partition(&self) -> PartitionConfig {
        PartitionConfig {
            source_dir: self.data_dir.clone(),
            partition_dir: self.under_data_dir(&self.partition_dir),
            archive_dir: self.under_data_dir(&self.archive_dir),
            working_file_name: self.working_file_name.clone(),
            casing: self.casing,
            layout: self.layout,
            chunk_rows: self.chunk_rows,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            passkey: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            working_file_name: DEFAULT_WORKING_FILE_NAME.to_string(),
            cursor_file_name: DEFAULT_CURSOR_FILE_NAME.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            partition_dir: PathBuf::from(DEFAULT_PARTITION_DIR),
            archive_dir: PathBuf::from(DEFAULT_ARCHIVE_DIR),
            casing: BrandCasing::default(),
            layout: PartitionLayout::default(),
            chunk_rows: DEFAULT_CHUNK_ROWS,
        }
    }
}

fn missing_passkey(path: &Path) -> IngestError {
    IngestError::config(format!(
        "No API passkey configured. Set BRANDWISE_PASSKEY, pass --passkey, or write it to {}",
        path.display()
    ))
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| IngestError::config(format!("Invalid {key} value '{raw}': {e}")))
        })
        .transpose()
}
