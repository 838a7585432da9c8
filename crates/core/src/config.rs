//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Upload handling configuration.
///
/// The field names and size ceiling were module-level constants in earlier
/// iterations of this service; they are configuration now so deployments can
/// rename form fields without a rebuild.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Name of the required text field carrying the mockup name.
    #[serde(default = "default_metadata_field")]
    pub metadata_field: String,
    /// Name of the file field carrying the overlay image.
    #[serde(default = "default_file_field")]
    pub file_field: String,
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Wait for the object store write to complete before responding
    /// (default: true).
    ///
    /// When false, the response is sent as soon as the form has been fully
    /// received and validated; a store write that fails afterwards is only
    /// logged and never reaches the client.
    #[serde(default = "default_await_store_write")]
    pub await_store_write: bool,
}

fn default_metadata_field() -> String {
    "mockup_name".to_string()
}

fn default_file_field() -> String {
    "overlay_image".to_string()
}

fn default_max_file_size() -> u64 {
    crate::DEFAULT_MAX_FILE_SIZE
}

fn default_await_store_write() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            metadata_field: default_metadata_field(),
            file_field: default_file_field(),
            max_file_size: default_max_file_size(),
            await_store_write: default_await_store_write(),
        }
    }
}

impl UploadConfig {
    /// Validate upload configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.metadata_field.is_empty() {
            return Err("upload.metadata_field cannot be empty".to_string());
        }
        if self.file_field.is_empty() {
            return Err("upload.file_field cannot be empty".to_string());
        }
        if self.metadata_field == self.file_field {
            return Err(format!(
                "upload.metadata_field and upload.file_field must differ (both are '{}')",
                self.metadata_field
            ));
        }
        if self.max_file_size == 0 {
            return Err("upload.max_file_size cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to the ambient credential chain if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (e.g., `endpoint/bucket/key` instead of
        /// `bucket.endpoint/key`). Required for MinIO and some S3-compatible
        /// services. Defaults to false (virtual-hosted style).
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/uploads"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload handling configuration.
    #[serde(default)]
    pub upload: UploadConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage under `./data/uploads`.
    pub fn for_testing() -> Self {
        Self::default()
    }
}
