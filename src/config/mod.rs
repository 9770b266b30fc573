use std::env;
use std::path::PathBuf;

/// Which object store the service writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Memory,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "s3" => Some(Self::S3),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

/// Process configuration for the ingestion service
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: "0.0.0.0")
    pub host: String,

    /// Listen port (default: 3000)
    pub port: u16,

    /// AWS region of the bucket (default: "eu-central-1")
    pub aws_region: String,

    /// Destination bucket (default: "case-bucket-ounass")
    pub s3_bucket: String,

    /// Custom S3-compatible endpoint, e.g. MinIO (default: none)
    pub s3_endpoint: Option<String>,

    /// Directory served under /shared (default: "/tmp/shared")
    pub shared_dir: PathBuf,

    /// Directory holding staged uploads (default: "uploads")
    pub staging_dir: PathBuf,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Object store backend (default: S3)
    pub storage_backend: StorageBackend,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            aws_region: "eu-central-1".to_string(),
            s3_bucket: "case-bucket-ounass".to_string(),
            s3_endpoint: None,
            shared_dir: PathBuf::from("/tmp/shared"),
            staging_dir: PathBuf::from("uploads"),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            storage_backend: StorageBackend::S3,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();

        Self {
            host: var("HOST").unwrap_or(default.host),

            port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.port),

            aws_region: var("AWS_REGION").unwrap_or(default.aws_region),

            s3_bucket: var("S3_BUCKET").unwrap_or(default.s3_bucket),

            s3_endpoint: var("S3_ENDPOINT").filter(|v| !v.trim().is_empty()),

            shared_dir: var("SHARED_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.shared_dir),

            staging_dir: var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            max_file_size: var("MAX_FILE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            storage_backend: var("STORAGE_BACKEND")
                .and_then(|v| StorageBackend::parse(&v))
                .unwrap_or(default.storage_backend),
        }
    }

    /// Create config for development (in-memory store, scratch directories)
    pub fn development() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            s3_bucket: "dev-bucket".to_string(),
            shared_dir: env::temp_dir().join("csv-ingest-shared"),
            staging_dir: env::temp_dir().join("csv-ingest-staging"),
            storage_backend: StorageBackend::Memory,
            ..Self::default()
        }
    }
}
