use crate::models::UploadResult;
use crate::utils::hash::calculate_hash;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

/// Prefix under which every ingested file is stored.
pub const UPLOAD_PREFIX: &str = "uploads";

/// Characters escaped when a key is embedded in a location URL. `/` is kept
/// so the key's prefix stays readable.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const AUTH_ERROR_CODES: &[&str] = &[
    "AccessDenied",
    "AccountProblem",
    "ExpiredToken",
    "InvalidAccessKeyId",
    "InvalidToken",
    "SignatureDoesNotMatch",
];

const QUOTA_ERROR_CODES: &[&str] = &[
    "QuotaExceeded",
    "RequestLimitExceeded",
    "SlowDown",
    "TooManyRequests",
];

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("storage authentication failed: {0}")]
    Auth(String),

    #[error("storage unreachable: {0}")]
    Network(String),

    #[error("storage quota exceeded: {0}")]
    Quota(String),

    #[error("failed to read upload source: {0}")]
    Io(String),

    #[error("storage service error: {0}")]
    Service(String),
}

/// Destination key for an uploaded file.
///
/// The key depends only on the original filename, so a second upload with
/// the same name overwrites the first (last write wins).
pub fn object_key(original_filename: &str) -> String {
    format!("{}/{}", UPLOAD_PREFIX, original_filename)
}

/// Durable blob storage addressed by key.
///
/// Implementations make a single attempt per call. Retry or backoff policies
/// belong in a wrapper that implements this trait around another store.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streams the file at `path` to `key`, creating or replacing the object.
    async fn put_file(&self, key: &str, path: &Path) -> Result<UploadResult, UploadError>;

    /// Fetches an object's bytes, `None` if the key does not exist.
    async fn get_object(&self, key: &str) -> Result<Option<Bytes>, UploadError>;

    /// Check if the store is reachable
    async fn health_check(&self) -> bool;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    location_base: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String, location_base: String) -> Self {
        Self {
            client,
            bucket,
            location_base: location_base.trim_end_matches('/').to_string(),
        }
    }

    /// Store on AWS S3, reporting virtual-hosted style locations.
    pub fn aws(client: Client, bucket: String, region: &str) -> Self {
        let base = format!("https://{}.s3.{}.amazonaws.com", bucket, region);
        Self::new(client, bucket, base)
    }

    /// Store on an S3-compatible endpoint (MinIO, LocalStack) using path
    /// style locations.
    pub fn with_endpoint(client: Client, bucket: String, endpoint: &str) -> Self {
        let base = format!("{}/{}", endpoint.trim_end_matches('/'), bucket);
        Self::new(client, bucket, base)
    }

    pub fn location(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.location_base,
            utf8_percent_encode(key, KEY_ENCODE_SET)
        )
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, key: &str, path: &Path) -> Result<UploadResult, UploadError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| UploadError::Io(e.to_string()))?;

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        Ok(UploadResult {
            location: self.location(key),
            key: key.to_string(),
            etag: output.e_tag().map(|t| t.trim_matches('"').to_string()),
        })
    }

    async fn get_object(&self, key: &str) -> Result<Option<Bytes>, UploadError> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| UploadError::Network(e.to_string()))?;
                Ok(Some(data.into_bytes()))
            }
            Err(e) => {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    Ok(None)
                } else {
                    Err(classify_sdk_error(e))
                }
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
    }
}

fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> UploadError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => UploadError::Network(detail),
        _ => classify_error_code(err.code(), detail),
    }
}

fn classify_error_code(code: Option<&str>, detail: String) -> UploadError {
    match code {
        Some(c) if AUTH_ERROR_CODES.contains(&c) => UploadError::Auth(detail),
        Some(c) if QUOTA_ERROR_CODES.contains(&c) => UploadError::Quota(detail),
        _ => UploadError::Service(detail),
    }
}

/// Process-local store. Integrity tags are SHA-256 digests of the content.
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, Bytes>>,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait::async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_file(&self, key: &str, path: &Path) -> Result<UploadResult, UploadError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::Io(e.to_string()))?;
        let etag = calculate_hash(&data);

        self.objects
            .write()
            .await
            .insert(key.to_string(), Bytes::from(data));

        Ok(UploadResult {
            location: format!("memory://{}/{}", self.bucket, key),
            key: key.to_string(),
            etag: Some(etag),
        })
    }

    async fn get_object(&self, key: &str) -> Result<Option<Bytes>, UploadError> {
        Ok(self.objects.read().await.get(key).cloned())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};

    fn offline_client() -> Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-central-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .build();
        Client::from_conf(config)
    }

    #[test]
    fn test_object_key_uses_original_filename() {
        assert_eq!(object_key("people.csv"), "uploads/people.csv");
        assert_eq!(object_key("my data.csv"), "uploads/my data.csv");
    }

    #[test]
    fn test_aws_location() {
        let store = S3ObjectStore::aws(offline_client(), "bucket-a".to_string(), "eu-central-1");
        assert_eq!(
            store.location("uploads/my data.csv"),
            "https://bucket-a.s3.eu-central-1.amazonaws.com/uploads/my%20data.csv"
        );
    }

    #[test]
    fn test_endpoint_location() {
        let store = S3ObjectStore::with_endpoint(
            offline_client(),
            "bucket-a".to_string(),
            "http://127.0.0.1:9000/",
        );
        assert_eq!(
            store.location("uploads/a.csv"),
            "http://127.0.0.1:9000/bucket-a/uploads/a.csv"
        );
    }

    #[test]
    fn test_error_code_classification() {
        assert!(matches!(
            classify_error_code(Some("AccessDenied"), String::new()),
            UploadError::Auth(_)
        ));
        assert!(matches!(
            classify_error_code(Some("SlowDown"), String::new()),
            UploadError::Quota(_)
        ));
        assert!(matches!(
            classify_error_code(Some("NoSuchBucket"), String::new()),
            UploadError::Service(_)
        ));
        assert!(matches!(
            classify_error_code(None, String::new()),
            UploadError::Service(_)
        ));
    }

    #[tokio::test]
    async fn test_in_memory_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.csv");
        tokio::fs::write(&path, b"name,age\nJohn,30").await.unwrap();

        let store = InMemoryObjectStore::new("test-bucket");
        let result = store.put_file("uploads/a.csv", &path).await.unwrap();

        assert_eq!(result.key, "uploads/a.csv");
        assert_eq!(result.location, "memory://test-bucket/uploads/a.csv");
        assert_eq!(result.etag.as_deref(), Some(calculate_hash(b"name,age\nJohn,30").as_str()));

        let stored = store.get_object("uploads/a.csv").await.unwrap().unwrap();
        assert_eq!(&stored[..], b"name,age\nJohn,30");
        assert!(store.get_object("uploads/other.csv").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        tokio::fs::write(&first, b"v1").await.unwrap();
        tokio::fs::write(&second, b"v2").await.unwrap();

        let store = InMemoryObjectStore::new("b");
        store.put_file("uploads/same.csv", &first).await.unwrap();
        store.put_file("uploads/same.csv", &second).await.unwrap();

        assert_eq!(store.keys().await, vec!["uploads/same.csv".to_string()]);
        let stored = store.get_object("uploads/same.csv").await.unwrap().unwrap();
        assert_eq!(&stored[..], b"v2");
    }

    #[tokio::test]
    async fn test_in_memory_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryObjectStore::new("b");
        let err = store
            .put_file("uploads/x.csv", &dir.path().join("gone"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Io(_)));
    }
}
