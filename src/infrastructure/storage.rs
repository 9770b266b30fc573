use crate::config::{AppConfig, StorageBackend};
use crate::services::storage::{InMemoryObjectStore, ObjectStore, S3ObjectStore};
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::info;

/// Builds the object store once at startup; it is shared by every request
/// through the application state.
pub async fn setup_storage(config: &AppConfig) -> Arc<dyn ObjectStore> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("🧠 In-memory storage (Bucket: {})", config.s3_bucket);
            Arc::new(InMemoryObjectStore::new(config.s3_bucket.clone()))
        }
        StorageBackend::S3 => {
            let mut loader = aws_config::from_env().region(Region::new(config.aws_region.clone()));
            if let Some(endpoint) = &config.s3_endpoint {
                loader = loader.endpoint_url(endpoint);
            }
            let aws_config = loader.load().await;

            // Custom endpoints (MinIO, LocalStack) rarely support virtual-hosted buckets.
            let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(config.s3_endpoint.is_some())
                .build();
            let client = aws_sdk_s3::Client::from_conf(s3_config);
            let bucket = config.s3_bucket.clone();

            match &config.s3_endpoint {
                Some(endpoint) => {
                    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint, bucket);
                    Arc::new(S3ObjectStore::with_endpoint(client, bucket, endpoint))
                }
                None => {
                    info!("☁️  S3 Storage: {} (Bucket: {})", config.aws_region, bucket);
                    Arc::new(S3ObjectStore::aws(client, bucket, &config.aws_region))
                }
            }
        }
    }
}
