//! Runs against a local MinIO:
//!
//! ```bash
//! docker run -d -p 9000:9000 minio/minio server /data
//! cargo test --test s3_roundtrip_test -- --ignored
//! ```

use aws_sdk_s3::config::{Credentials, Region};
use bytes::Bytes;
use csv_ingest::models::PipelineOutcome;
use csv_ingest::services::ingestion::IngestionPipeline;
use csv_ingest::services::staging::Stager;
use csv_ingest::services::storage::{ObjectStore, S3ObjectStore, UploadError};
use std::sync::Arc;

const ENDPOINT: &str = "http://127.0.0.1:9000";

async fn minio_client(access_key: &str, secret_key: &str) -> aws_sdk_s3::Client {
    let config = aws_config::from_env()
        .endpoint_url(ENDPOINT)
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new(access_key, secret_key, None, None, "static"))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}

async fn ensure_bucket(client: &aws_sdk_s3::Client, bucket: &str) {
    let _ = client.create_bucket().bucket(bucket).send().await;
}

#[tokio::test]
#[ignore = "requires MinIO on 127.0.0.1:9000"]
async fn test_s3_round_trip() {
    let client = minio_client("minioadmin", "minioadmin").await;
    ensure_bucket(&client, "csv-ingest-test").await;
    let store = Arc::new(S3ObjectStore::with_endpoint(
        client,
        "csv-ingest-test".to_string(),
        ENDPOINT,
    ));

    let dir = tempfile::tempdir().unwrap();
    let stager = Stager::new(dir.path(), 1024 * 1024);
    let content = "name,age\nJohn,30\nJane,25";
    let body = futures::stream::once(async move {
        Ok::<_, std::io::Error>(Bytes::from_static(content.as_bytes()))
    });
    let staged = stager.stage_stream("roundtrip.csv", body).await.unwrap();
    let path = staged.path().to_path_buf();

    let pipeline = IngestionPipeline::new(store.clone());
    match pipeline.run(staged).await {
        PipelineOutcome::Success { records, upload } => {
            assert_eq!(records.len(), 2);
            assert_eq!(upload.key, "uploads/roundtrip.csv");
            assert_eq!(
                upload.location,
                "http://127.0.0.1:9000/csv-ingest-test/uploads/roundtrip.csv"
            );
            assert!(upload.etag.is_some());
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(!path.exists());

    let stored = store
        .get_object("uploads/roundtrip.csv")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&stored[..], content.as_bytes());

    assert!(store.get_object("uploads/never-written.csv").await.unwrap().is_none());
    assert!(store.health_check().await);
}

#[tokio::test]
#[ignore = "requires MinIO on 127.0.0.1:9000"]
async fn test_s3_bad_credentials_is_auth_error() {
    let client = minio_client("nobody", "wrong-secret").await;
    let store = S3ObjectStore::with_endpoint(client, "csv-ingest-test".to_string(), ENDPOINT);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.csv");
    tokio::fs::write(&path, "a\n1").await.unwrap();

    let err = store.put_file("uploads/a.csv", &path).await.unwrap_err();
    assert!(matches!(err, UploadError::Auth(_)), "got {:?}", err);
}
