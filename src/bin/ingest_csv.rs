use clap::Parser;
use csv_ingest::config::{AppConfig, StorageBackend};
use csv_ingest::infrastructure::storage;
use csv_ingest::models::PipelineOutcome;
use csv_ingest::services::ingestion::IngestionPipeline;
use csv_ingest::services::staging::Stager;
use csv_ingest::utils::validation::original_file_name;
use dotenvy::dotenv;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parse a local CSV file and store it the same way the upload endpoint does.
#[derive(Parser, Debug)]
#[command(name = "ingest_csv", version)]
struct Args {
    /// CSV file to ingest
    file: PathBuf,

    /// Destination bucket (overrides S3_BUCKET)
    #[arg(long)]
    bucket: Option<String>,

    /// Bucket region (overrides AWS_REGION)
    #[arg(long)]
    region: Option<String>,

    /// S3-compatible endpoint, e.g. http://127.0.0.1:9000 (overrides S3_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Keep the object in process memory instead of S3
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ingest_csv=info,csv_ingest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = AppConfig::from_env();
    if let Some(bucket) = args.bucket {
        config.s3_bucket = bucket;
    }
    if let Some(region) = args.region {
        config.aws_region = region;
    }
    if args.endpoint.is_some() {
        config.s3_endpoint = args.endpoint;
    }
    if args.memory {
        config.storage_backend = StorageBackend::Memory;
    }

    let filename = args
        .file
        .to_str()
        .and_then(original_file_name)
        .ok_or_else(|| anyhow::anyhow!("Unusable file name: {}", args.file.display()))?;

    let stager = Stager::new(config.staging_dir.clone(), config.max_file_size as u64);
    stager.ensure_dir().await?;

    let source = tokio::fs::File::open(&args.file).await?;
    let staged = stager.stage_stream(filename, ReaderStream::new(source)).await?;
    info!("📦 Staged {} ({} bytes)", staged.original_filename(), staged.size());

    let pipeline = IngestionPipeline::new(storage::setup_storage(&config).await);

    match pipeline.run(staged).await {
        PipelineOutcome::Success { records, upload } => {
            println!("{}", serde_json::to_string_pretty(&records)?);
            info!("✅ Stored at {}", upload.location);
            Ok(())
        }
        PipelineOutcome::ParseFailure { reason } => {
            error!("❌ Parse failed: {}", reason);
            std::process::exit(1);
        }
        PipelineOutcome::UploadFailure { reason } => {
            error!("❌ Upload failed: {}", reason);
            std::process::exit(1);
        }
    }
}
