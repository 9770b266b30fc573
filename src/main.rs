use csv_ingest::config::AppConfig;
use csv_ingest::infrastructure::storage;
use csv_ingest::services::ingestion::IngestionPipeline;
use csv_ingest::services::staging::Stager;
use csv_ingest::{AppState, create_app};
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Initialize tracing with EnvFilter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "csv_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting CSV ingest service...");

    let config = AppConfig::from_env();
    info!(
        "⚙️  Config: Max Size={}MB, Staging={}, Shared={}",
        config.max_file_size / 1024 / 1024,
        config.staging_dir.display(),
        config.shared_dir.display()
    );

    let stager = Stager::new(config.staging_dir.clone(), config.max_file_size as u64);
    stager.ensure_dir().await?;
    if !config.shared_dir.is_dir() {
        warn!("📁 Shared directory {} does not exist", config.shared_dir.display());
    }

    let store = storage::setup_storage(&config).await;
    let state = AppState {
        pipeline: IngestionPipeline::new(store),
        stager,
        config: config.clone(),
    };

    let app = create_app(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("✅ Server ready at http://{}", addr);
    info!("📖 OpenAPI: http://{}/api-docs/openapi.json", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("🛑 Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, starting graceful shutdown...");
        },
    }
}
