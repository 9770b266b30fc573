pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers;
use crate::api::middleware::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::AppConfig;
use crate::services::ingestion::IngestionPipeline;
use crate::services::staging::Stager;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::get,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::upload::upload_form,
        handlers::upload::upload_csv,
        handlers::health::health_check,
    ),
    components(
        schemas(
            handlers::upload::UploadForm,
            handlers::upload::IngestResponse,
            handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "ingest", description = "CSV ingestion endpoints"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

/// Allowance for multipart boundaries and headers on top of the file size
/// limit, so an oversized file trips the staging limit first.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub stager: Stager,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    let shared_dir = state.config.shared_dir.clone();
    let body_limit = state.config.max_file_size;

    Router::new()
        .route(
            "/",
            get(handlers::upload::upload_form).post(handlers::upload::upload_csv),
        )
        .route(
            "/upload",
            get(handlers::upload::upload_form).post(handlers::upload::upload_csv),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest_service("/shared", ServeDir::new(shared_dir))
        .layer(DefaultBodyLimit::max(body_limit.saturating_add(MULTIPART_OVERHEAD)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // Outermost, so the trace span already sees the request id.
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
