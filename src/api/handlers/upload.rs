use crate::AppState;
use crate::api::error::AppError;
use crate::models::{PipelineOutcome, Record, UploadResult};
use crate::services::staging::{StagedFile, Stager};
use crate::utils::validation::original_file_name;
use askama::Template;
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError, multipart::MultipartRejection},
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use futures::TryStreamExt;
use serde::Serialize;
use utoipa::ToSchema;

const UPLOAD_FORM: &str = r#"<h2>Upload CSV</h2>
<form action="/upload" method="POST" enctype="multipart/form-data">
  <input type="file" name="file" />
  <button type="submit">Upload</button>
</form>
"#;

/// Multipart form accepted by the upload endpoint.
#[derive(ToSchema)]
pub struct UploadForm {
    /// CSV file to ingest
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// Success page; askama escapes every interpolated value.
#[derive(Template)]
#[template(
    source = "<h3>Upload success!</h3>\n<p>Stored at <a href=\"{{ location }}\">{{ location }}</a></p>\n<pre>{{ records }}</pre>",
    ext = "html"
)]
struct SuccessPage<'a> {
    location: &'a str,
    records: String,
}

#[derive(Serialize, ToSchema)]
pub struct IngestResponse {
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<Record>,
    pub location: String,
    pub key: String,
    pub etag: Option<String>,
}

#[utoipa::path(
    get,
    path = "/upload",
    responses(
        (status = 200, description = "Upload form", content_type = "text/html")
    ),
    tag = "ingest"
)]
pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File parsed and stored", body = IngestResponse),
        (status = 400, description = "No file uploaded"),
        (status = 413, description = "Upload too large"),
        (status = 500, description = "Parsing or storage failed")
    ),
    tag = "ingest"
)]
pub async fn upload_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Request is not a multipart upload: {}", e);
        AppError::NoFile
    })?;

    let staged = stage_first_file(&state.stager, &mut multipart)
        .await?
        .ok_or(AppError::NoFile)?;

    tracing::info!(
        "📥 Received {} ({} bytes)",
        staged.original_filename(),
        staged.size()
    );

    match state.pipeline.run(staged).await {
        PipelineOutcome::Success { records, upload } => {
            if wants_json(&headers) {
                Ok(Json(IngestResponse {
                    records,
                    location: upload.location,
                    key: upload.key,
                    etag: upload.etag,
                })
                .into_response())
            } else {
                Ok(Html(render_success(&records, &upload)?).into_response())
            }
        }
        PipelineOutcome::ParseFailure { reason } => Err(AppError::Parse(reason)),
        PipelineOutcome::UploadFailure { reason } => Err(AppError::Upload(reason)),
    }
}

/// Stages the first `file` field that carries a usable filename. Other
/// fields are ignored.
async fn stage_first_file(
    stager: &Stager,
    multipart: &mut Multipart,
) -> Result<Option<StagedFile>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(filename) = field.file_name().and_then(original_file_name) else {
            continue;
        };

        // Keep the multer detail so body-limit failures stay recognisable.
        let body = field.map_err(|e| e.body_text());
        let staged = stager.stage_stream(filename, body).await?;
        return Ok(Some(staged));
    }

    Ok(None)
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        tracing::debug!("Malformed multipart body: {}", e);
        AppError::NoFile
    }
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json") && !accept.contains("text/html"))
}

fn render_success(records: &[Record], upload: &UploadResult) -> Result<String, AppError> {
    let records = serde_json::to_string_pretty(records)
        .map_err(|e| AppError::Internal(format!("Failed to render records: {}", e)))?;

    SuccessPage {
        location: &upload.location,
        records,
    }
    .render()
    .map_err(|e| AppError::Internal(format!("Failed to render page: {}", e)))
}
