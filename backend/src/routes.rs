use actix_files::Files;
use actix_multipart::Multipart;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{ErrorResponse, ProcessResponse};
use std::path::Path;

use crate::pipeline::pipeline_service::{PipelineError, PipelineService};
use crate::storage::artifact_store::ARTIFACT_ROUTE;

/// Largest accepted upload in bytes.
#[derive(Clone, Copy)]
pub struct UploadLimit(pub usize);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid upload: {0}")]
    Upload(String),
    #[error("No file in upload")]
    MissingFile,
    #[error("Upload exceeds {0} bytes")]
    TooLarge(usize),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Upload(_) | ApiError::MissingFile => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Pipeline(PipelineError::Decode(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Pipeline(PipelineError::Detection(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}

pub fn configure_routes(
    cfg: &mut web::ServiceConfig,
    storage_dir: &Path,
    frontend_dir: Option<&Path>,
) {
    cfg.service(web::resource("/process").route(web::post().to(handle_process)))
        .service(Files::new(ARTIFACT_ROUTE, storage_dir));
    if let Some(frontend_dir) = frontend_dir {
        cfg.service(Files::new("/", frontend_dir).index_file("index.html"));
    }
}

async fn handle_process(
    pipeline: web::Data<PipelineService>,
    limit: web::Data<UploadLimit>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let upload = read_single_file(payload, limit.0).await?;
    info!("Received upload of {} bytes", upload.len());

    let result = pipeline.process(upload).await?;
    if result.report.is_degraded() {
        warn!(
            "[{}] Returning result with degraded report",
            result.request_id
        );
    }
    Ok(HttpResponse::Ok().json(ProcessResponse::from(result)))
}

/// Returns the body of the first non-empty multipart field.
async fn read_single_file(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Upload(e.to_string()))?
    {
        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Upload(e.to_string()))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(ApiError::TooLarge(max_bytes));
            }
            data.extend_from_slice(&chunk);
        }
        if !data.is_empty() {
            return Ok(data);
        }
    }
    Err(ApiError::MissingFile)
}
