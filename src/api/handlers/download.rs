use crate::api::error::AppError;
use crate::utils::validation::sanitize_filename;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

#[utoipa::path(
    get,
    path = "/download/{filename}",
    params(
        ("filename" = String, Path, description = "Name the file was uploaded with")
    ),
    responses(
        (status = 200, description = "File download stream"),
        (status = 404, description = "File not found"),
        (status = 500, description = "Object store lookup failed")
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<crate::AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let key = sanitize_filename(&filename).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let object = state
        .storage
        .get_object(&key)
        .await
        .map_err(AppError::from_storage)?;

    let content_type = object
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", key));

    if let Ok(value) = HeaderValue::from_str(&content_type) {
        response = response.header(header::CONTENT_TYPE, value);
    }
    if let Some(size) = object.size {
        response = response.header(header::CONTENT_LENGTH, size);
    }

    tracing::info!("📎 Streaming '{}' to client", key);

    response
        .body(Body::from_stream(ReaderStream::new(object.body)))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}
