//! Read-only access to stored attachments

use axum::{
    body::Body,
    extract::{Path, Request, State},
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /uploads/*path
///
/// Paths that are absolute, contain `..`, or do not name a stored file
/// answer 404.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let not_found = || ApiError::NotFound(format!("Attachment not found: {}", path));

    let file = state.attachments.resolve(&path).ok_or_else(not_found)?;
    let is_file = tokio::fs::metadata(&file)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(not_found());
    }

    // ServeFile handles content type and range requests for video
    let response = ServeFile::new(file)
        .oneshot(request)
        .await
        .unwrap_or_else(|never| match never {});

    Ok(response.map(Body::new))
}
