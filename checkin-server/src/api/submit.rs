//! Check-in submission endpoint

use axum::{extract::Multipart, extract::State, Json};

use crate::error::ApiResult;
use crate::intake::{process_submission, read_submission, IntakeReceipt};
use crate::AppState;

/// POST /submit-checkin
///
/// Multipart form with the athlete's answers and any pose photos or video.
pub async fn submit_checkin(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<IntakeReceipt>> {
    let submission = read_submission(multipart).await?;
    let receipt = process_submission(&state, submission).await?;
    Ok(Json(receipt))
}
