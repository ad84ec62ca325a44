//! Coach dashboard data

use axum::{
    extract::{Query, State},
    Json,
};
use tracing::warn;

use checkin_common::dashboard::{summarize, DashboardFilter, DashboardSummary};

use crate::error::ApiResult;
use crate::AppState;

/// GET /api/dashboard
///
/// Query parameters: `status` (`new` | `needs-attention`) and `athlete`
/// (case-insensitive name substring). Totals always cover every record.
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(filter): Query<DashboardFilter>,
) -> ApiResult<Json<DashboardSummary>> {
    let outcome = state.gateway.query_all().await?;
    if outcome.skipped > 0 {
        warn!(skipped = outcome.skipped, "Dashboard omitted unreadable check-ins");
    }

    Ok(Json(summarize(outcome.records, &filter, outcome.skipped)))
}
