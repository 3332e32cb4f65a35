//! Stale-job recovery endpoint.

use axum::{
    Json,
    extract::{Query, State},
};

use crate::dto::{RecoverQuery, RecoveryResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// Run one recovery sweep.
///
/// Checks every transient job that has seen no activity for longer than
/// the stale threshold directly against its provider.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/recover",
    params(RecoverQuery),
    responses(
        (status = 200, description = "Sweep summary", body = RecoveryResponse),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn recover_jobs(
    State(state): State<AppState>,
    Query(query): Query<RecoverQuery>,
) -> Result<Json<RecoveryResponse>, ApiError> {
    let report = state.recovery.sweep(query.project_id).await?;

    tracing::info!(
        project_id = ?query.project_id,
        recovered = report.recovered_count,
        failed = report.failed_count,
        "Recovery sweep completed"
    );

    Ok(Json(RecoveryResponse::from(report)))
}
