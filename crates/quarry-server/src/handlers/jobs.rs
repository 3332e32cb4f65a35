//! Scrape job endpoints: launch, poll, get and list.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use uuid::Uuid;

use quarry_core::{JobStatus, JobStore};

use crate::dto::{
    JobListResponse, JobResponse, LaunchJobRequest, LaunchJobResponse, ListJobsQuery,
    PollResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Launch a scrape job.
///
/// Validates the provider input, creates the job and starts the provider
/// run. Synchronous providers complete within this request; asynchronous
/// runs are resolved later by polling, webhooks or recovery.
#[utoipa::path(
    post,
    path = "/api/v1/jobs",
    request_body = LaunchJobRequest,
    responses(
        (status = 202, description = "Job launched", body = LaunchJobResponse),
        (status = 400, description = "Invalid input; no job created"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Internal server error"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn launch_job(
    State(state): State<AppState>,
    Json(request): Json<LaunchJobRequest>,
) -> Result<(StatusCode, Json<LaunchJobResponse>), ApiError> {
    let request = request.into_create_request()?;
    let job = state.launcher.launch(request).await?;

    Ok((StatusCode::ACCEPTED, Json(LaunchJobResponse::from(job))))
}

/// Poll a job.
///
/// Checks the provider for in-flight jobs and commits the result once the
/// run has finished. Terminal jobs are answered from the database.
#[utoipa::path(
    post,
    path = "/api/v1/jobs/{id}/poll",
    params(
        ("id" = Uuid, Path, description = "Job UUID")
    ),
    responses(
        (status = 200, description = "Current job status", body = PollResponse),
        (status = 404, description = "Job not found"),
        (status = 429, description = "Provider rate limit; retry later"),
        (status = 503, description = "Transient provider fault; retry later"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn poll_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PollResponse>, ApiError> {
    let outcome = state.poller.poll(id).await?;
    Ok(Json(PollResponse::from(outcome)))
}

/// Get the stored record of a job without contacting the provider.
#[utoipa::path(
    get,
    path = "/api/v1/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job UUID")
    ),
    responses(
        (status = 200, description = "Job found", body = JobResponse),
        (status = 404, description = "Job not found"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .job_repo
        .get_job(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", id)))?;

    Ok(Json(JobResponse::from(job)))
}

/// List jobs, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/jobs",
    params(ListJobsQuery),
    responses(
        (status = 200, description = "Jobs", body = JobListResponse),
        (status = 400, description = "Unknown status filter"),
    ),
    security(("bearer" = [])),
    tag = "jobs"
)]
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<JobListResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(str::parse::<JobStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let jobs = state
        .job_repo
        .list_jobs(query.project_id, status, query.effective_limit())
        .await?;

    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs: jobs.into_iter().map(JobResponse::from).collect(),
    }))
}
