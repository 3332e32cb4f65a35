//! Job store trait for abstracting job persistence.
//!
//! The store is the only shared mutable resource in the system. Every status
//! change is a conditional update on the expected prior status; this is the
//! sole concurrency control between the poller, the webhook receiver and the
//! recovery sweep.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::job::{CreateJobRequest, JobResolution, JobStatus, ScrapeJob, TransitionOutcome};

/// Trait for scrape job persistence operations.
///
/// # Implementation Notes
///
/// Implementations must ensure:
/// - `record_run_started`, `mark_polling` and `resolve` apply only when the
///   persisted status matches the expected prior status, atomically
/// - `external_run_id` is never overwritten once set
/// - a terminal job is never modified again
pub trait JobStore: Send + Sync + Clone {
    /// Create a new job in `pending`.
    ///
    /// Returns the created job with generated ID and timestamps.
    fn create_job(
        &self,
        request: CreateJobRequest,
    ) -> impl Future<Output = Result<ScrapeJob, AppError>> + Send;

    /// Get a job by ID.
    fn get_job(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<ScrapeJob>, AppError>> + Send;

    /// Find the job owning a provider run.
    fn find_by_run_id(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<Option<ScrapeJob>, AppError>> + Send;

    /// `pending → running`: store the provider run id and set `started_at`.
    ///
    /// Returns `None` if the job was no longer pending or already had a run id.
    fn record_run_started(
        &self,
        job_id: Uuid,
        run_id: &str,
        webhook_registered: bool,
    ) -> impl Future<Output = Result<Option<ScrapeJob>, AppError>> + Send;

    /// `running → polling`.
    ///
    /// Returns `None` if the job was no longer running.
    fn mark_polling(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<ScrapeJob>, AppError>> + Send;

    /// Conditional terminal transition.
    ///
    /// Writes the resolution only if the job is still transient. Otherwise
    /// leaves the row untouched and returns the job as currently stored.
    fn resolve(
        &self,
        job_id: Uuid,
        resolution: JobResolution,
    ) -> impl Future<Output = Result<TransitionOutcome, AppError>> + Send;

    /// Set `last_checked_at` to now on a transient job.
    ///
    /// Returns `None` if the job is already terminal.
    fn touch(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<ScrapeJob>, AppError>> + Send;

    /// Increment `retry_count` and set `last_checked_at` on a transient job.
    ///
    /// Returns the new retry count, or `None` if the job is already terminal.
    fn record_recovery_attempt(
        &self,
        job_id: Uuid,
    ) -> impl Future<Output = Result<Option<u32>, AppError>> + Send;

    /// Transient jobs whose last activity is before `cutoff`.
    ///
    /// Last activity is `last_checked_at`, else `started_at`, else
    /// `created_at`. Results are ordered oldest first.
    fn find_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        project_id: Option<Uuid>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScrapeJob>, AppError>> + Send;

    /// List jobs with optional filters.
    ///
    /// Results are ordered by creation time (newest first).
    fn list_jobs(
        &self,
        project_id: Option<Uuid>,
        status: Option<JobStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScrapeJob>, AppError>> + Send;

    /// Get count of jobs by status.
    fn count_by_status(
        &self,
        status: JobStatus,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;
}
