//! Job repository for PostgreSQL with conditional status updates.
//!
//! Implements the [`JobStore`] trait. Every status change is a single
//! `UPDATE ... WHERE status = ANY($expected) RETURNING *`: the statement is
//! atomic per row, so concurrent resolvers racing on the same job see
//! exactly one accepted update. A rejected update returns zero rows and the
//! caller re-reads the committed job.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use quarry_core::error::AppError;
use quarry_core::formatter::{OutputConfig, ResultSet};
use quarry_core::job::{
    CreateJobRequest, JobResolution, JobStatus, ProviderKind, ScrapeJob, ScraperType,
    TransitionOutcome,
};
use quarry_core::job_store::JobStore;

/// PostgreSQL implementation of the job store.
#[derive(Clone)]
pub struct JobRepository {
    pool: Pool<Postgres>,
}

impl JobRepository {
    /// Create a new job repository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Checks database connectivity by executing a simple query.
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

fn status_list(statuses: &[JobStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

// =============================================================================
// Helper Types for Database Mapping
// =============================================================================

/// Helper struct for deserializing job rows from the database.
#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    project_id: Uuid,
    provider: String,
    scraper_type: String,
    external_run_id: Option<String>,
    status: String,
    input_config: Value,
    output_config: Json<OutputConfig>,
    result: Option<Json<ResultSet>>,
    error_message: Option<String>,
    webhook_registered: bool,
    recovered: bool,
    retry_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    last_checked_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl From<JobRow> for ScrapeJob {
    fn from(row: JobRow) -> Self {
        // CHECK constraints keep the enum columns within their known values.
        Self {
            id: row.id,
            project_id: row.project_id,
            provider: row.provider.parse().unwrap_or(ProviderKind::Apify),
            scraper_type: row.scraper_type.parse().unwrap_or(ScraperType::Profile),
            external_run_id: row.external_run_id,
            status: row.status.parse().unwrap_or(JobStatus::Pending),
            input_config: row.input_config,
            output_config: row.output_config.0,
            result: row.result.map(|r| r.0),
            error_message: row.error_message,
            webhook_registered: row.webhook_registered,
            recovered: row.recovered,
            retry_count: row.retry_count.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
            started_at: row.started_at,
            last_checked_at: row.last_checked_at,
            completed_at: row.completed_at,
        }
    }
}

// =============================================================================
// JobStore Trait Implementation
// =============================================================================

impl JobStore for JobRepository {
    async fn create_job(&self, request: CreateJobRequest) -> Result<ScrapeJob, AppError> {
        let row: JobRow = sqlx::query_as(
            r#"
            INSERT INTO scrape_jobs (project_id, provider, scraper_type, input_config, output_config)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(request.project_id)
        .bind(request.provider.as_str())
        .bind(request.scraper_type.as_str())
        .bind(&request.input_config)
        .bind(Json(&request.output_config))
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM scrape_jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn find_by_run_id(&self, run_id: &str) -> Result<Option<ScrapeJob>, AppError> {
        let row: Option<JobRow> =
            sqlx::query_as("SELECT * FROM scrape_jobs WHERE external_run_id = $1")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Into::into))
    }

    async fn record_run_started(
        &self,
        job_id: Uuid,
        run_id: &str,
        webhook_registered: bool,
    ) -> Result<Option<ScrapeJob>, AppError> {
        // The run id is write-once.
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE scrape_jobs
            SET
                status = 'running',
                external_run_id = $2,
                webhook_registered = $3,
                started_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND external_run_id IS NULL
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(run_id)
        .bind(webhook_registered)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn mark_polling(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE scrape_jobs
            SET status = 'polling', updated_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn resolve(
        &self,
        job_id: Uuid,
        resolution: JobResolution,
    ) -> Result<TransitionOutcome, AppError> {
        let status = resolution.target_status();
        let recovered = resolution.is_recovery();
        let (result, error_message) = match resolution {
            JobResolution::Scraped { result, .. } => (Some(Json(result)), None),
            JobResolution::Failed { message, .. } => (None, Some(message)),
        };

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE scrape_jobs
            SET
                status = $2,
                result = $3,
                error_message = $4,
                recovered = $5,
                completed_at = NOW(),
                last_checked_at = NOW(),
                updated_at = NOW()
            WHERE id = $1 AND status = ANY($6)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(result)
        .bind(error_message)
        .bind(recovered)
        .bind(status_list(&JobStatus::TRANSIENT))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(TransitionOutcome::Committed(row.into()));
        }

        // Rejected: the job is terminal or does not exist.
        match self.get_job(job_id).await? {
            Some(job) => {
                tracing::debug!(
                    %job_id,
                    status = %job.status,
                    attempted = %status,
                    "Conditional transition rejected"
                );
                Ok(TransitionOutcome::AlreadyResolved(job))
            }
            None => Err(AppError::JobNotFound(job_id)),
        }
    }

    async fn touch(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE scrape_jobs
            SET last_checked_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(status_list(&JobStatus::TRANSIENT))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn record_recovery_attempt(&self, job_id: Uuid) -> Result<Option<u32>, AppError> {
        let count: Option<(i32,)> = sqlx::query_as(
            r#"
            UPDATE scrape_jobs
            SET retry_count = retry_count + 1, last_checked_at = NOW()
            WHERE id = $1 AND status = ANY($2)
            RETURNING retry_count
            "#,
        )
        .bind(job_id)
        .bind(status_list(&JobStatus::TRANSIENT))
        .fetch_optional(&self.pool)
        .await?;

        Ok(count.map(|(c,)| c.max(0) as u32))
    }

    async fn find_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        project_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ScrapeJob>, AppError> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM scrape_jobs
            WHERE status = ANY($1)
              AND COALESCE(last_checked_at, started_at, created_at) < $2
              AND ($3::uuid IS NULL OR project_id = $3)
            ORDER BY COALESCE(last_checked_at, started_at, created_at) ASC
            LIMIT $4
            "#,
        )
        .bind(status_list(&JobStatus::TRANSIENT))
        .bind(cutoff)
        .bind(project_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_jobs(
        &self,
        project_id: Option<Uuid>,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ScrapeJob>, AppError> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM scrape_jobs
            WHERE ($1::uuid IS NULL OR project_id = $1)
              AND ($2::varchar IS NULL OR status = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(project_id)
        .bind(status.map(|s| s.as_str()))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scrape_jobs WHERE status = $1")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
