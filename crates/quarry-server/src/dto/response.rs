//! Response DTOs for API endpoints.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use quarry_core::{
    NormalizedDocument, PollOutcome, RecoveryDetail, RecoveryReport, ResultSet, ScrapeJob,
};

// =============================================================================
// Health
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("healthy" or "degraded")
    pub status: String,
    /// Server version
    pub version: String,
    /// Database connectivity status
    pub database: ServiceStatus,
}

/// Status of an individual service component.
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    /// Whether the service is reachable
    pub healthy: bool,
    /// Optional message (e.g., error details)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// =============================================================================
// Jobs
// =============================================================================

/// A normalized document of a job result.
#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentDto {
    /// Stable key within the job
    pub source_key: String,
    pub title: Option<String>,
    pub content: String,
    pub url: Option<String>,
    /// Fields copied by the output field mapping
    #[schema(value_type = Object)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl From<NormalizedDocument> for DocumentDto {
    fn from(d: NormalizedDocument) -> Self {
        Self {
            source_key: d.source_key,
            title: d.title,
            content: d.content,
            url: d.url,
            metadata: d.metadata,
        }
    }
}

/// The committed result of a scraped job.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResultDto {
    /// Raw items returned by the provider
    pub item_count: usize,
    /// Items dropped by filtering, deduplication or limits
    pub dropped_count: usize,
    /// Provider result handle (e.g. dataset id)
    pub source: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub documents: Vec<DocumentDto>,
}

impl From<ResultSet> for ResultDto {
    fn from(r: ResultSet) -> Self {
        Self {
            item_count: r.item_count,
            dropped_count: r.dropped_count,
            source: r.source,
            fetched_at: r.fetched_at,
            documents: r.documents.into_iter().map(DocumentDto::from).collect(),
        }
    }
}

/// Scrape job response.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    /// Job UUID
    pub id: Uuid,
    /// Owning project
    pub project_id: Uuid,
    /// Provider executing the job
    pub provider: String,
    /// Scraper type
    pub scraper_type: String,
    /// Current job status
    pub status: String,
    /// Provider run id, once accepted
    pub external_run_id: Option<String>,
    /// Whether a completion webhook was registered
    pub webhook_registered: bool,
    /// Whether the recovery sweep resolved the job
    pub recovered: bool,
    /// Recovery attempts so far
    pub retry_count: u32,
    /// Committed result (scraped jobs only)
    pub result: Option<ResultDto>,
    /// Error message (failed jobs only)
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<ScrapeJob> for JobResponse {
    fn from(job: ScrapeJob) -> Self {
        Self {
            id: job.id,
            project_id: job.project_id,
            provider: job.provider.as_str().to_string(),
            scraper_type: job.scraper_type.as_str().to_string(),
            status: job.status.as_str().to_string(),
            external_run_id: job.external_run_id,
            webhook_registered: job.webhook_registered,
            recovered: job.recovered,
            retry_count: job.retry_count,
            result: job.result.map(ResultDto::from),
            error: job.error_message,
            created_at: job.created_at,
            started_at: job.started_at,
            last_checked_at: job.last_checked_at,
            completed_at: job.completed_at,
        }
    }
}

/// Launch response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LaunchJobResponse {
    /// Job UUID
    pub job_id: Uuid,
    /// Status after launch (running, polling, scraped or failed)
    pub status: String,
    /// Provider error, when the provider rejected the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ScrapeJob> for LaunchJobResponse {
    fn from(job: ScrapeJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status.as_str().to_string(),
            error: job.error_message,
        }
    }
}

/// Poll response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PollResponse {
    /// Job UUID
    pub job_id: Uuid,
    /// Status after the poll
    pub status: String,
    /// Committed result (scraped jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultDto>,
    /// Error message (failed jobs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds to wait before polling again, while the job is in flight
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl From<PollOutcome> for PollResponse {
    fn from(outcome: PollOutcome) -> Self {
        let job = outcome.job;
        Self {
            job_id: job.id,
            status: job.status.as_str().to_string(),
            result: job.result.map(ResultDto::from),
            error: job.error_message,
            retry_after_secs: outcome.retry_after.map(|d| d.as_secs()),
        }
    }
}

/// Job listing response.
#[derive(Debug, Serialize, ToSchema)]
pub struct JobListResponse {
    /// Number of jobs returned
    pub count: usize,
    /// Jobs, newest first
    pub jobs: Vec<JobResponse>,
}

// =============================================================================
// Webhooks
// =============================================================================

/// Acknowledgement returned to the provider for every delivery.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
}

// =============================================================================
// Recovery
// =============================================================================

/// Per-job result of a recovery sweep.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryDetailDto {
    pub job_id: Uuid,
    /// recovered, failed, still_running, already_resolved or error
    pub outcome: String,
    /// Job status after the sweep
    pub status: String,
    pub message: Option<String>,
}

impl From<RecoveryDetail> for RecoveryDetailDto {
    fn from(d: RecoveryDetail) -> Self {
        Self {
            job_id: d.job_id,
            outcome: d.outcome.as_str().to_string(),
            status: d.status.as_str().to_string(),
            message: d.message,
        }
    }
}

/// Recovery sweep summary.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecoveryResponse {
    /// Jobs recovered as scraped
    pub recovered_count: usize,
    /// Jobs forced to failed
    pub failed_count: usize,
    pub details: Vec<RecoveryDetailDto>,
}

impl From<RecoveryReport> for RecoveryResponse {
    fn from(r: RecoveryReport) -> Self {
        Self {
            recovered_count: r.recovered_count,
            failed_count: r.failed_count,
            details: r.details.into_iter().map(RecoveryDetailDto::from).collect(),
        }
    }
}
