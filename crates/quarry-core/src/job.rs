//! Scrape job domain types.
//!
//! A [`ScrapeJob`] moves through a small state machine:
//!
//! ```text
//! pending → running → polling
//!    │         │         │
//!    └─────────┴─────────┴──→ scraped | failed
//! ```
//!
//! `pending`, `running` and `polling` are transient. `scraped` and `failed`
//! are terminal and immutable once written. Every transition is conditional
//! on the expected prior status; see [`crate::job_store::JobStore`].
//!
//! `recovered` is not a status: it is a flag set on jobs whose terminal
//! transition was performed by the recovery sweep.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::formatter::{OutputConfig, ResultSet};

// =============================================================================
// Job Status
// =============================================================================

/// Status of a scrape job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Job row exists, provider run not yet accepted.
    Pending,
    /// Provider accepted the run; a webhook may resolve it.
    Running,
    /// Provider accepted the run without a webhook; only polling or recovery resolves it.
    Polling,
    /// Results were fetched and committed.
    Scraped,
    /// The job failed permanently.
    Failed,
}

impl JobStatus {
    /// Statuses from which a terminal transition is still possible.
    ///
    /// The recovery sweep considers every one of them, so no job stays
    /// transient past the stale threshold and retry cap.
    pub const TRANSIENT: [JobStatus; 3] = [JobStatus::Pending, JobStatus::Running, JobStatus::Polling];

    /// Returns the string representation for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Polling => "polling",
            JobStatus::Scraped => "scraped",
            JobStatus::Failed => "failed",
        }
    }

    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Scraped | JobStatus::Failed)
    }

    /// Returns true if the job may still change status.
    pub fn is_transient(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if `self → next` is an edge of the job state machine.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Pending, Scraped)
                | (Pending, Failed)
                | (Running, Polling)
                | (Running, Scraped)
                | (Running, Failed)
                | (Polling, Scraped)
                | (Polling, Failed)
        )
    }
}

/// Error type for parsing JobStatus from string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseJobStatusError(String);

impl fmt::Display for ParseJobStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid job status: {}", self.0)
    }
}

impl std::error::Error for ParseJobStatusError {}

impl FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "polling" => Ok(JobStatus::Polling),
            "scraped" => Ok(JobStatus::Scraped),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(ParseJobStatusError(s.to_string())),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Scraper Type / Provider Kind
// =============================================================================

/// Semantic kind of scrape. Governs input validation and output shaping only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScraperType {
    Profile,
    Posts,
    Comments,
}

impl ScraperType {
    pub const ALL: [ScraperType; 3] = [ScraperType::Profile, ScraperType::Posts, ScraperType::Comments];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScraperType::Profile => "profile",
            ScraperType::Posts => "posts",
            ScraperType::Comments => "comments",
        }
    }

    /// Input fields that must be present when no override is configured.
    pub fn default_required_fields(&self) -> &'static [&'static str] {
        match self {
            ScraperType::Profile | ScraperType::Posts => &["username"],
            ScraperType::Comments => &["post_url"],
        }
    }
}

impl fmt::Display for ScraperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScraperType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profile" => Ok(Self::Profile),
            "posts" => Ok(Self::Posts),
            "comments" => Ok(Self::Comments),
            _ => Err(AppError::ValidationError(format!(
                "Unknown scraper type: '{}'. Valid options: profile, posts, comments",
                s
            ))),
        }
    }
}

/// External scraping service executing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Apify actor runs: asynchronous, results in a dataset.
    #[default]
    Apify,
    /// Single-call HTTP provider returning results inline.
    Direct,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Apify => "apify",
            ProviderKind::Direct => "direct",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "apify" => Ok(Self::Apify),
            "direct" => Ok(Self::Direct),
            _ => Err(AppError::ValidationError(format!(
                "Unknown provider: '{}'. Valid options: apify, direct",
                s
            ))),
        }
    }
}

// =============================================================================
// Scrape Job
// =============================================================================

/// A persisted scrape job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeJob {
    /// Unique job identifier.
    pub id: Uuid,

    /// Owning project.
    pub project_id: Uuid,

    /// Provider executing the job.
    pub provider: ProviderKind,

    /// Kind of scrape.
    pub scraper_type: ScraperType,

    /// Provider-assigned run id. Write-once.
    pub external_run_id: Option<String>,

    /// Current job status.
    pub status: JobStatus,

    /// Request sent to the provider.
    pub input_config: serde_json::Value,

    /// Formatting instructions for the result.
    pub output_config: OutputConfig,

    /// Normalized result set, written with the `scraped` transition.
    pub result: Option<ResultSet>,

    /// Error message, written with the `failed` transition.
    pub error_message: Option<String>,

    /// Whether the provider registered a completion webhook for the run.
    pub webhook_registered: bool,

    /// Whether the recovery sweep performed the terminal transition.
    pub recovered: bool,

    /// Number of recovery attempts made.
    pub retry_count: u32,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the row was last modified.
    pub updated_at: DateTime<Utc>,

    /// When the provider accepted the run.
    pub started_at: Option<DateTime<Utc>>,

    /// When a poll, webhook or recovery last observed the job.
    pub last_checked_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ScrapeJob {
    /// Timestamp staleness is measured from.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        self.last_checked_at
            .or(self.started_at)
            .unwrap_or(self.created_at)
    }

    /// Returns true if the job is transient and has been idle longer than `threshold`.
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: TimeDelta) -> bool {
        JobStatus::TRANSIENT.contains(&self.status) && now - self.last_activity_at() > threshold
    }

    /// Returns true while recovery attempts remain.
    pub fn can_retry_recovery(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }
}

// =============================================================================
// Job Creation Request
// =============================================================================

/// Request to create a new scrape job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub project_id: Uuid,
    pub provider: ProviderKind,
    pub scraper_type: ScraperType,
    pub input_config: serde_json::Value,
    pub output_config: OutputConfig,
}

impl CreateJobRequest {
    /// Create a new job request with default provider and output configuration.
    pub fn new(project_id: Uuid, scraper_type: ScraperType, input_config: serde_json::Value) -> Self {
        Self {
            project_id,
            provider: ProviderKind::default(),
            scraper_type,
            input_config,
            output_config: OutputConfig::default(),
        }
    }

    /// Set the provider.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Set the output configuration.
    pub fn with_output_config(mut self, output_config: OutputConfig) -> Self {
        self.output_config = output_config;
        self
    }
}

// =============================================================================
// Terminal Transitions
// =============================================================================

/// The terminal state a resolver wants to commit.
#[derive(Debug, Clone)]
pub enum JobResolution {
    Scraped { result: ResultSet, recovered: bool },
    Failed { message: String, recovered: bool },
}

impl JobResolution {
    pub fn scraped(result: ResultSet) -> Self {
        Self::Scraped {
            result,
            recovered: false,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            recovered: false,
        }
    }

    /// Mark the resolution as performed by the recovery sweep.
    pub fn by_recovery(self) -> Self {
        match self {
            Self::Scraped { result, .. } => Self::Scraped {
                result,
                recovered: true,
            },
            Self::Failed { message, .. } => Self::Failed {
                message,
                recovered: true,
            },
        }
    }

    pub fn target_status(&self) -> JobStatus {
        match self {
            Self::Scraped { .. } => JobStatus::Scraped,
            Self::Failed { .. } => JobStatus::Failed,
        }
    }

    pub fn is_recovery(&self) -> bool {
        match self {
            Self::Scraped { recovered, .. } | Self::Failed { recovered, .. } => *recovered,
        }
    }
}

/// Outcome of a conditional terminal transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// This caller's update was accepted; the job now holds its resolution.
    Committed(ScrapeJob),
    /// Another resolver got there first; the job holds the earlier resolution.
    AlreadyResolved(ScrapeJob),
}

impl TransitionOutcome {
    pub fn job(&self) -> &ScrapeJob {
        match self {
            Self::Committed(job) | Self::AlreadyResolved(job) => job,
        }
    }

    pub fn into_job(self) -> ScrapeJob {
        match self {
            Self::Committed(job) | Self::AlreadyResolved(job) => job,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }
}

// =============================================================================
// Tests
// =============================================================================
