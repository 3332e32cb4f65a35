//! Trait definitions for external dependencies.
//!
//! The orchestration services in this crate are generic over these traits:
//!
//! - [`ScrapeProvider`] / [`ProviderFactory`]: third-party scraping services
//! - [`DocumentStore`]: persistence for normalized documents
//! - [`EmbeddingTrigger`] / [`UsageRecorder`]: downstream collaborators
//! - [`ResultSink`]: delivery of a committed result
//!
//! The job store itself lives in [`crate::job_store`].
//!
//! # Example
//!
//! ```
//! use quarry_core::traits::{ProviderFactory, ScrapeProvider};
//! use quarry_core::{AppError, ProviderKind, RunStatus};
//!
//! // Orchestration code only branches on the run status, never on the provider.
//! async fn is_done<F: ProviderFactory>(
//!     factory: &F,
//!     kind: ProviderKind,
//!     run_id: &str,
//! ) -> Result<bool, AppError> {
//!     let provider = factory.create(kind)?;
//!     Ok(provider.check_status(run_id).await?.is_terminal())
//! }
//! ```

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::formatter::{DeliveryReport, NormalizedDocument};
use crate::job::{ProviderKind, ScrapeJob, ScraperType};

// =============================================================================
// Provider Adapter
// =============================================================================

/// Parameters for starting a provider run.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub job_id: Uuid,
    pub scraper_type: ScraperType,
    pub input: Value,
}

/// What the provider did with a start request.
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// Results returned inline; there is no run to track.
    Sync { items: Vec<Value> },
    /// The provider accepted a run that completes later.
    Async {
        run_id: String,
        /// Whether a completion webhook was registered for the run.
        webhook_registered: bool,
    },
}

/// Provider-side state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Finished; `handle` locates the results for [`ScrapeProvider::fetch_result`].
    Succeeded { handle: String },
    Failed { message: String },
    /// The provider has no record of the run.
    NotFound,
}

impl RunStatus {
    /// Returns true for outcomes a resolver can commit.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded { .. } | RunStatus::Failed { .. })
    }
}

/// Uniform interface to a scraping provider.
pub trait ScrapeProvider: Send + Sync + Clone {
    /// Returns the provider's name for logging.
    fn name(&self) -> &'static str;

    /// Starts a scrape.
    ///
    /// Sync providers answer with [`StartOutcome::Sync`] and never produce a
    /// run id; async providers always answer with [`StartOutcome::Async`].
    fn start_job(
        &self,
        request: &StartRequest,
    ) -> impl Future<Output = Result<StartOutcome, AppError>> + Send;

    /// Reports the current state of a run.
    ///
    /// An unknown run is [`RunStatus::NotFound`], not an error.
    fn check_status(
        &self,
        run_id: &str,
    ) -> impl Future<Output = Result<RunStatus, AppError>> + Send;

    /// Fetches the raw result items behind a handle from [`RunStatus::Succeeded`].
    fn fetch_result(
        &self,
        handle: &str,
    ) -> impl Future<Output = Result<Vec<Value>, AppError>> + Send;
}

/// Factory for creating provider clients.
///
/// Separate from ScrapeProvider so clients can be built per job from the
/// job's stored [`ProviderKind`].
pub trait ProviderFactory: Send + Sync + Clone {
    /// The type of provider client this factory creates.
    type Provider: ScrapeProvider;

    /// Creates a client for `kind`.
    ///
    /// Fails with a configuration error when the provider is not configured.
    fn create(&self, kind: ProviderKind) -> Result<Self::Provider, AppError>;
}

// =============================================================================
// Downstream Collaborators
// =============================================================================

/// Persistence for normalized documents.
pub trait DocumentStore: Send + Sync + Clone {
    /// Inserts the documents of a job.
    ///
    /// Idempotent per `(job, source_key)`: documents that already exist are
    /// skipped.
    ///
    /// # Returns
    ///
    /// Ids of the documents created by this call only.
    fn insert_documents(
        &self,
        job: &ScrapeJob,
        documents: &[NormalizedDocument],
    ) -> impl Future<Output = Result<Vec<Uuid>, AppError>> + Send;
}

/// Requests embedding generation for a stored document.
pub trait EmbeddingTrigger: Send + Sync + Clone {
    fn trigger(&self, document_id: Uuid) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Records usage for a completed job.
pub trait UsageRecorder: Send + Sync + Clone {
    fn record_usage(
        &self,
        project_id: Uuid,
        job_id: Uuid,
        units: usize,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Receives a job whose terminal transition this process committed.
///
/// Called at most once per job. Implementations must not fail the job.
pub trait ResultSink: Send + Sync + Clone {
    fn deliver(&self, job: &ScrapeJob) -> impl Future<Output = DeliveryReport> + Send;
}
