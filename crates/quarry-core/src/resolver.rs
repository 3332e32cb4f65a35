//! Terminal resolution shared by the launcher, poller, webhook receiver and
//! recovery sweep.
//!
//! Every path that observes a finished run ends up here. The resolver builds
//! the [`JobResolution`], submits it as a conditional transition and, only if
//! this caller won, hands the job to the [`ResultSink`]. A rejected transition
//! is not an error: the caller gets the job as committed by whoever won.

use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::formatter::ResultSet;
use crate::job::{JobResolution, JobStatus, ScrapeJob, TransitionOutcome};
use crate::job_store::JobStore;
use crate::traits::{ResultSink, RunStatus, ScrapeProvider};

/// Commits terminal transitions and delivers the winning result.
#[derive(Clone)]
pub struct Resolver<S, R>
where
    S: JobStore,
    R: ResultSink,
{
    store: S,
    sink: R,
}

impl<S, R> Resolver<S, R>
where
    S: JobStore,
    R: ResultSink,
{
    pub fn new(store: S, sink: R) -> Self {
        Self { store, sink }
    }

    /// The store transitions are committed to.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Submit `resolution` for `job_id`.
    pub async fn commit(
        &self,
        job_id: Uuid,
        resolution: JobResolution,
    ) -> Result<TransitionOutcome, AppError> {
        let target = resolution.target_status();
        let recovered = resolution.is_recovery();
        let outcome = self.store.resolve(job_id, resolution).await?;

        match &outcome {
            TransitionOutcome::Committed(job) => {
                info!(
                    %job_id,
                    status = %job.status,
                    recovered,
                    "Job resolved"
                );
                if job.status == JobStatus::Scraped {
                    self.sink.deliver(job).await;
                }
            }
            TransitionOutcome::AlreadyResolved(job) => {
                debug!(
                    %job_id,
                    attempted = %target,
                    committed = %job.status,
                    "Job already resolved, keeping committed result"
                );
            }
        }

        Ok(outcome)
    }

    /// Normalize provider items and commit them as the job's result.
    pub async fn commit_items(
        &self,
        job: &ScrapeJob,
        items: &[Value],
        source: Option<String>,
        recovered: bool,
    ) -> Result<TransitionOutcome, AppError> {
        let result = ResultSet::from_items(job.scraper_type, items, &job.output_config, source);
        let mut resolution = JobResolution::scraped(result);
        if recovered {
            resolution = resolution.by_recovery();
        }
        self.commit(job.id, resolution).await
    }

    /// Commit a finished provider run.
    ///
    /// Fetches results for a succeeded run before attempting the transition.
    /// A fetch failure is returned as-is and leaves the job untouched.
    ///
    /// Returns `None` when `status` is not terminal.
    pub async fn settle<P: ScrapeProvider>(
        &self,
        provider: &P,
        job: &ScrapeJob,
        status: RunStatus,
        recovered: bool,
    ) -> Result<Option<TransitionOutcome>, AppError> {
        match status {
            RunStatus::Succeeded { handle } => {
                let items = provider.fetch_result(&handle).await?;
                debug!(job_id = %job.id, items = items.len(), "Fetched provider result");
                self.commit_items(job, &items, Some(handle), recovered)
                    .await
                    .map(Some)
            }
            RunStatus::Failed { message } => {
                let mut resolution = JobResolution::failed(message);
                if recovered {
                    resolution = resolution.by_recovery();
                }
                self.commit(job.id, resolution).await.map(Some)
            }
            RunStatus::Running | RunStatus::NotFound => Ok(None),
        }
    }
}
