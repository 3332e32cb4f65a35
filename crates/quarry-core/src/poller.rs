//! Poll service: client-driven status checks for a single job.

use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PollConfig;
use crate::error::AppError;
use crate::job::ScrapeJob;
use crate::job_store::JobStore;
use crate::resolver::Resolver;
use crate::traits::{ProviderFactory, ResultSink, RunStatus, ScrapeProvider};

/// Result of a poll.
#[derive(Debug, Clone)]
pub struct PollOutcome {
    /// The job after the poll.
    pub job: ScrapeJob,
    /// Suggested delay before polling again; `None` once the job is terminal.
    pub retry_after: Option<Duration>,
}

/// Checks in-flight jobs against their provider on demand.
#[derive(Clone)]
pub struct PollService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    store: S,
    factory: F,
    resolver: Resolver<S, R>,
    config: PollConfig,
}

impl<S, F, R> PollService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    pub fn new(store: S, factory: F, sink: R, config: PollConfig) -> Self {
        Self {
            resolver: Resolver::new(store.clone(), sink),
            store,
            factory,
            config,
        }
    }

    /// Poll a job.
    ///
    /// - terminal job: returned as stored, no provider call
    /// - no run id yet: returned unchanged
    /// - provider still running: `last_checked_at` updated
    /// - provider finished: conditional terminal transition
    ///
    /// # Errors
    ///
    /// `JobNotFound` for an unknown id. Provider and fetch failures are
    /// returned with the job left unchanged; check
    /// [`AppError::is_retryable`] to decide whether to poll again.
    pub async fn poll(&self, job_id: Uuid) -> Result<PollOutcome, AppError> {
        let job = self.load(job_id).await?;
        if job.status.is_terminal() {
            return Ok(self.outcome(job));
        }

        let Some(run_id) = job.external_run_id.clone() else {
            debug!(%job_id, status = %job.status, "Job has no provider run yet");
            return Ok(self.outcome(job));
        };

        let provider = self.factory.create(job.provider)?;
        let status = provider.check_status(&run_id).await.inspect_err(|e| {
            warn!(%job_id, %run_id, error = %e, "Provider status check failed");
        })?;

        match status {
            RunStatus::Running => {
                let job = match self.store.touch(job_id).await? {
                    Some(job) => job,
                    None => self.load(job_id).await?,
                };
                Ok(self.outcome(job))
            }
            RunStatus::NotFound => Err(AppError::RunNotFound(run_id)),
            terminal => {
                let outcome = self
                    .resolver
                    .settle(&provider, &job, terminal, false)
                    .await
                    .inspect_err(|e| {
                        warn!(%job_id, %run_id, error = %e, "Failed to fetch provider result");
                    })?;
                let job = match outcome {
                    Some(outcome) => outcome.into_job(),
                    None => self.load(job_id).await?,
                };
                Ok(self.outcome(job))
            }
        }
    }

    fn outcome(&self, job: ScrapeJob) -> PollOutcome {
        let retry_after = job.status.is_transient().then_some(self.config.retry_after);
        PollOutcome { job, retry_after }
    }

    async fn load(&self, job_id: Uuid) -> Result<ScrapeJob, AppError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(AppError::JobNotFound(job_id))
    }
}
