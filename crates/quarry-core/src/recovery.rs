//! Stale-job recovery.
//!
//! A sweep selects transient jobs idle for longer than the stale
//! threshold and asks their provider directly for the run state. Terminal
//! states go through the same conditional transition as polling and webhooks,
//! so recovery never overwrites a result committed by a faster path.
//!
//! Per candidate:
//!
//! ```text
//! retry_count ≥ max_retries ──→ force-fail (no provider call)
//! retry_count += 1
//! no run id (launch never completed) ──→ force-fail
//! check_status
//!   ├── Running ───────→ still_running
//!   ├── NotFound ──────→ force-fail (provider lost the run)
//!   ├── Succeeded ─────→ fetch, normalize, commit scraped
//!   ├── Failed ────────→ commit failed
//!   └── error ─────────→ error (next sweep retries)
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RecoveryConfig;
use crate::error::AppError;
use crate::job::{JobResolution, JobStatus, ScrapeJob, TransitionOutcome};
use crate::job_store::JobStore;
use crate::resolver::Resolver;
use crate::traits::{ProviderFactory, ResultSink, RunStatus, ScrapeProvider};

/// What a sweep did with one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryOutcome {
    /// Recovery committed `scraped`.
    Recovered,
    /// Recovery committed `failed`.
    Failed,
    /// The provider still reports the run as in progress.
    StillRunning,
    /// Another path resolved the job first.
    AlreadyResolved,
    /// The check itself failed; the job is retried on a later sweep.
    Error,
}

impl RecoveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryOutcome::Recovered => "recovered",
            RecoveryOutcome::Failed => "failed",
            RecoveryOutcome::StillRunning => "still_running",
            RecoveryOutcome::AlreadyResolved => "already_resolved",
            RecoveryOutcome::Error => "error",
        }
    }
}

/// Per-job result of a sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDetail {
    pub job_id: Uuid,
    pub outcome: RecoveryOutcome,
    /// Job status after processing.
    pub status: JobStatus,
    pub message: Option<String>,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub recovered_count: usize,
    pub failed_count: usize,
    pub details: Vec<RecoveryDetail>,
}

impl RecoveryReport {
    fn push(&mut self, detail: RecoveryDetail) {
        match detail.outcome {
            RecoveryOutcome::Recovered => self.recovered_count += 1,
            RecoveryOutcome::Failed => self.failed_count += 1,
            _ => {}
        }
        self.details.push(detail);
    }

    /// Number of candidates examined.
    pub fn examined(&self) -> usize {
        self.details.len()
    }
}

/// Message recorded for a job whose launch never recorded a provider run.
pub fn launch_incomplete_message() -> String {
    "Launch never completed; no provider run was recorded for this job".to_string()
}

/// Message recorded when the provider no longer knows a run.
pub fn lost_run_message(run_id: &str) -> String {
    format!(
        "Provider has no record of run {}; provider-side state was lost",
        run_id
    )
}

/// Message recorded when a job exhausts its recovery attempts.
pub fn retries_exhausted_message(attempts: u32) -> String {
    format!(
        "Job did not complete after {} recovery attempts",
        attempts
    )
}

/// Sweeps stale jobs and forces an authoritative resolution.
#[derive(Clone)]
pub struct RecoveryService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    store: S,
    factory: F,
    resolver: Resolver<S, R>,
    config: RecoveryConfig,
}

impl<S, F, R> RecoveryService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    pub fn new(store: S, factory: F, sink: R, config: RecoveryConfig) -> Self {
        Self {
            resolver: Resolver::new(store.clone(), sink),
            store,
            factory,
            config,
        }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Run one sweep, optionally limited to a project.
    ///
    /// Only the candidate query can fail the sweep; per-job problems are
    /// recorded in the report.
    pub async fn sweep(&self, project_id: Option<Uuid>) -> Result<RecoveryReport, AppError> {
        let cutoff = Utc::now() - self.config.stale_threshold;
        let candidates = self
            .store
            .find_stale_jobs(cutoff, project_id, self.config.batch_size)
            .await?;

        let mut report = RecoveryReport::default();
        for job in candidates {
            report.push(self.recover_job(job).await);
        }

        if !report.details.is_empty() {
            info!(
                examined = report.examined(),
                recovered = report.recovered_count,
                failed = report.failed_count,
                "Recovery sweep finished"
            );
        }
        Ok(report)
    }

    async fn recover_job(&self, job: ScrapeJob) -> RecoveryDetail {
        let job_id = job.id;
        match self.try_recover(job).await {
            Ok(detail) => detail,
            Err((status, e)) => {
                warn!(%job_id, error = %e, "Recovery check failed");
                RecoveryDetail {
                    job_id,
                    outcome: RecoveryOutcome::Error,
                    status,
                    message: Some(e.to_string()),
                }
            }
        }
    }

    async fn try_recover(&self, job: ScrapeJob) -> Result<RecoveryDetail, (JobStatus, AppError)> {
        let status = job.status;

        if !job.can_retry_recovery(self.config.max_retries) {
            let message = retries_exhausted_message(job.retry_count);
            return self
                .force_fail(&job, message)
                .await
                .map_err(|e| (status, e));
        }

        match self.store.record_recovery_attempt(job.id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Ok(self.already_resolved(&job).await),
            Err(e) => return Err((status, e)),
        }

        // A stale pending job lost its launch between row creation and run start.
        let Some(run_id) = job.external_run_id.clone() else {
            warn!(job_id = %job.id, %status, "Job has no provider run");
            return self
                .force_fail(&job, launch_incomplete_message())
                .await
                .map_err(|e| (status, e));
        };

        let provider = self.factory.create(job.provider).map_err(|e| (status, e))?;
        let run_status = provider
            .check_status(&run_id)
            .await
            .map_err(|e| (status, e))?;

        match run_status {
            RunStatus::Running => Ok(RecoveryDetail {
                job_id: job.id,
                outcome: RecoveryOutcome::StillRunning,
                status,
                message: None,
            }),
            RunStatus::NotFound => {
                warn!(job_id = %job.id, %run_id, "Provider lost run");
                self.force_fail(&job, lost_run_message(&run_id))
                    .await
                    .map_err(|e| (status, e))
            }
            terminal => {
                let outcome = self
                    .resolver
                    .settle(&provider, &job, terminal, true)
                    .await
                    .map_err(|e| (status, e))?;
                match outcome {
                    Some(outcome) => Ok(detail_for(outcome)),
                    None => Ok(self.already_resolved(&job).await),
                }
            }
        }
    }

    async fn force_fail(&self, job: &ScrapeJob, message: String) -> Result<RecoveryDetail, AppError> {
        let resolution = JobResolution::failed(message).by_recovery();
        let outcome = self.resolver.commit(job.id, resolution).await?;
        Ok(detail_for(outcome))
    }

    async fn already_resolved(&self, job: &ScrapeJob) -> RecoveryDetail {
        let status = match self.store.get_job(job.id).await {
            Ok(Some(current)) => current.status,
            _ => job.status,
        };
        RecoveryDetail {
            job_id: job.id,
            outcome: RecoveryOutcome::AlreadyResolved,
            status,
            message: None,
        }
    }
}

fn detail_for(outcome: TransitionOutcome) -> RecoveryDetail {
    let committed = outcome.is_committed();
    let job = outcome.into_job();
    let outcome = match (committed, job.status) {
        (true, JobStatus::Scraped) => RecoveryOutcome::Recovered,
        (true, _) => RecoveryOutcome::Failed,
        (false, _) => RecoveryOutcome::AlreadyResolved,
    };
    RecoveryDetail {
        job_id: job.id,
        outcome,
        status: job.status,
        message: job.error_message,
    }
}
