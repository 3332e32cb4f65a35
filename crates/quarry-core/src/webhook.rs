//! Webhook service: provider-pushed completion notifications.
//!
//! Handling never fails from the provider's point of view. Whatever happens
//! internally, the caller acknowledges the delivery; problems are logged and
//! left for polling or recovery to settle.

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::job::{JobStatus, ScrapeJob, TransitionOutcome};
use crate::job_store::JobStore;
use crate::resolver::Resolver;
use crate::traits::{ProviderFactory, ResultSink, RunStatus, ScrapeProvider};

/// Run state reported by a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookRunState {
    Succeeded {
        /// Result handle, when the payload carried one.
        dataset_id: Option<String>,
    },
    Failed {
        message: String,
    },
    /// Any non-terminal state, kept verbatim for logging.
    Other(String),
}

/// A parsed webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    pub run_id: String,
    pub state: WebhookRunState,
}

/// What handling a delivery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// This delivery performed the terminal transition.
    Resolved(JobStatus),
    /// The job was already terminal; nothing changed.
    Duplicate,
    /// No job owns the run id.
    UnknownRun,
    /// The delivery reported a non-terminal state.
    Ignored,
    /// Processing failed; the job stays transient for polling or recovery.
    Deferred,
}

/// Resolves jobs from provider webhook deliveries.
#[derive(Clone)]
pub struct WebhookService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    store: S,
    factory: F,
    resolver: Resolver<S, R>,
}

impl<S, F, R> WebhookService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    pub fn new(store: S, factory: F, sink: R) -> Self {
        Self {
            resolver: Resolver::new(store.clone(), sink),
            store,
            factory,
        }
    }

    /// Handle one delivery. Infallible by contract.
    pub async fn handle(&self, notification: WebhookNotification) -> WebhookOutcome {
        let run_id = notification.run_id.clone();
        match self.process(notification).await {
            Ok(outcome) => {
                debug!(%run_id, ?outcome, "Webhook processed");
                outcome
            }
            Err((job, e)) => {
                error!(%run_id, error = %e, "Webhook processing failed");
                if let Some(job) = job {
                    if let Err(e) = self.store.touch(job.id).await {
                        warn!(job_id = %job.id, error = %e, "Failed to record webhook check");
                    }
                }
                WebhookOutcome::Deferred
            }
        }
    }

    async fn process(
        &self,
        notification: WebhookNotification,
    ) -> Result<WebhookOutcome, (Option<ScrapeJob>, AppError)> {
        let run_id = notification.run_id;
        let job = match self.store.find_by_run_id(&run_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(%run_id, "Webhook for unknown run");
                return Ok(WebhookOutcome::UnknownRun);
            }
            Err(e) => return Err((None, e)),
        };

        if job.status.is_terminal() {
            info!(job_id = %job.id, %run_id, status = %job.status, "Duplicate webhook delivery");
            return Ok(WebhookOutcome::Duplicate);
        }

        let provider = match self.factory.create(job.provider) {
            Ok(provider) => provider,
            Err(e) => return Err((Some(job), e)),
        };

        let status = match notification.state {
            WebhookRunState::Succeeded {
                dataset_id: Some(handle),
            } => RunStatus::Succeeded { handle },
            // No handle in the payload: ask the provider for it.
            WebhookRunState::Succeeded { dataset_id: None } => {
                match provider.check_status(&run_id).await {
                    Ok(status) => status,
                    Err(e) => return Err((Some(job), e)),
                }
            }
            WebhookRunState::Failed { message } => RunStatus::Failed { message },
            WebhookRunState::Other(state) => {
                debug!(job_id = %job.id, %run_id, %state, "Ignoring non-terminal webhook");
                // The delivery still proves the run is alive.
                if let Err(e) = self.store.touch(job.id).await {
                    warn!(job_id = %job.id, error = %e, "Failed to record webhook check");
                }
                return Ok(WebhookOutcome::Ignored);
            }
        };

        match self.resolver.settle(&provider, &job, status, false).await {
            Ok(Some(TransitionOutcome::Committed(job))) => Ok(WebhookOutcome::Resolved(job.status)),
            Ok(Some(TransitionOutcome::AlreadyResolved(_))) => Ok(WebhookOutcome::Duplicate),
            Ok(None) => Ok(WebhookOutcome::Ignored),
            Err(e) => Err((Some(job), e)),
        }
    }
}
