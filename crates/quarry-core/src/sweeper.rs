//! Background recovery sweeper.
//!
//! Runs [`RecoveryService::sweep`] on a fixed interval until cancelled:
//!
//! ```text
//! loop {
//!     1. Check for cancellation
//!     2. Sweep stale jobs
//!     3. Sleep for interval (or stop on cancellation)
//! }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use quarry_core::sweeper::{SweeperService, TracingSweeperReporter};
//! use tokio_util::sync::CancellationToken;
//!
//! let sweeper = SweeperService::new(recovery_service, SweeperConfig::default());
//! let cancel = CancellationToken::new();
//!
//! sweeper.run(cancel, &TracingSweeperReporter).await;
//! ```

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::SweeperConfig;
use crate::recovery::{RecoveryReport, RecoveryService};
use crate::job_store::JobStore;
use crate::traits::{ProviderFactory, ResultSink};

// =============================================================================
// Sweeper Events
// =============================================================================

/// Events emitted by the sweeper during operation.
#[derive(Debug, Clone)]
pub enum SweeperEvent<'a> {
    /// Sweeper started.
    Started { interval: Duration },
    /// A sweep finished.
    SweepCompleted { report: &'a RecoveryReport },
    /// A sweep could not query candidates.
    SweepFailed { error: &'a str },
    /// Sweeper stopped.
    Stopped,
}

/// Trait for reporting sweeper events.
pub trait SweeperReporter: Send + Sync {
    /// Called when a sweeper event occurs.
    ///
    /// The default implementation does nothing (silent mode).
    fn report(&self, event: SweeperEvent<'_>) {
        let _ = event;
    }
}

/// Silent sweeper reporter that ignores all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSweeperReporter;

impl SweeperReporter for SilentSweeperReporter {}

/// Tracing-based sweeper reporter for server logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSweeperReporter;

impl SweeperReporter for TracingSweeperReporter {
    fn report(&self, event: SweeperEvent<'_>) {
        match event {
            SweeperEvent::Started { interval } => {
                info!(interval_secs = interval.as_secs(), "Recovery sweeper started");
            }
            SweeperEvent::SweepCompleted { report } => {
                if report.examined() == 0 {
                    debug!("No stale jobs");
                } else {
                    info!(
                        examined = report.examined(),
                        recovered = report.recovered_count,
                        failed = report.failed_count,
                        "Recovery sweep completed"
                    );
                }
            }
            SweeperEvent::SweepFailed { error } => {
                error!(%error, "Recovery sweep failed");
            }
            SweeperEvent::Stopped => {
                info!("Recovery sweeper stopped");
            }
        }
    }
}

// =============================================================================
// Sweeper Service
// =============================================================================

/// Periodically recovers stale jobs.
pub struct SweeperService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    recovery: RecoveryService<S, F, R>,
    config: SweeperConfig,
}

impl<S, F, R> SweeperService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    pub fn new(recovery: RecoveryService<S, F, R>, config: SweeperConfig) -> Self {
        Self { recovery, config }
    }

    /// Run sweeps until `cancel_token` fires.
    pub async fn run<SR: SweeperReporter>(&self, cancel_token: CancellationToken, reporter: &SR) {
        reporter.report(SweeperEvent::Started {
            interval: self.config.interval,
        });

        loop {
            if cancel_token.is_cancelled() {
                break;
            }

            self.sweep_once(reporter).await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = cancel_token.cancelled() => break,
            }
        }

        reporter.report(SweeperEvent::Stopped);
    }

    /// Run a single sweep across all projects and report it.
    pub async fn sweep_once<SR: SweeperReporter>(&self, reporter: &SR) -> Option<RecoveryReport> {
        match self.recovery.sweep(None).await {
            Ok(report) => {
                reporter.report(SweeperEvent::SweepCompleted { report: &report });
                Some(report)
            }
            Err(e) => {
                let error = e.to_string();
                reporter.report(SweeperEvent::SweepFailed { error: &error });
                None
            }
        }
    }
}
