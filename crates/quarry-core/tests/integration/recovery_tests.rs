//! Integration tests for RecoveryService and the sweeper loop.

use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::TimeDelta;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::integration::common::{Harness, MockProvider, profile_items, profile_request};
use quarry_core::traits::RunStatus;
use quarry_core::{
    JobStatus, JobStore, RecoveryConfig, RecoveryOutcome, SilentSweeperReporter, SweeperConfig,
    SweeperService,
};

/// Fresh jobs are not candidates under the default three-minute threshold.
#[tokio::test]
async fn test_fresh_jobs_are_not_swept() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    harness.launch_profile().await;

    let report = harness
        .recovery_with(RecoveryConfig::default())
        .sweep(None)
        .await
        .unwrap();

    assert_eq!(report.examined(), 0);
    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), 0);
}

/// A stale job whose run succeeded is recovered and excluded afterwards.
#[tokio::test]
async fn test_stale_succeeded_job_is_recovered() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.store.backdate(job.id, TimeDelta::minutes(10));
    harness.provider.succeed("r1", "ds-1", profile_items());
    let recovery = harness.recovery_with(RecoveryConfig::default());

    let report = recovery.sweep(None).await.unwrap();

    assert_eq!(report.recovered_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.details[0].job_id, job.id);
    assert_eq!(report.details[0].outcome, RecoveryOutcome::Recovered);
    assert_eq!(report.details[0].status, JobStatus::Scraped);

    let stored = harness.store.job(job.id);
    assert_eq!(stored.status, JobStatus::Scraped);
    assert!(stored.recovered);
    assert_eq!(stored.retry_count, 1);
    assert_eq!(harness.usage.calls_for(job.id), 1);

    let again = recovery.sweep(None).await.unwrap();
    assert_eq!(again.examined(), 0);
}

/// A still-running job only gets its retry count bumped.
#[tokio::test]
async fn test_still_running_increments_retry_count() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", false));
    let job = harness.launch_profile().await;

    let report = harness.recovery().sweep(None).await.unwrap();

    assert_eq!(report.details[0].outcome, RecoveryOutcome::StillRunning);
    assert_eq!(report.recovered_count + report.failed_count, 0);
    let stored = harness.store.job(job.id);
    assert_eq!(stored.status, JobStatus::Polling);
    assert_eq!(stored.retry_count, 1);
}

/// A run the provider forgot is force-failed with a synthetic message.
#[tokio::test]
async fn test_lost_run_is_force_failed() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.set_status("r1", RunStatus::NotFound);

    let report = harness.recovery().sweep(None).await.unwrap();

    assert_eq!(report.failed_count, 1);
    assert_eq!(report.details[0].outcome, RecoveryOutcome::Failed);
    let stored = harness.store.job(job.id);
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.recovered);
    assert!(stored.error_message.unwrap().contains("r1"));
}

/// A job at the retry cap is failed even though the provider says running.
#[tokio::test]
async fn test_retry_cap_forces_failure_without_provider_call() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.store.set_retry_count(job.id, 5);

    let report = harness.recovery().sweep(None).await.unwrap();

    assert_eq!(report.failed_count, 1);
    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), 0);
    let stored = harness.store.job(job.id);
    assert_eq!(stored.status, JobStatus::Failed);
    assert!(stored.recovered);
}

/// Repeated sweeps of a never-finishing job end in failure after the cap.
#[tokio::test]
async fn test_repeated_sweeps_reach_the_cap() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    let recovery = harness.recovery_with(
        RecoveryConfig::default()
            .with_stale_threshold(TimeDelta::zero())
            .with_max_retries(2),
    );

    for _ in 0..2 {
        let report = recovery.sweep(None).await.unwrap();
        assert_eq!(report.details[0].outcome, RecoveryOutcome::StillRunning);
    }
    let report = recovery.sweep(None).await.unwrap();

    assert_eq!(report.details[0].outcome, RecoveryOutcome::Failed);
    assert_eq!(harness.store.job(job.id).status, JobStatus::Failed);
}

/// Provider errors are reported per job and never abort the sweep.
#[tokio::test]
async fn test_fetch_error_is_reported_and_retried_later() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.succeed("r1", "ds-1", profile_items());
    harness.provider.fail_fetches(1);
    let recovery = harness.recovery();

    let report = recovery.sweep(None).await.unwrap();
    assert_eq!(report.details[0].outcome, RecoveryOutcome::Error);
    assert!(report.details[0].message.is_some());
    assert_eq!(harness.store.job(job.id).status, JobStatus::Running);

    let report = recovery.sweep(None).await.unwrap();
    assert_eq!(report.details[0].outcome, RecoveryOutcome::Recovered);
    assert_eq!(harness.store.job(job.id).retry_count, 2);
}

/// A job stuck in pending, with no provider run recorded, is force-failed.
#[tokio::test]
async fn test_stale_pending_job_is_force_failed() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let pending = harness.store.create_job(profile_request()).await.unwrap();
    harness.store.backdate(pending.id, TimeDelta::hours(24));
    let recovery = harness.recovery();

    let report = recovery.sweep(None).await.unwrap();

    assert_eq!(report.examined(), 1);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.details[0].outcome, RecoveryOutcome::Failed);
    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), 0);

    let job = harness.store.job(pending.id);
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.recovered);
    assert!(
        job.error_message
            .as_deref()
            .is_some_and(|m| m.contains("Launch never completed"))
    );

    let again = recovery.sweep(None).await.unwrap();
    assert_eq!(again.examined(), 0);
}

/// Terminal jobs and a pending job still inside the threshold are left alone.
#[tokio::test]
async fn test_terminal_and_fresh_pending_jobs_are_not_candidates() {
    let harness = Harness::new(MockProvider::new().returns_sync(profile_items()));
    let scraped = harness.launch_profile().await;
    harness.store.create_job(profile_request()).await.unwrap();
    harness.store.backdate(scraped.id, TimeDelta::hours(1));

    let report = harness
        .recovery_with(RecoveryConfig::default())
        .sweep(None)
        .await
        .unwrap();

    assert_eq!(report.examined(), 0);
}

#[tokio::test]
async fn test_sweep_scoped_to_project() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;

    let other = harness.recovery().sweep(Some(Uuid::new_v4())).await.unwrap();
    assert_eq!(other.examined(), 0);

    let own = harness.recovery().sweep(Some(job.project_id)).await.unwrap();
    assert_eq!(own.examined(), 1);
}

#[tokio::test]
async fn test_sweep_respects_batch_size_oldest_first() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let newer = harness.launch_profile().await;
    let older = harness.store.create_job(profile_request()).await.unwrap();
    harness
        .store
        .record_run_started(older.id, "r0", true)
        .await
        .unwrap();
    harness.store.backdate(older.id, TimeDelta::minutes(30));
    harness.store.backdate(newer.id, TimeDelta::minutes(5));

    let report = harness
        .recovery_with(RecoveryConfig::default().with_batch_size(1))
        .sweep(None)
        .await
        .unwrap();

    assert_eq!(report.examined(), 1);
    assert_eq!(report.details[0].job_id, older.id);
}

/// The sweeper runs a sweep immediately and stops on cancellation.
#[tokio::test]
async fn test_sweeper_runs_until_cancelled() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.succeed("r1", "ds-1", profile_items());

    let sweeper = SweeperService::new(
        harness.recovery(),
        SweeperConfig::default().with_interval(Duration::from_millis(10)),
    );
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();

    let handle = tokio::spawn(async move {
        sweeper.run(cancel, &SilentSweeperReporter).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    stopper.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("sweeper stops")
        .unwrap();

    assert_eq!(harness.store.job(job.id).status, JobStatus::Scraped);
}
