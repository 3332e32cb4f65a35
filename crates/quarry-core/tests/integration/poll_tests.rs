//! Integration tests for PollService.

use std::sync::atomic::Ordering;
use std::time::Duration;

use uuid::Uuid;

use crate::integration::common::{Harness, MockProvider, profile_items, profile_request};
use quarry_core::traits::RunStatus;
use quarry_core::{AppError, JobStatus, JobStore};

/// launch → poll (running) → poll (succeeded) → poll again (no provider call).
#[tokio::test]
async fn test_poll_lifecycle_running_then_scraped() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    let poller = harness.poller();

    let first = poller.poll(job.id).await.unwrap();
    assert_eq!(first.job.status, JobStatus::Running);
    assert_eq!(first.retry_after, Some(Duration::from_secs(5)));
    assert!(first.job.last_checked_at.is_some());
    assert_eq!(first.job.retry_count, 0, "polling never increments retry_count");

    harness.provider.succeed("r1", "ds-1", profile_items());
    let second = poller.poll(job.id).await.unwrap();
    assert_eq!(second.job.status, JobStatus::Scraped);
    assert_eq!(second.retry_after, None);
    let result = second.job.result.clone().expect("result committed");
    assert!(!result.is_empty());
    assert_eq!(result.source.as_deref(), Some("ds-1"));

    let status_calls = harness.provider.status_calls.load(Ordering::SeqCst);
    let fetch_calls = harness.provider.fetch_calls.load(Ordering::SeqCst);

    let third = poller.poll(job.id).await.unwrap();
    assert_eq!(third.job.status, JobStatus::Scraped);
    assert_eq!(third.job.result, Some(result));
    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), status_calls);
    assert_eq!(harness.provider.fetch_calls.load(Ordering::SeqCst), fetch_calls);

    assert_eq!(harness.usage.calls_for(job.id), 1);
    assert_eq!(harness.embeddings.count(), 2);
}

/// An empty dataset is a successful scrape with no documents, not an error.
#[tokio::test]
async fn test_poll_commits_empty_dataset_as_scraped() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.succeed("r1", "ds-empty", Vec::new());

    let outcome = harness.poller().poll(job.id).await.unwrap();

    assert_eq!(outcome.job.status, JobStatus::Scraped);
    assert!(outcome.job.error_message.is_none());
    let result = outcome.job.result.expect("result committed");
    assert!(result.is_empty());
    assert_eq!(result.item_count, 0);
    assert_eq!(result.source.as_deref(), Some("ds-empty"));
}

/// A provider-reported failure is committed with the provider's message.
#[tokio::test]
async fn test_poll_commits_provider_failure() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", false));
    let job = harness.launch_profile().await;
    harness.provider.set_status(
        "r1",
        RunStatus::Failed {
            message: "Actor run ABORTED".to_string(),
        },
    );

    let outcome = harness.poller().poll(job.id).await.unwrap();

    assert_eq!(outcome.job.status, JobStatus::Failed);
    assert_eq!(outcome.job.error_message.as_deref(), Some("Actor run ABORTED"));
    assert!(!outcome.job.recovered);
    assert_eq!(harness.usage.calls_for(job.id), 0);
}

/// A fetch failure after success is retryable and leaves the job untouched.
#[tokio::test]
async fn test_poll_fetch_failure_leaves_status_unchanged() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", false));
    let job = harness.launch_profile().await;
    harness.provider.succeed("r1", "ds-1", profile_items());
    harness.provider.fail_fetches(1);

    let err = harness.poller().poll(job.id).await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(harness.store.job(job.id).status, JobStatus::Polling);

    let outcome = harness.poller().poll(job.id).await.unwrap();
    assert_eq!(outcome.job.status, JobStatus::Scraped);
}

/// A pending job without a run id is returned as-is.
#[tokio::test]
async fn test_poll_pending_job_without_run_id() {
    let harness = Harness::new(MockProvider::new());
    let job = harness.store.create_job(profile_request()).await.unwrap();

    let outcome = harness.poller().poll(job.id).await.unwrap();

    assert_eq!(outcome.job.status, JobStatus::Pending);
    assert!(outcome.retry_after.is_some());
    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_poll_unknown_job_is_not_found() {
    let harness = Harness::new(MockProvider::new());
    let id = Uuid::new_v4();

    let err = harness.poller().poll(id).await.unwrap_err();

    assert!(matches!(err, AppError::JobNotFound(found) if found == id));
}

/// A lost run is reported but left for recovery to judge.
#[tokio::test]
async fn test_poll_lost_run_is_reported_not_committed() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.set_status("r1", RunStatus::NotFound);

    let err = harness.poller().poll(job.id).await.unwrap_err();

    assert!(matches!(err, AppError::RunNotFound(ref run) if run == "r1"));
    assert!(!err.is_retryable());
    assert_eq!(harness.store.job(job.id).status, JobStatus::Running);
}
