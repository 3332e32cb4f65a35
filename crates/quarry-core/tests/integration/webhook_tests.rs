//! Integration tests for WebhookService.

use std::sync::atomic::Ordering;

use chrono::{TimeDelta, Utc};

use crate::integration::common::{Harness, MockProvider, profile_items};
use quarry_core::traits::RunStatus;
use quarry_core::{
    JobStatus, RecoveryConfig, WebhookNotification, WebhookOutcome, WebhookRunState,
};

fn succeeded(run_id: &str, dataset_id: Option<&str>) -> WebhookNotification {
    WebhookNotification {
        run_id: run_id.to_string(),
        state: WebhookRunState::Succeeded {
            dataset_id: dataset_id.map(str::to_string),
        },
    }
}

#[tokio::test]
async fn test_webhook_resolves_running_job() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.set_result("ds-1", profile_items());

    let outcome = harness.webhook().handle(succeeded("r1", Some("ds-1"))).await;

    assert_eq!(outcome, WebhookOutcome::Resolved(JobStatus::Scraped));
    let stored = harness.store.job(job.id);
    assert_eq!(stored.status, JobStatus::Scraped);
    assert_eq!(stored.result.map(|r| r.len()), Some(2));
    assert_eq!(harness.embeddings.count(), 2);
    assert_eq!(
        harness.provider.status_calls.load(Ordering::SeqCst),
        0,
        "a dataset id in the payload avoids a status call"
    );
}

/// The second delivery for a terminal job is a no-op.
#[tokio::test]
async fn test_duplicate_delivery_is_noop() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.set_result("ds-1", profile_items());
    let webhook = harness.webhook();

    webhook.handle(succeeded("r1", Some("ds-1"))).await;
    let before = harness.store.job(job.id);
    let fetches = harness.provider.fetch_calls.load(Ordering::SeqCst);

    let outcome = webhook.handle(succeeded("r1", Some("ds-1"))).await;

    assert_eq!(outcome, WebhookOutcome::Duplicate);
    let after = harness.store.job(job.id);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.completed_at, before.completed_at);
    assert_eq!(after.result, before.result);
    assert_eq!(harness.provider.fetch_calls.load(Ordering::SeqCst), fetches);
    assert_eq!(harness.usage.calls_for(job.id), 1);
    assert_eq!(harness.embeddings.count(), 2);
}

#[tokio::test]
async fn test_webhook_failed_run() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;

    let outcome = harness
        .webhook()
        .handle(WebhookNotification {
            run_id: "r1".to_string(),
            state: WebhookRunState::Failed {
                message: "Actor run TIMED-OUT".to_string(),
            },
        })
        .await;

    assert_eq!(outcome, WebhookOutcome::Resolved(JobStatus::Failed));
    let stored = harness.store.job(job.id);
    assert_eq!(stored.error_message.as_deref(), Some("Actor run TIMED-OUT"));
}

#[tokio::test]
async fn test_webhook_unknown_run_is_ignored() {
    let harness = Harness::new(MockProvider::new());

    let outcome = harness.webhook().handle(succeeded("nope", Some("ds"))).await;

    assert_eq!(outcome, WebhookOutcome::UnknownRun);
}

#[tokio::test]
async fn test_webhook_non_terminal_state_is_ignored() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;

    let outcome = harness
        .webhook()
        .handle(WebhookNotification {
            run_id: "r1".to_string(),
            state: WebhookRunState::Other("RUNNING".to_string()),
        })
        .await;

    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert_eq!(harness.store.job(job.id).status, JobStatus::Running);
}

/// A non-terminal delivery counts as activity and keeps the job off the stale list.
#[tokio::test]
async fn test_non_terminal_webhook_refreshes_last_check() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.store.backdate(job.id, TimeDelta::hours(1));
    let before = Utc::now();

    let outcome = harness
        .webhook()
        .handle(WebhookNotification {
            run_id: "r1".to_string(),
            state: WebhookRunState::Other("RUNNING".to_string()),
        })
        .await;

    assert_eq!(outcome, WebhookOutcome::Ignored);
    let stored = harness.store.job(job.id);
    assert!(stored.last_checked_at.is_some_and(|t| t >= before));

    let report = harness
        .recovery_with(RecoveryConfig::default())
        .sweep(None)
        .await
        .unwrap();
    assert_eq!(report.examined(), 0);
}

/// Without a dataset id the receiver asks the provider for the handle.
#[tokio::test]
async fn test_webhook_without_dataset_queries_provider() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.succeed("r1", "ds-9", profile_items());

    let outcome = harness.webhook().handle(succeeded("r1", None)).await;

    assert_eq!(outcome, WebhookOutcome::Resolved(JobStatus::Scraped));
    assert_eq!(harness.provider.status_calls.load(Ordering::SeqCst), 1);
    let stored = harness.store.job(job.id);
    assert_eq!(stored.result.and_then(|r| r.source).as_deref(), Some("ds-9"));
}

/// Internal failures are swallowed: the job stays transient, last check is recorded.
#[tokio::test]
async fn test_webhook_fetch_failure_defers_to_polling() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.set_result("ds-1", profile_items());
    harness.provider.fail_fetches(1);

    let outcome = harness.webhook().handle(succeeded("r1", Some("ds-1"))).await;

    assert_eq!(outcome, WebhookOutcome::Deferred);
    let stored = harness.store.job(job.id);
    assert_eq!(stored.status, JobStatus::Running);
    assert!(stored.last_checked_at.is_some());

    // A later poll settles it.
    harness.provider.succeed("r1", "ds-1", profile_items());
    let polled = harness.poller().poll(job.id).await.unwrap();
    assert_eq!(polled.job.status, JobStatus::Scraped);
    assert_eq!(harness.usage.calls_for(job.id), 1);
}

/// A poll that already resolved the job makes the late webhook a duplicate.
#[tokio::test]
async fn test_late_webhook_after_poll() {
    let harness = Harness::new(MockProvider::new().accepts_async("r1", true));
    let job = harness.launch_profile().await;
    harness.provider.succeed("r1", "ds-1", profile_items());

    harness.poller().poll(job.id).await.unwrap();
    let outcome = harness.webhook().handle(succeeded("r1", Some("ds-1"))).await;

    assert_eq!(outcome, WebhookOutcome::Duplicate);
    assert_eq!(harness.usage.calls_for(job.id), 1);

    // A run reported failed after the fact changes nothing either.
    harness.provider.set_status(
        "r1",
        RunStatus::Failed {
            message: "late".to_string(),
        },
    );
    assert_eq!(harness.store.job(job.id).status, JobStatus::Scraped);
}
