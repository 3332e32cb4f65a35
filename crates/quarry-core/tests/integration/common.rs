//! Test utilities and mock implementations for integration tests.
//!
//! Provides in-memory implementations of every core trait. The mock job store
//! applies conditional transitions under a single `Mutex`, matching the
//! atomicity of the PostgreSQL implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use uuid::Uuid;

use quarry_core::traits::{
    DocumentStore, EmbeddingTrigger, ProviderFactory, RunStatus, ScrapeProvider, StartOutcome,
    StartRequest, UsageRecorder,
};
use quarry_core::{
    AppError, CreateJobRequest, JobResolution, JobStatus, JobStore, LaunchService,
    NormalizedDocument, OutputFormatter, PollConfig, PollService, ProviderErrorDetails,
    ProviderKind, RecoveryConfig, RecoveryService, ScrapeJob, ScraperType, ScrapersConfig,
    TransitionOutcome, WebhookService,
};

// =============================================================================
// MockJobStore
// =============================================================================

/// In-memory job store with compare-and-set transitions.
#[derive(Clone, Default)]
pub struct MockJobStore {
    jobs: Arc<Mutex<HashMap<Uuid, ScrapeJob>>>,
    /// Number of accepted terminal transitions.
    pub commits: Arc<AtomicUsize>,
    /// Number of rejected terminal transitions.
    pub rejections: Arc<AtomicUsize>,
}

impl MockJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a job; panics if missing.
    pub fn job(&self, job_id: Uuid) -> ScrapeJob {
        self.jobs.lock().unwrap().get(&job_id).cloned().expect("job exists")
    }

    /// Insert a job directly, bypassing the launcher.
    pub fn insert(&self, job: ScrapeJob) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    /// Move every activity timestamp of a job `by` into the past.
    pub fn backdate(&self, job_id: Uuid, by: TimeDelta) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.get_mut(&job_id) {
            job.created_at -= by;
            job.started_at = job.started_at.map(|t| t - by);
            job.last_checked_at = job.last_checked_at.map(|t| t - by);
        }
    }

    pub fn set_retry_count(&self, job_id: Uuid, retry_count: u32) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&job_id) {
            job.retry_count = retry_count;
        }
    }

    fn with_job<T>(&self, job_id: Uuid, f: impl FnOnce(&mut ScrapeJob) -> Option<T>) -> Option<T> {
        let mut jobs = self.jobs.lock().unwrap();
        jobs.get_mut(&job_id).and_then(f)
    }
}

impl JobStore for MockJobStore {
    async fn create_job(&self, request: CreateJobRequest) -> Result<ScrapeJob, AppError> {
        let now = Utc::now();
        let job = ScrapeJob {
            id: Uuid::new_v4(),
            project_id: request.project_id,
            provider: request.provider,
            scraper_type: request.scraper_type,
            external_run_id: None,
            status: JobStatus::Pending,
            input_config: request.input_config,
            output_config: request.output_config,
            result: None,
            error_message: None,
            webhook_registered: false,
            recovered: false,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            last_checked_at: None,
            completed_at: None,
        };
        self.insert(job.clone());
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        Ok(self.jobs.lock().unwrap().get(&job_id).cloned())
    }

    async fn find_by_run_id(&self, run_id: &str) -> Result<Option<ScrapeJob>, AppError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .find(|j| j.external_run_id.as_deref() == Some(run_id))
            .cloned())
    }

    async fn record_run_started(
        &self,
        job_id: Uuid,
        run_id: &str,
        webhook_registered: bool,
    ) -> Result<Option<ScrapeJob>, AppError> {
        Ok(self.with_job(job_id, |job| {
            if job.status != JobStatus::Pending || job.external_run_id.is_some() {
                return None;
            }
            let now = Utc::now();
            job.status = JobStatus::Running;
            job.external_run_id = Some(run_id.to_string());
            job.webhook_registered = webhook_registered;
            job.started_at = Some(now);
            job.updated_at = now;
            Some(job.clone())
        }))
    }

    async fn mark_polling(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        Ok(self.with_job(job_id, |job| {
            if job.status != JobStatus::Running {
                return None;
            }
            job.status = JobStatus::Polling;
            job.updated_at = Utc::now();
            Some(job.clone())
        }))
    }

    async fn resolve(
        &self,
        job_id: Uuid,
        resolution: JobResolution,
    ) -> Result<TransitionOutcome, AppError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&job_id).ok_or(AppError::JobNotFound(job_id))?;

        if job.status.is_terminal() {
            self.rejections.fetch_add(1, Ordering::SeqCst);
            return Ok(TransitionOutcome::AlreadyResolved(job.clone()));
        }

        let now = Utc::now();
        match resolution {
            JobResolution::Scraped { result, recovered } => {
                job.status = JobStatus::Scraped;
                job.result = Some(result);
                job.recovered = recovered;
            }
            JobResolution::Failed { message, recovered } => {
                job.status = JobStatus::Failed;
                job.error_message = Some(message);
                job.recovered = recovered;
            }
        }
        job.completed_at = Some(now);
        job.last_checked_at = Some(now);
        job.updated_at = now;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(TransitionOutcome::Committed(job.clone()))
    }

    async fn touch(&self, job_id: Uuid) -> Result<Option<ScrapeJob>, AppError> {
        Ok(self.with_job(job_id, |job| {
            if job.status.is_terminal() {
                return None;
            }
            job.last_checked_at = Some(Utc::now());
            Some(job.clone())
        }))
    }

    async fn record_recovery_attempt(&self, job_id: Uuid) -> Result<Option<u32>, AppError> {
        Ok(self.with_job(job_id, |job| {
            if job.status.is_terminal() {
                return None;
            }
            job.retry_count += 1;
            job.last_checked_at = Some(Utc::now());
            Some(job.retry_count)
        }))
    }

    async fn find_stale_jobs(
        &self,
        cutoff: DateTime<Utc>,
        project_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<ScrapeJob>, AppError> {
        let jobs = self.jobs.lock().unwrap();
        let mut stale: Vec<ScrapeJob> = jobs
            .values()
            .filter(|j| JobStatus::TRANSIENT.contains(&j.status))
            .filter(|j| j.last_activity_at() < cutoff)
            .filter(|j| project_id.is_none_or(|p| j.project_id == p))
            .cloned()
            .collect();
        stale.sort_by_key(|j| j.last_activity_at());
        stale.truncate(limit);
        Ok(stale)
    }

    async fn list_jobs(
        &self,
        project_id: Option<Uuid>,
        status: Option<JobStatus>,
        limit: usize,
    ) -> Result<Vec<ScrapeJob>, AppError> {
        let jobs = self.jobs.lock().unwrap();
        let mut listed: Vec<ScrapeJob> = jobs
            .values()
            .filter(|j| project_id.is_none_or(|p| j.project_id == p))
            .filter(|j| status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed.truncate(limit);
        Ok(listed)
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64, AppError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == status)
            .count() as i64)
    }
}

// =============================================================================
// MockProvider
// =============================================================================

#[derive(Default)]
struct ProviderState {
    start: Option<Result<StartOutcome, u16>>,
    statuses: HashMap<String, RunStatus>,
    results: HashMap<String, Vec<Value>>,
    fetch_failures: usize,
}

/// Scriptable provider.
///
/// Starts, statuses and results are configured per test; calls are counted.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<ProviderState>>,
    pub start_calls: Arc<AtomicUsize>,
    pub status_calls: Arc<AtomicUsize>,
    pub fetch_calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept runs asynchronously with `run_id`.
    pub fn accepts_async(self, run_id: &str, webhook_registered: bool) -> Self {
        self.state.lock().unwrap().start = Some(Ok(StartOutcome::Async {
            run_id: run_id.to_string(),
            webhook_registered,
        }));
        self.set_status(run_id, RunStatus::Running);
        self
    }

    /// Return `items` inline from `start_job`.
    pub fn returns_sync(self, items: Vec<Value>) -> Self {
        self.state.lock().unwrap().start = Some(Ok(StartOutcome::Sync { items }));
        self
    }

    /// Reject `start_job` with an HTTP status.
    pub fn rejects_start(self, status_code: u16) -> Self {
        self.state.lock().unwrap().start = Some(Err(status_code));
        self
    }

    pub fn set_status(&self, run_id: &str, status: RunStatus) {
        self.state
            .lock()
            .unwrap()
            .statuses
            .insert(run_id.to_string(), status);
    }

    /// Report `run_id` as succeeded with `items` behind `handle`.
    pub fn succeed(&self, run_id: &str, handle: &str, items: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state.statuses.insert(
            run_id.to_string(),
            RunStatus::Succeeded {
                handle: handle.to_string(),
            },
        );
        state.results.insert(handle.to_string(), items);
    }

    /// Store `items` behind `handle` without changing any run status.
    pub fn set_result(&self, handle: &str, items: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .results
            .insert(handle.to_string(), items);
    }

    /// Make the next `count` result fetches fail with a network error.
    pub fn fail_fetches(&self, count: usize) {
        self.state.lock().unwrap().fetch_failures = count;
    }
}

impl ScrapeProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn start_job(&self, _request: &StartRequest) -> Result<StartOutcome, AppError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        let start = self.state.lock().unwrap().start.clone();
        match start {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(status)) => Err(AppError::ProviderError(ProviderErrorDetails::from_status(
                "mock",
                status,
                "actor input rejected".to_string(),
            ))),
            None => Err(AppError::Generic("no start configured".to_string())),
        }
    }

    async fn check_status(&self, run_id: &str) -> Result<RunStatus, AppError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let status = self.state.lock().unwrap().statuses.get(run_id).cloned();
        tokio::task::yield_now().await;
        Ok(status.unwrap_or(RunStatus::NotFound))
    }

    async fn fetch_result(&self, handle: &str) -> Result<Vec<Value>, AppError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let items = {
            let mut state = self.state.lock().unwrap();
            if state.fetch_failures > 0 {
                state.fetch_failures -= 1;
                None
            } else {
                Some(state.results.get(handle).cloned().unwrap_or_default())
            }
        };
        tokio::task::yield_now().await;
        items.ok_or_else(|| AppError::NetworkError("connection reset by peer".to_string()))
    }
}

/// Factory handing out clones of one mock provider.
#[derive(Clone)]
pub struct MockProviderFactory {
    provider: MockProvider,
    configured: Vec<ProviderKind>,
}

impl MockProviderFactory {
    pub fn new(provider: MockProvider) -> Self {
        Self {
            provider,
            configured: vec![ProviderKind::Apify, ProviderKind::Direct],
        }
    }

    /// Only `kinds` are configured; others fail with a configuration error.
    pub fn only(mut self, kinds: &[ProviderKind]) -> Self {
        self.configured = kinds.to_vec();
        self
    }
}

impl ProviderFactory for MockProviderFactory {
    type Provider = MockProvider;

    fn create(&self, kind: ProviderKind) -> Result<Self::Provider, AppError> {
        if self.configured.contains(&kind) {
            Ok(self.provider.clone())
        } else {
            Err(AppError::ConfigError(format!("{} provider not configured", kind)))
        }
    }
}

// =============================================================================
// Downstream mocks
// =============================================================================

/// Document store keyed by `(job_id, source_key)`.
#[derive(Clone, Default)]
pub struct MockDocumentStore {
    documents: Arc<Mutex<HashMap<(Uuid, String), Uuid>>>,
}

impl MockDocumentStore {
    pub fn count_for(&self, job_id: Uuid) -> usize {
        self.documents
            .lock()
            .unwrap()
            .keys()
            .filter(|(j, _)| *j == job_id)
            .count()
    }
}

impl DocumentStore for MockDocumentStore {
    async fn insert_documents(
        &self,
        job: &ScrapeJob,
        documents: &[NormalizedDocument],
    ) -> Result<Vec<Uuid>, AppError> {
        let mut stored = self.documents.lock().unwrap();
        let mut created = Vec::new();
        for doc in documents {
            let key = (job.id, doc.source_key.clone());
            if !stored.contains_key(&key) {
                let id = Uuid::new_v4();
                stored.insert(key, id);
                created.push(id);
            }
        }
        Ok(created)
    }
}

/// Records every triggered document id.
#[derive(Clone, Default)]
pub struct MockEmbeddingTrigger {
    pub triggered: Arc<Mutex<Vec<Uuid>>>,
    pub fail: bool,
}

impl MockEmbeddingTrigger {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.triggered.lock().unwrap().len()
    }
}

impl EmbeddingTrigger for MockEmbeddingTrigger {
    async fn trigger(&self, document_id: Uuid) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::NetworkError("embedding service down".to_string()));
        }
        self.triggered.lock().unwrap().push(document_id);
        Ok(())
    }
}

/// Records `(job_id, units)` per usage call.
#[derive(Clone, Default)]
pub struct MockUsageRecorder {
    pub calls: Arc<Mutex<Vec<(Uuid, usize)>>>,
}

impl MockUsageRecorder {
    pub fn calls_for(&self, job_id: Uuid) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(j, _)| *j == job_id)
            .count()
    }
}

impl UsageRecorder for MockUsageRecorder {
    async fn record_usage(&self, _project_id: Uuid, job_id: Uuid, units: usize) -> Result<(), AppError> {
        self.calls.lock().unwrap().push((job_id, units));
        Ok(())
    }
}

pub type TestSink = OutputFormatter<MockDocumentStore, MockEmbeddingTrigger, MockUsageRecorder>;

// =============================================================================
// Harness
// =============================================================================

/// All mocks wired together, with constructors for each service.
pub struct Harness {
    pub store: MockJobStore,
    pub provider: MockProvider,
    pub factory: MockProviderFactory,
    pub documents: MockDocumentStore,
    pub embeddings: MockEmbeddingTrigger,
    pub usage: MockUsageRecorder,
}

impl Harness {
    pub fn new(provider: MockProvider) -> Self {
        Self::with_embeddings(provider, MockEmbeddingTrigger::default())
    }

    pub fn with_embeddings(provider: MockProvider, embeddings: MockEmbeddingTrigger) -> Self {
        Self {
            store: MockJobStore::new(),
            factory: MockProviderFactory::new(provider.clone()),
            provider,
            documents: MockDocumentStore::default(),
            embeddings,
            usage: MockUsageRecorder::default(),
        }
    }

    pub fn sink(&self) -> TestSink {
        OutputFormatter::new(
            self.documents.clone(),
            self.embeddings.clone(),
            self.usage.clone(),
        )
    }

    pub fn launcher(&self) -> LaunchService<MockJobStore, MockProviderFactory, TestSink> {
        LaunchService::new(
            self.store.clone(),
            self.factory.clone(),
            self.sink(),
            Arc::new(ScrapersConfig::default()),
        )
    }

    pub fn poller(&self) -> PollService<MockJobStore, MockProviderFactory, TestSink> {
        PollService::new(
            self.store.clone(),
            self.factory.clone(),
            self.sink(),
            PollConfig::default(),
        )
    }

    pub fn webhook(&self) -> WebhookService<MockJobStore, MockProviderFactory, TestSink> {
        WebhookService::new(self.store.clone(), self.factory.clone(), self.sink())
    }

    /// Recovery with a zero stale threshold: every running/polling job is a candidate.
    pub fn recovery(&self) -> RecoveryService<MockJobStore, MockProviderFactory, TestSink> {
        self.recovery_with(RecoveryConfig::default().with_stale_threshold(TimeDelta::zero()))
    }

    pub fn recovery_with(
        &self,
        config: RecoveryConfig,
    ) -> RecoveryService<MockJobStore, MockProviderFactory, TestSink> {
        RecoveryService::new(self.store.clone(), self.factory.clone(), self.sink(), config)
    }

    /// Launch a profile job through the launcher.
    pub async fn launch_profile(&self) -> ScrapeJob {
        self.launcher()
            .launch(profile_request())
            .await
            .expect("launch succeeds")
    }
}

pub fn profile_request() -> CreateJobRequest {
    CreateJobRequest::new(
        Uuid::new_v4(),
        ScraperType::Profile,
        json!({"username": "natgeo"}),
    )
}

/// Provider items for a profile scrape.
pub fn profile_items() -> Vec<Value> {
    vec![
        json!({
            "id": "787132",
            "username": "natgeo",
            "fullName": "National Geographic",
            "biography": "Experience the world through the eyes of National Geographic photographers.",
            "url": "https://www.instagram.com/natgeo/"
        }),
        json!({
            "id": "1234",
            "username": "natgeotravel",
            "fullName": "Nat Geo Travel",
            "biography": "Travel the world with us.",
            "url": "https://www.instagram.com/natgeotravel/"
        }),
    ]
}
