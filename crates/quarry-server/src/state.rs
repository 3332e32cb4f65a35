use std::sync::Arc;

use quarry_client::{HttpEmbeddingTrigger, HttpUsageRecorder, ScrapeProviderFactory};
use quarry_core::{
    LaunchService, OutputFormatter, PollConfig, PollService, RecoveryConfig, RecoveryService,
    ScrapersConfig, SweeperConfig, SweeperService, WebhookService,
};
use quarry_db::{DocumentRepository, JobRepository};

/// Result sink wired to the database and the downstream HTTP collaborators.
pub type ResultFormatter =
    OutputFormatter<DocumentRepository, HttpEmbeddingTrigger, HttpUsageRecorder>;

pub type Launcher = LaunchService<JobRepository, ScrapeProviderFactory, ResultFormatter>;
pub type Poller = PollService<JobRepository, ScrapeProviderFactory, ResultFormatter>;
pub type WebhookReceiver = WebhookService<JobRepository, ScrapeProviderFactory, ResultFormatter>;
pub type Recovery = RecoveryService<JobRepository, ScrapeProviderFactory, ResultFormatter>;
pub type Sweeper = SweeperService<JobRepository, ScrapeProviderFactory, ResultFormatter>;

/// Shared application state for all handlers.
///
/// Axum clones this per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Creates jobs and starts provider runs
    pub launcher: Launcher,

    /// Client-driven status checks
    pub poller: Poller,

    /// Provider completion callbacks
    pub webhook: WebhookReceiver,

    /// Stale-job recovery sweeps
    pub recovery: Recovery,

    /// Job repository for reads that never contact a provider
    pub job_repo: JobRepository,

    /// Secret expected in the `token` query parameter of webhook deliveries
    pub webhook_secret: Option<String>,

    /// Bearer token for job endpoints (None = job endpoints disabled)
    pub admin_token: Option<String>,
}

impl AppState {
    /// Creates a new application state with all services initialized.
    pub fn new(
        pool: sqlx::PgPool,
        factory: ScrapeProviderFactory,
        sink: ResultFormatter,
        scrapers: Arc<ScrapersConfig>,
    ) -> Self {
        let job_repo = JobRepository::new(pool);

        Self {
            launcher: LaunchService::new(job_repo.clone(), factory.clone(), sink.clone(), scrapers),
            poller: PollService::new(
                job_repo.clone(),
                factory.clone(),
                sink.clone(),
                PollConfig::default(),
            ),
            webhook: WebhookService::new(job_repo.clone(), factory.clone(), sink.clone()),
            recovery: RecoveryService::new(
                job_repo.clone(),
                factory,
                sink,
                RecoveryConfig::default(),
            ),
            job_repo,
            webhook_secret: None,
            admin_token: None,
        }
    }

    pub fn with_admin_token(mut self, token: Option<String>) -> Self {
        self.admin_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty());
        self
    }

    /// Background sweeper sharing this state's recovery service.
    pub fn sweeper(&self, config: SweeperConfig) -> Sweeper {
        SweeperService::new(self.recovery.clone(), config)
    }
}
