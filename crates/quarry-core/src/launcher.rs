//! Launch service: validate, persist, start the provider run.
//!
//! ```text
//! validate input ── invalid ──→ ValidationError (no job row)
//!      │
//! create job (pending)
//!      │
//! provider.start_job
//!      ├── error ─────────────→ failed
//!      ├── Sync { items } ────→ scraped
//!      └── Async { run_id } ──→ running ──(no webhook)──→ polling
//! ```

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ScrapersConfig;
use crate::error::AppError;
use crate::formatter::has_value;
use crate::job::{CreateJobRequest, JobResolution, ScrapeJob, ScraperType};
use crate::job_store::JobStore;
use crate::resolver::Resolver;
use crate::traits::{ProviderFactory, ResultSink, ScrapeProvider, StartOutcome, StartRequest};

/// Check `input` against the required fields for `scraper_type`.
pub fn validate_input(
    scraper_type: ScraperType,
    input: &Value,
    scrapers: &ScrapersConfig,
) -> Result<(), AppError> {
    let Some(object) = input.as_object() else {
        return Err(AppError::ValidationError(
            "input config must be a JSON object".to_string(),
        ));
    };

    let missing: Vec<String> = scrapers
        .required_fields(scraper_type)
        .into_iter()
        .filter(|field| !object.get(field).is_some_and(has_value))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "{} scraper requires field(s): {}",
            scraper_type,
            missing.join(", ")
        )))
    }
}

/// Creates scrape jobs and starts their provider runs.
#[derive(Clone)]
pub struct LaunchService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    store: S,
    factory: F,
    resolver: Resolver<S, R>,
    scrapers: Arc<ScrapersConfig>,
}

impl<S, F, R> LaunchService<S, F, R>
where
    S: JobStore,
    F: ProviderFactory,
    R: ResultSink,
{
    pub fn new(store: S, factory: F, sink: R, scrapers: Arc<ScrapersConfig>) -> Self {
        Self {
            resolver: Resolver::new(store.clone(), sink),
            store,
            factory,
            scrapers,
        }
    }

    /// Launch a scrape job.
    ///
    /// Returns the job in whatever state the launch left it: `running` or
    /// `polling` for async providers, `scraped` for sync providers, `failed`
    /// when the provider rejected the start.
    ///
    /// # Errors
    ///
    /// `ValidationError` for bad input and `ConfigError` for an unconfigured
    /// provider; no job is created in either case.
    pub async fn launch(&self, request: CreateJobRequest) -> Result<ScrapeJob, AppError> {
        validate_input(request.scraper_type, &request.input_config, &self.scrapers)?;
        let provider = self.factory.create(request.provider)?;

        let defaults = self.scrapers.output_defaults(request.scraper_type);
        let request = CreateJobRequest {
            output_config: request.output_config.merged_with(&defaults),
            ..request
        };

        let job = self.store.create_job(request).await?;
        info!(
            job_id = %job.id,
            project_id = %job.project_id,
            provider = %job.provider,
            scraper_type = %job.scraper_type,
            "Scrape job created"
        );

        let start = StartRequest {
            job_id: job.id,
            scraper_type: job.scraper_type,
            input: job.input_config.clone(),
        };

        match provider.start_job(&start).await {
            Err(e) => {
                warn!(job_id = %job.id, provider = provider.name(), error = %e, "Provider rejected job");
                let outcome = self
                    .resolver
                    .commit(job.id, JobResolution::failed(e.to_string()))
                    .await?;
                Ok(outcome.into_job())
            }
            Ok(StartOutcome::Sync { items }) => {
                let outcome = self.resolver.commit_items(&job, &items, None, false).await?;
                Ok(outcome.into_job())
            }
            Ok(StartOutcome::Async {
                run_id,
                webhook_registered,
            }) => {
                info!(job_id = %job.id, %run_id, webhook_registered, "Provider run started");
                let Some(job) = self
                    .store
                    .record_run_started(job.id, &run_id, webhook_registered)
                    .await?
                else {
                    return self.reload(job.id).await;
                };

                if webhook_registered {
                    return Ok(job);
                }
                match self.store.mark_polling(job.id).await? {
                    Some(job) => Ok(job),
                    None => self.reload(job.id).await,
                }
            }
        }
    }

    async fn reload(&self, job_id: Uuid) -> Result<ScrapeJob, AppError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(AppError::JobNotFound(job_id))
    }
}
