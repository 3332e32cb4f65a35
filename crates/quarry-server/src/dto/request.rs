//! Request DTOs for API endpoints.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use quarry_core::{AppError, CreateJobRequest, OutputConfig, ProviderKind, ScraperType};

/// Default page size for job listings.
pub const DEFAULT_LIST_LIMIT: usize = 20;

/// Maximum page size for job listings.
pub const MAX_LIST_LIMIT: usize = 100;

/// Request body for launching a scrape job.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LaunchJobRequest {
    /// Owning project
    pub project_id: Uuid,

    /// Scraper type: profile, posts or comments
    #[schema(example = "profile")]
    pub scraper_type: String,

    /// Provider: apify (default) or direct
    #[schema(example = "apify")]
    pub provider: Option<String>,

    /// Provider input, e.g. `{"username": ["nasa"]}`
    #[schema(value_type = Object)]
    pub provider_config: serde_json::Value,

    /// Output formatting overrides
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub output_config: Option<serde_json::Value>,
}

impl LaunchJobRequest {
    /// Parse the request into a job creation request.
    pub fn into_create_request(self) -> Result<CreateJobRequest, AppError> {
        let scraper_type: ScraperType = self.scraper_type.parse()?;
        let provider: ProviderKind = match self.provider.as_deref() {
            Some(name) => name.parse()?,
            None => ProviderKind::default(),
        };
        let output_config: OutputConfig = match self.output_config {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                AppError::ValidationError(format!("Invalid output_config: {}", e))
            })?,
            None => OutputConfig::default(),
        };

        Ok(
            CreateJobRequest::new(self.project_id, scraper_type, self.provider_config)
                .with_provider(provider)
                .with_output_config(output_config),
        )
    }
}

/// Query parameters for listing jobs.
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ListJobsQuery {
    /// Restrict to one project
    pub project_id: Option<Uuid>,

    /// Filter by status (pending, running, polling, scraped, failed)
    #[param(example = "running")]
    pub status: Option<String>,

    /// Maximum number of jobs (default: 20, max: 100)
    #[param(example = 20)]
    pub limit: Option<usize>,
}

impl ListJobsQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

/// Query parameters for a recovery sweep.
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct RecoverQuery {
    /// Only sweep jobs of this project
    pub project_id: Option<Uuid>,
}

/// Query parameters of a webhook delivery.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WebhookQuery {
    /// Shared secret registered with the webhook URL
    pub token: Option<String>,
}
