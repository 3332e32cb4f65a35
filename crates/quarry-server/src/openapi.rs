//! OpenAPI documentation configuration.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::dto::{
    DocumentDto, HealthResponse, JobListResponse, JobResponse, LaunchJobRequest,
    LaunchJobResponse, ListJobsQuery, PollResponse, RecoverQuery, RecoveryDetailDto,
    RecoveryResponse, ResultDto, ServiceStatus, WebhookAck,
};
use crate::handlers::{health, jobs, recovery, webhooks};

/// OpenAPI documentation for the Quarry API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Quarry API",
        version = "1.0.0",
        description = "Scrape-job orchestration for third-party scraping providers.

Quarry launches scrape jobs on external providers and resolves each job exactly
once, through whichever of client polling, provider webhooks or the stale-job
recovery sweep observes completion first.

## Quick Start

1. Check server health: `GET /api/v1/health`
2. Launch a job: `POST /api/v1/jobs`
3. Poll until the status is `scraped` or `failed`: `POST /api/v1/jobs/{id}/poll`
"
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        health::health_check,
        jobs::launch_job,
        jobs::poll_job,
        jobs::get_job,
        jobs::list_jobs,
        recovery::recover_jobs,
        webhooks::receive_webhook,
    ),
    components(
        schemas(
            // Request types
            LaunchJobRequest,
            ListJobsQuery,
            RecoverQuery,
            // Response types
            HealthResponse,
            ServiceStatus,
            JobResponse,
            ResultDto,
            DocumentDto,
            LaunchJobResponse,
            PollResponse,
            JobListResponse,
            WebhookAck,
            RecoveryResponse,
            RecoveryDetailDto,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "system", description = "System health"),
        (name = "jobs", description = "Scrape job lifecycle"),
        (name = "webhooks", description = "Provider completion callbacks"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` security scheme used by job endpoints.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
