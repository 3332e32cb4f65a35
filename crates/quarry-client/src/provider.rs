//! Scrape provider dispatch and factory.
//!
//! [`ScrapeProvider`] uses `impl Future` return types, so it is not object
//! safe. [`ScrapeProviderEnum`] provides runtime selection instead, and
//! [`ScrapeProviderFactory`] picks the variant from a job's stored
//! [`ProviderKind`].
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use quarry_client::{ApifyClient, ScrapeProviderFactory};
//! use quarry_core::traits::ProviderFactory;
//! use quarry_core::{ProviderKind, ScrapersConfig};
//!
//! # fn example() -> Result<(), quarry_core::AppError> {
//! let apify = ApifyClient::new("apify_api_token", Arc::new(ScrapersConfig::default()))?;
//! let factory = ScrapeProviderFactory::new().with_apify(apify);
//! let provider = factory.create(ProviderKind::Apify)?;
//! # Ok(())
//! # }
//! ```

use quarry_core::traits::{ProviderFactory, RunStatus, ScrapeProvider, StartOutcome, StartRequest};
use quarry_core::{AppError, ProviderKind};
use serde_json::Value;

use crate::{ApifyClient, DirectClient};

/// Unified scrape provider wrapping the concrete clients.
#[derive(Clone)]
pub enum ScrapeProviderEnum {
    /// Apify actors (asynchronous runs).
    Apify(ApifyClient),
    /// Direct endpoint (synchronous).
    Direct(DirectClient),
}

impl ScrapeProvider for ScrapeProviderEnum {
    fn name(&self) -> &'static str {
        match self {
            Self::Apify(c) => c.name(),
            Self::Direct(c) => c.name(),
        }
    }

    async fn start_job(&self, request: &StartRequest) -> Result<StartOutcome, AppError> {
        match self {
            Self::Apify(c) => c.start_job(request).await,
            Self::Direct(c) => c.start_job(request).await,
        }
    }

    async fn check_status(&self, run_id: &str) -> Result<RunStatus, AppError> {
        match self {
            Self::Apify(c) => c.check_status(run_id).await,
            Self::Direct(c) => c.check_status(run_id).await,
        }
    }

    async fn fetch_result(&self, handle: &str) -> Result<Vec<Value>, AppError> {
        match self {
            Self::Apify(c) => c.fetch_result(handle).await,
            Self::Direct(c) => c.fetch_result(handle).await,
        }
    }
}

/// Builds provider clients for the configured provider kinds.
#[derive(Clone, Default)]
pub struct ScrapeProviderFactory {
    apify: Option<ApifyClient>,
    direct: Option<DirectClient>,
}

impl ScrapeProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apify(mut self, client: ApifyClient) -> Self {
        self.apify = Some(client);
        self
    }

    pub fn with_direct(mut self, client: DirectClient) -> Self {
        self.direct = Some(client);
        self
    }

    /// Provider kinds this factory can serve.
    pub fn configured(&self) -> Vec<ProviderKind> {
        let mut kinds = Vec::new();
        if self.apify.is_some() {
            kinds.push(ProviderKind::Apify);
        }
        if self.direct.is_some() {
            kinds.push(ProviderKind::Direct);
        }
        kinds
    }
}

impl ProviderFactory for ScrapeProviderFactory {
    type Provider = ScrapeProviderEnum;

    fn create(&self, kind: ProviderKind) -> Result<Self::Provider, AppError> {
        let provider = match kind {
            ProviderKind::Apify => self.apify.clone().map(ScrapeProviderEnum::Apify),
            ProviderKind::Direct => self.direct.clone().map(ScrapeProviderEnum::Direct),
        };
        provider.ok_or_else(|| {
            AppError::ConfigError(format!("Provider '{}' is not configured", kind))
        })
    }
}
