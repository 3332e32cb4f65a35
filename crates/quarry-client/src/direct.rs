//! Direct scraping endpoint client.
//!
//! A direct endpoint scrapes synchronously: the start request returns the
//! items in its response body and no run exists afterwards. The body may be
//! a bare JSON array or an object with an `items` array.

use std::time::Duration;

use quarry_core::traits::{RunStatus, ScrapeProvider, StartOutcome, StartRequest};
use quarry_core::{AppError, HttpConfig};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::{build_client, ensure_success, parse_error, send_error};

#[derive(Deserialize)]
#[serde(untagged)]
enum DirectResponse {
    Items(Vec<Value>),
    Wrapped { items: Vec<Value> },
}

/// Client for a synchronous scraping endpoint.
#[derive(Clone)]
pub struct DirectClient {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    timeout: Duration,
}

impl DirectClient {
    const NAME: &'static str = "direct";

    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, AppError> {
        Self::with_config(endpoint, api_key, &HttpConfig::default())
    }

    pub fn with_config(
        endpoint: &str,
        api_key: Option<String>,
        http_config: &HttpConfig,
    ) -> Result<Self, AppError> {
        let endpoint =
            Url::parse(endpoint).map_err(|_| AppError::InvalidUrl(endpoint.to_string()))?;
        Ok(Self {
            client: build_client(http_config)?,
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
            timeout: http_config.timeout,
        })
    }

    fn unsupported(&self, operation: &str) -> AppError {
        AppError::ConfigError(format!(
            "The direct provider is synchronous and does not support {}",
            operation
        ))
    }
}

impl ScrapeProvider for DirectClient {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn start_job(&self, request: &StartRequest) -> Result<StartOutcome, AppError> {
        let body = json!({
            "type": request.scraper_type.as_str(),
            "input": request.input,
        });

        let mut builder = self.client.post(self.endpoint.clone()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout.as_secs(), self.endpoint.as_str()))?;
        let response = ensure_success(Self::NAME, response).await?;

        let items = match response
            .json::<DirectResponse>()
            .await
            .map_err(|e| parse_error(Self::NAME, e))?
        {
            DirectResponse::Items(items) | DirectResponse::Wrapped { items } => items,
        };

        tracing::debug!(job_id = %request.job_id, items = items.len(), "Direct scrape returned");
        Ok(StartOutcome::Sync { items })
    }

    async fn check_status(&self, _run_id: &str) -> Result<RunStatus, AppError> {
        Err(self.unsupported("run status checks"))
    }

    async fn fetch_result(&self, _handle: &str) -> Result<Vec<Value>, AppError> {
        Err(self.unsupported("result fetches"))
    }
}
