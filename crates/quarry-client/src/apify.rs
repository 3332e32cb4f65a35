//! Apify actor client.
//!
//! Runs are started asynchronously against the actor configured for each
//! scraper type. When a webhook URL is configured, an ad-hoc webhook is
//! registered with every run so Apify notifies the receiver on completion.
//!
//! # API Endpoints
//!
//! - `POST /acts/{actor}/runs` starts a run
//! - `GET /actor-runs/{run_id}` reports run state
//! - `GET /datasets/{dataset_id}/items` returns the scraped items

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quarry_core::traits::{RunStatus, ScrapeProvider, StartOutcome, StartRequest};
use quarry_core::{AppError, HttpConfig, ScrapersConfig, WebhookNotification, WebhookRunState};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::http::{build_client, ensure_success, parse_error, send_error};

/// Default Apify API root.
pub const APIFY_BASE_URL: &str = "https://api.apify.com/v2";

/// Run events an ad-hoc webhook subscribes to.
const WEBHOOK_EVENTS: [&str; 4] = [
    "ACTOR.RUN.SUCCEEDED",
    "ACTOR.RUN.FAILED",
    "ACTOR.RUN.ABORTED",
    "ACTOR.RUN.TIMED_OUT",
];

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: T,
}

/// Run metadata as returned by the runs endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApifyRun {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub default_dataset_id: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl ApifyRun {
    /// Maps Apify's run status onto [`RunStatus`].
    pub fn run_status(&self) -> RunStatus {
        match self.status.as_str() {
            "SUCCEEDED" => match &self.default_dataset_id {
                Some(dataset_id) => RunStatus::Succeeded {
                    handle: dataset_id.clone(),
                },
                None => RunStatus::Failed {
                    message: format!("Actor run {} succeeded without a dataset", self.id),
                },
            },
            "FAILED" | "ABORTED" | "TIMED-OUT" => RunStatus::Failed {
                message: self
                    .status_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| format!("Actor run {}", self.status)),
            },
            // READY, RUNNING, TIMING-OUT, ABORTING
            _ => RunStatus::Running,
        }
    }
}

/// Body Apify posts to an ad-hoc webhook with the default payload template.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApifyWebhookPayload {
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub event_data: Option<ApifyEventData>,
    #[serde(default)]
    pub resource: Option<ApifyWebhookResource>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApifyEventData {
    #[serde(default)]
    pub actor_run_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApifyWebhookResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub default_dataset_id: Option<String>,
    #[serde(default)]
    pub status_message: Option<String>,
}

impl ApifyWebhookPayload {
    /// Converts the payload into a provider-neutral notification.
    ///
    /// Returns `None` when the payload names no run.
    pub fn into_notification(self) -> Option<WebhookNotification> {
        let resource = self.resource;
        let run_id = self
            .event_data
            .and_then(|d| d.actor_run_id)
            .or_else(|| resource.as_ref().and_then(|r| r.id.clone()))?;

        let status = resource
            .as_ref()
            .and_then(|r| r.status.clone())
            .or_else(|| self.event_type.as_deref().and_then(status_from_event))
            .unwrap_or_default();

        let state = match status.as_str() {
            "SUCCEEDED" => WebhookRunState::Succeeded {
                dataset_id: resource.and_then(|r| r.default_dataset_id),
            },
            "FAILED" | "ABORTED" | "TIMED-OUT" => WebhookRunState::Failed {
                message: resource
                    .and_then(|r| r.status_message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| format!("Actor run {}", status)),
            },
            _ => WebhookRunState::Other(status),
        };

        Some(WebhookNotification { run_id, state })
    }
}

fn status_from_event(event_type: &str) -> Option<String> {
    let status = match event_type {
        "ACTOR.RUN.SUCCEEDED" => "SUCCEEDED",
        "ACTOR.RUN.FAILED" => "FAILED",
        "ACTOR.RUN.ABORTED" => "ABORTED",
        "ACTOR.RUN.TIMED_OUT" => "TIMED-OUT",
        _ => return None,
    };
    Some(status.to_string())
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the Apify platform.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use quarry_client::ApifyClient;
/// use quarry_core::ScrapersConfig;
///
/// # fn example() -> Result<(), quarry_core::AppError> {
/// let client = ApifyClient::new("apify_api_token", Arc::new(ScrapersConfig::default()))?
///     .with_webhook_url("https://quarry.example.com/api/v1/webhooks/apify?token=secret");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApifyClient {
    client: Client,
    token: String,
    base_url: Url,
    scrapers: Arc<ScrapersConfig>,
    webhook_url: Option<String>,
    timeout: Duration,
}

impl ApifyClient {
    const NAME: &'static str = "apify";

    /// Creates a client against the public Apify API.
    pub fn new(token: &str, scrapers: Arc<ScrapersConfig>) -> Result<Self, AppError> {
        Self::with_config(token, scrapers, &HttpConfig::default())
    }

    pub fn with_config(
        token: &str,
        scrapers: Arc<ScrapersConfig>,
        http_config: &HttpConfig,
    ) -> Result<Self, AppError> {
        if token.trim().is_empty() {
            return Err(AppError::ConfigError("Apify token is empty".to_string()));
        }
        Ok(Self {
            client: build_client(http_config)?,
            token: token.to_string(),
            base_url: parse_base_url(APIFY_BASE_URL)?,
            scrapers,
            webhook_url: None,
            timeout: http_config.timeout,
        })
    }

    /// Points the client at a different API root.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, AppError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    /// Registers a completion webhook with every run this client starts.
    pub fn with_webhook_url(mut self, webhook_url: impl Into<String>) -> Self {
        self.webhook_url = Some(webhook_url.into());
        self
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// Base64 of the ad-hoc webhook definition, as Apify expects in `webhooks`.
    fn encoded_webhooks(webhook_url: &str) -> String {
        let definition = json!([{
            "eventTypes": WEBHOOK_EVENTS,
            "requestUrl": webhook_url,
        }]);
        STANDARD.encode(definition.to_string())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, AppError> {
        request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout.as_secs(), "Apify"))
    }

    /// Starts an actor run and returns its metadata.
    pub async fn start_run(&self, actor_id: &str, input: &Value) -> Result<ApifyRun, AppError> {
        // Actor ids use `~` in place of `/` inside paths.
        let url = self.endpoint(&format!("acts/{}/runs", actor_id.replace('/', "~")))?;
        let mut request = self.client.post(url).json(input);
        if let Some(webhook_url) = &self.webhook_url {
            request = request.query(&[("webhooks", Self::encoded_webhooks(webhook_url))]);
        }

        let response = ensure_success(Self::NAME, self.send(request).await?).await?;
        let body: ApiResponse<ApifyRun> = response
            .json()
            .await
            .map_err(|e| parse_error(Self::NAME, e))?;

        tracing::debug!(actor = actor_id, run_id = %body.data.id, "Apify run started");
        Ok(body.data)
    }

    /// Fetches run metadata. `None` when Apify has no such run.
    pub async fn get_run(&self, run_id: &str) -> Result<Option<ApifyRun>, AppError> {
        let url = self.endpoint(&format!("actor-runs/{}", run_id))?;
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(Self::NAME, response).await?;
        let body: ApiResponse<ApifyRun> = response
            .json()
            .await
            .map_err(|e| parse_error(Self::NAME, e))?;
        Ok(Some(body.data))
    }

    /// Fetches every item of a dataset.
    pub async fn get_dataset_items(&self, dataset_id: &str) -> Result<Vec<Value>, AppError> {
        let url = self.endpoint(&format!("datasets/{}/items", dataset_id))?;
        let request = self
            .client
            .get(url)
            .query(&[("format", "json"), ("clean", "true")]);

        let response = ensure_success(Self::NAME, self.send(request).await?).await?;
        let items: Vec<Value> = response
            .json()
            .await
            .map_err(|e| parse_error(Self::NAME, e))?;

        tracing::debug!(dataset = dataset_id, items = items.len(), "Fetched Apify dataset");
        Ok(items)
    }
}

fn parse_base_url(base_url: &str) -> Result<Url, AppError> {
    // `join` replaces the last segment unless the base ends with a slash.
    let normalized = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|_| AppError::InvalidUrl(base_url.to_string()))
}

impl ScrapeProvider for ApifyClient {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn start_job(&self, request: &StartRequest) -> Result<StartOutcome, AppError> {
        let actor_id = self.scrapers.actor_id(request.scraper_type).ok_or_else(|| {
            AppError::ConfigError(format!(
                "No Apify actor configured for scraper type '{}'",
                request.scraper_type
            ))
        })?;

        let run = self.start_run(actor_id, &request.input).await?;
        Ok(StartOutcome::Async {
            run_id: run.id,
            webhook_registered: self.webhook_url.is_some(),
        })
    }

    async fn check_status(&self, run_id: &str) -> Result<RunStatus, AppError> {
        Ok(self
            .get_run(run_id)
            .await?
            .map(|run| run.run_status())
            .unwrap_or(RunStatus::NotFound))
    }

    async fn fetch_result(&self, handle: &str) -> Result<Vec<Value>, AppError> {
        self.get_dataset_items(handle).await
    }
}
