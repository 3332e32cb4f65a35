//! HTTP implementations of the downstream collaborators.
//!
//! Both collaborators are optional: without an endpoint they log at debug
//! level and succeed, so a deployment without an embedding service or a
//! usage ledger still resolves jobs normally.

use std::time::Duration;

use quarry_core::traits::{EmbeddingTrigger, UsageRecorder};
use quarry_core::{AppError, HttpConfig};
use reqwest::{Client, Url};
use serde::Serialize;
use uuid::Uuid;

use crate::http::{build_client, ensure_success, send_error};

#[derive(Clone)]
struct Endpoint {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl Endpoint {
    fn parse(url: Option<&str>, http_config: &HttpConfig) -> Result<Option<Self>, AppError> {
        let Some(url) = url.filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        let url = Url::parse(url).map_err(|_| AppError::InvalidUrl(url.to_string()))?;
        Ok(Some(Self {
            client: build_client(http_config)?,
            url,
            timeout: http_config.timeout,
        }))
    }

    async fn post<T: Serialize + ?Sized>(&self, name: &str, body: &T) -> Result<(), AppError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout.as_secs(), self.url.as_str()))?;
        ensure_success(name, response).await?;
        Ok(())
    }
}

// =============================================================================
// Embedding Trigger
// =============================================================================

#[derive(Serialize)]
struct EmbeddingRequest {
    document_id: Uuid,
}

/// Posts `{"document_id": ...}` to an embedding service.
#[derive(Clone)]
pub struct HttpEmbeddingTrigger {
    endpoint: Option<Endpoint>,
}

impl HttpEmbeddingTrigger {
    pub fn new(url: Option<&str>) -> Result<Self, AppError> {
        Self::with_config(url, &HttpConfig::default())
    }

    pub fn with_config(url: Option<&str>, http_config: &HttpConfig) -> Result<Self, AppError> {
        Ok(Self {
            endpoint: Endpoint::parse(url, http_config)?,
        })
    }

    /// A trigger that never calls out.
    pub fn disabled() -> Self {
        Self { endpoint: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

impl EmbeddingTrigger for HttpEmbeddingTrigger {
    async fn trigger(&self, document_id: Uuid) -> Result<(), AppError> {
        match &self.endpoint {
            Some(endpoint) => {
                endpoint
                    .post("embeddings", &EmbeddingRequest { document_id })
                    .await
            }
            None => {
                tracing::debug!(%document_id, "No embedding endpoint configured, skipping");
                Ok(())
            }
        }
    }
}

// =============================================================================
// Usage Recorder
// =============================================================================

#[derive(Serialize)]
struct UsageRequest {
    project_id: Uuid,
    job_id: Uuid,
    units: usize,
}

/// Posts one usage record per completed job to an accounting service.
#[derive(Clone)]
pub struct HttpUsageRecorder {
    endpoint: Option<Endpoint>,
}

impl HttpUsageRecorder {
    pub fn new(url: Option<&str>) -> Result<Self, AppError> {
        Self::with_config(url, &HttpConfig::default())
    }

    pub fn with_config(url: Option<&str>, http_config: &HttpConfig) -> Result<Self, AppError> {
        Ok(Self {
            endpoint: Endpoint::parse(url, http_config)?,
        })
    }

    pub fn disabled() -> Self {
        Self { endpoint: None }
    }
}

impl UsageRecorder for HttpUsageRecorder {
    async fn record_usage(
        &self,
        project_id: Uuid,
        job_id: Uuid,
        units: usize,
    ) -> Result<(), AppError> {
        match &self.endpoint {
            Some(endpoint) => {
                endpoint
                    .post(
                        "usage",
                        &UsageRequest {
                            project_id,
                            job_id,
                            units,
                        },
                    )
                    .await
            }
            None => {
                tracing::debug!(%job_id, units, "No usage endpoint configured, skipping");
                Ok(())
            }
        }
    }
}
