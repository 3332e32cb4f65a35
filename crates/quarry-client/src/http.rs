//! Shared request plumbing for the HTTP clients.

use quarry_core::error::{AppError, ProviderErrorDetails};
use quarry_core::HttpConfig;
use reqwest::{Client, Response};

pub(crate) const USER_AGENT: &str = concat!("Quarry/", env!("CARGO_PKG_VERSION"));

pub(crate) fn build_client(config: &HttpConfig) -> Result<Client, AppError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout)
        .build()
        .map_err(|e| AppError::ClientError(e.to_string()))
}

/// Map a transport failure to a retryable error.
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64, target: &str) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Cannot connect to {}: {}", target, e))
    } else {
        AppError::ClientError(e.to_string())
    }
}

/// Pass successful responses through; turn anything else into a provider error.
pub(crate) async fn ensure_success(provider: &str, response: Response) -> Result<Response, AppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::ProviderError(ProviderErrorDetails::from_status(
        provider,
        status.as_u16(),
        body,
    )))
}

pub(crate) fn parse_error(provider: &str, e: reqwest::Error) -> AppError {
    AppError::ClientError(format!("Failed to parse {} response: {}", provider, e))
}
