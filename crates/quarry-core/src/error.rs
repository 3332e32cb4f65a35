use thiserror::Error;
use uuid::Uuid;

/// Classification of errors reported by a scraping provider.
///
/// Providers answer with heterogeneous error bodies; the HTTP status code is
/// the only reliable signal, so the clients classify on it and keep the raw
/// body as the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Authentication failure (401/403, bad API token)
    Authentication,
    /// Rate limit exceeded (429)
    RateLimit,
    /// Server error (5xx)
    ServerError,
    /// The provider refused the request (4xx other than auth/rate limit)
    Rejected,
    /// Unknown or unclassified error
    Unknown,
}

/// Structured error details from a scraping provider.
#[derive(Debug, Clone)]
pub struct ProviderErrorDetails {
    /// Provider name (e.g. "apify")
    pub provider: String,
    /// The specific error category
    pub kind: ProviderErrorKind,
    /// Message or raw body returned by the provider
    pub message: String,
    /// HTTP status code
    pub status_code: u16,
}

impl ProviderErrorDetails {
    /// Create a new ProviderErrorDetails, classifying the kind from the status code.
    pub fn from_status(provider: impl Into<String>, status_code: u16, message: String) -> Self {
        let kind = match status_code {
            401 | 403 => ProviderErrorKind::Authentication,
            429 => ProviderErrorKind::RateLimit,
            500..=599 => ProviderErrorKind::ServerError,
            400..=499 => ProviderErrorKind::Rejected,
            _ => ProviderErrorKind::Unknown,
        };
        Self {
            provider: provider.into(),
            kind,
            message,
            status_code,
        }
    }
}

impl std::fmt::Display for ProviderErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} API error (HTTP {}): {}",
            self.provider, self.status_code, self.message
        )
    }
}

/// Application-wide error types.
///
/// This enum represents all possible errors that can occur in Quarry.
/// It uses the `thiserror` crate for ergonomic error handling and automatic conversion
/// from underlying library errors.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use quarry_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::ValidationError("missing field 'username'".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    ///
    /// This error wraps all errors from SQLx database operations, including
    /// connection failures, query errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed at the transport level.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// A scraping provider answered with a non-success status.
    #[error("Provider error: {0}")]
    ProviderError(ProviderErrorDetails),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Scrape job not found in the store.
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    /// Launch input rejected before any provider call.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The provider no longer knows about the run.
    ///
    /// Recovery turns this into a terminal failure; it is never retried.
    #[error("Provider run not found: {0}")]
    RunNotFound(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Configuration error.
    ///
    /// Raised for a malformed scrapers.toml, missing provider credentials, or
    /// an operation the selected provider does not support.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Try: docker-compose up -d".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("timeout") || msg.contains("timed out") {
                    "Request timed out. The provider may be slow or unreachable.\n   Poll the job again later.".to_string()
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::ProviderError(details) => match details.kind {
                ProviderErrorKind::Authentication => format!(
                    "The {} provider rejected the credentials.\n   Check the provider API token.",
                    details.provider
                ),
                ProviderErrorKind::RateLimit => format!(
                    "{} rate limit reached.\n   Wait a moment and try again.",
                    details.provider
                ),
                ProviderErrorKind::ServerError => format!(
                    "{} server error (HTTP {}).\n   Please try again later.",
                    details.provider, details.status_code
                ),
                _ => details.to_string(),
            },
            AppError::JobNotFound(id) => format!("No scrape job with id {}", id),
            AppError::ValidationError(msg) => format!("Invalid launch request: {}", msg),
            AppError::RunNotFound(run_id) => format!(
                "The provider has no record of run {}.\n   The job cannot be recovered.",
                run_id
            ),
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   Poll the job again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is transient and the operation may be retried.
    ///
    /// The poller uses this to decide whether a failure leaves the job
    /// untouched (retryable) or must surface to the caller as-is.
    ///
    /// # Examples
    ///
    /// ```
    /// use quarry_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::ValidationError("missing username".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::NetworkError(_)
            | AppError::Timeout(_)
            | AppError::RateLimitExceeded
            | AppError::ClientError(_)
            | AppError::DatabaseError(_) => true,
            AppError::ProviderError(details) => matches!(
                details.kind,
                ProviderErrorKind::RateLimit | ProviderErrorKind::ServerError
            ),
            _ => false,
        }
    }
}
