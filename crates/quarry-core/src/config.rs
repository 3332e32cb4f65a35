//! Configuration types for Quarry components.
//!
//! Runtime tuning (`RecoveryConfig`, `PollConfig`, ...) is built in code with
//! `with_*` methods; per-scraper settings come from `scrapers.toml`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::formatter::OutputConfig;
use crate::job::ScraperType;

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for provider and downstream calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl HttpConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status poller configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Suggested delay before the caller polls a transient job again.
    pub retry_after: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            retry_after: Duration::from_secs(5),
        }
    }
}

impl PollConfig {
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }
}

// =============================================================================
// Recovery Configuration
// =============================================================================

/// Stale-job recovery configuration.
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Idle time after which a transient job becomes a candidate.
    pub stale_threshold: TimeDelta,
    /// Recovery attempts allowed before a job is force-failed.
    pub max_retries: u32,
    /// Maximum candidates processed per sweep.
    pub batch_size: usize,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            stale_threshold: TimeDelta::minutes(3),
            max_retries: 5,
            batch_size: 50,
        }
    }
}

impl RecoveryConfig {
    pub fn with_stale_threshold(mut self, threshold: TimeDelta) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Background sweeper configuration.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Delay between sweeps.
    pub interval: Duration,
    pub recovery: RecoveryConfig,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl SweeperConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }
}

// =============================================================================
// Scraper Configuration (scrapers.toml)
// =============================================================================

/// Root configuration structure for scrapers.toml.
///
/// # Example
///
/// ```toml
/// [scrapers.profile]
/// actor_id = "apify/instagram-profile-scraper"
/// required_fields = ["username"]
///
/// [scrapers.comments]
/// actor_id = "apify/instagram-comment-scraper"
///
/// [scrapers.comments.output]
/// content_field = "text"
/// max_items = 500
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapersConfig {
    #[serde(default)]
    pub scrapers: BTreeMap<ScraperType, ScraperEntry>,
}

/// Settings for one scraper type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScraperEntry {
    /// Apify actor started for this scraper type.
    pub actor_id: Option<String>,
    /// Input fields that must be present. Replaces the built-in list when set.
    pub required_fields: Option<Vec<String>>,
    /// Output defaults merged into each job's output configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for ScrapersConfig {
    fn default() -> Self {
        let scrapers = ScraperType::ALL
            .iter()
            .map(|t| (*t, builtin_entry(*t)))
            .collect();
        Self { scrapers }
    }
}

fn builtin_entry(scraper_type: ScraperType) -> ScraperEntry {
    let actor = match scraper_type {
        ScraperType::Profile => "apify/instagram-profile-scraper",
        ScraperType::Posts => "apify/instagram-post-scraper",
        ScraperType::Comments => "apify/instagram-comment-scraper",
    };
    ScraperEntry {
        actor_id: Some(actor.to_string()),
        ..ScraperEntry::default()
    }
}

impl ScrapersConfig {
    /// Add built-in entries for scraper types the file does not mention.
    pub fn with_builtin_defaults(mut self) -> Self {
        for scraper_type in ScraperType::ALL {
            let entry = self
                .scrapers
                .entry(scraper_type)
                .or_insert_with(|| builtin_entry(scraper_type));
            if entry.actor_id.is_none() {
                entry.actor_id = builtin_entry(scraper_type).actor_id;
            }
        }
        self
    }

    pub fn entry(&self, scraper_type: ScraperType) -> Option<&ScraperEntry> {
        self.scrapers.get(&scraper_type)
    }

    /// Apify actor id for a scraper type.
    pub fn actor_id(&self, scraper_type: ScraperType) -> Option<&str> {
        self.entry(scraper_type)
            .and_then(|e| e.actor_id.as_deref())
    }

    /// Required input fields, honoring overrides.
    pub fn required_fields(&self, scraper_type: ScraperType) -> Vec<String> {
        match self.entry(scraper_type).and_then(|e| e.required_fields.clone()) {
            Some(fields) => fields,
            None => scraper_type
                .default_required_fields()
                .iter()
                .map(|f| f.to_string())
                .collect(),
        }
    }

    /// Output defaults for a scraper type.
    pub fn output_defaults(&self, scraper_type: ScraperType) -> OutputConfig {
        self.entry(scraper_type)
            .map(|e| e.output.clone())
            .unwrap_or_default()
    }
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "scrapers.toml";

/// Returns the default configuration directory path: `~/.config/quarry/`.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("quarry"))
}

/// Returns the default configuration file path: `~/.config/quarry/scrapers.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

/// Load scraper configuration from a TOML file.
///
/// # Arguments
/// * `path` - Optional custom path. If `None`, uses the default XDG path.
///
/// # Returns
/// * `Ok(config)` - The file's settings over built-in defaults, or the
///   built-in defaults alone when the default file does not exist
/// * `Err(e)` - A custom path that does not exist, or an invalid file
pub fn load_scrapers_config(path: Option<PathBuf>) -> Result<ScrapersConfig, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path.or_else(default_config_path) {
        Some(p) => p,
        None => return Ok(ScrapersConfig::default()),
    };

    if !config_path.exists() {
        if using_default_path {
            tracing::debug!(
                "No scraper config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(ScrapersConfig::default());
        }
        return Err(AppError::ConfigError(format!(
            "Config file not found: {}",
            config_path.display()
        )));
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    parse_scrapers_config(&content).map_err(|e| {
        AppError::ConfigError(format!("Invalid TOML in '{}': {}", config_path.display(), e))
    })
}

fn parse_scrapers_config(content: &str) -> Result<ScrapersConfig, toml::de::Error> {
    let config: ScrapersConfig = toml::from_str(content)?;
    Ok(config.with_builtin_defaults())
}
