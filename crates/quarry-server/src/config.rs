use clap::Parser;
use std::path::PathBuf;
use url::Url;

/// Server configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "quarry-server")]
#[command(author, version, about = "REST API server for Quarry scrape jobs")]
pub struct ServerConfig {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Apify API token. Apify jobs are rejected when unset.
    #[arg(long, env = "APIFY_TOKEN")]
    pub apify_token: Option<String>,

    /// Endpoint of a synchronous scraping provider
    #[arg(long, env = "DIRECT_PROVIDER_URL")]
    pub direct_provider_url: Option<String>,

    /// Bearer key for the synchronous scraping provider
    #[arg(long, env = "DIRECT_PROVIDER_KEY")]
    pub direct_provider_key: Option<String>,

    /// Public base URL of this server, used to register provider webhooks
    #[arg(long, env = "WEBHOOK_BASE_URL")]
    pub webhook_base_url: Option<String>,

    /// Shared secret appended to webhook URLs as `?token=`
    #[arg(long, env = "WEBHOOK_SECRET")]
    pub webhook_secret: Option<String>,

    /// Endpoint notified once per stored document
    #[arg(long, env = "EMBEDDING_TRIGGER_URL")]
    pub embedding_trigger_url: Option<String>,

    /// Endpoint notified once per completed job
    #[arg(long, env = "USAGE_RECORDER_URL")]
    pub usage_recorder_url: Option<String>,

    /// Bearer token for job endpoints. Job endpoints are disabled when unset.
    #[arg(long, env = "QUARRY_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Server port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Server host to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Allowed CORS origins, comma separated, or "*"
    #[arg(long, env = "CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Sustained requests per second per client IP
    #[arg(long, env = "RATE_LIMIT_RPS", default_value = "10")]
    pub rate_limit_rps: u32,

    /// Burst size per client IP
    #[arg(long, env = "RATE_LIMIT_BURST", default_value = "30")]
    pub rate_limit_burst: u32,

    /// Seconds between background recovery sweeps (0 disables the sweeper)
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "60")]
    pub sweep_interval_secs: u64,

    /// Path to scrapers.toml configuration file
    #[arg(long, env = "SCRAPERS_CONFIG")]
    pub scrapers_config: Option<PathBuf>,
}

impl ServerConfig {
    /// URL providers call on run completion, with the shared secret attached.
    ///
    /// `None` when no public base URL is configured; jobs then rely on
    /// polling and recovery alone.
    pub fn webhook_url(&self, provider: &str) -> Result<Option<String>, url::ParseError> {
        let Some(base) = self.webhook_base_url.as_deref() else {
            return Ok(None);
        };
        let base = Url::parse(&format!("{}/", base.trim_end_matches('/')))?;
        let mut url = base.join(&format!("api/v1/webhooks/{}", provider))?;
        if let Some(secret) = self.webhook_secret.as_deref() {
            url.query_pairs_mut().append_pair("token", secret);
        }
        Ok(Some(url.to_string()))
    }
}
