use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::LazyLock;
use uuid::Uuid;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown");
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(
    author,
    version = version_info(),
    about = "Launch and track scrape jobs on external scraping providers"
)]
#[command(after_help = "Examples:
  quarry launch profile --project 6f1c7f4e-... --input '{\"username\": [\"nasa\"]}' --wait
  quarry poll 0b6c2d8e-...
  quarry jobs --status running
  quarry recover

Providers:
  APIFY_TOKEN          - Apify actor runs (default provider)
  DIRECT_PROVIDER_URL  - Synchronous provider returning results inline")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Apify API token
    #[arg(long, env = "APIFY_TOKEN")]
    pub apify_token: Option<String>,

    /// Endpoint of a synchronous scraping provider
    #[arg(long, env = "DIRECT_PROVIDER_URL")]
    pub direct_provider_url: Option<String>,

    /// Bearer key for the synchronous scraping provider
    #[arg(long, env = "DIRECT_PROVIDER_KEY")]
    pub direct_provider_key: Option<String>,

    /// Endpoint notified once per stored document
    #[arg(long, env = "EMBEDDING_TRIGGER_URL")]
    pub embedding_trigger_url: Option<String>,

    /// Endpoint notified once per completed job
    #[arg(long, env = "USAGE_RECORDER_URL")]
    pub usage_recorder_url: Option<String>,

    /// Path to scrapers.toml configuration file
    #[arg(long, env = "SCRAPERS_CONFIG")]
    pub scrapers_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Launch a scrape job
    #[command(after_help = "Examples:
  quarry launch posts --project <UUID> --input '{\"username\": [\"nasa\"]}'
  quarry launch comments --project <UUID> --input @comments.json --wait
  quarry launch profile --project <UUID> --provider direct --input '{\"username\": \"nasa\"}'")]
    Launch {
        /// Scraper type: profile, posts or comments
        scraper_type: String,

        /// Owning project
        #[arg(long, value_name = "UUID")]
        project: Uuid,

        /// Provider: apify or direct
        #[arg(long, default_value = "apify")]
        provider: String,

        /// Provider input as JSON, or @path to a JSON file
        #[arg(short, long, value_name = "JSON")]
        input: String,

        /// Output formatting overrides as JSON, or @path to a JSON file
        #[arg(short, long, value_name = "JSON")]
        output: Option<String>,

        /// Poll until the job reaches a terminal state
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600", requires = "wait")]
        timeout: u64,
    },
    /// Check a job against its provider and commit the result when finished
    Poll {
        /// Job UUID
        job_id: Uuid,

        /// Poll until the job reaches a terminal state
        #[arg(short, long)]
        wait: bool,

        /// Give up waiting after this many seconds
        #[arg(long, default_value = "600", requires = "wait")]
        timeout: u64,
    },
    /// Print the stored job record as JSON
    Show {
        /// Job UUID
        job_id: Uuid,
    },
    /// List recent jobs
    Jobs {
        /// Restrict to one project
        #[arg(long, value_name = "UUID")]
        project: Option<Uuid>,

        /// Filter by status (pending, running, polling, scraped, failed)
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of jobs
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Sweep stale running jobs and resolve them against their providers
    Recover {
        /// Restrict to one project
        #[arg(long, value_name = "UUID")]
        project: Option<Uuid>,
    },
}

/// Parses a JSON argument given inline or as `@path`.
pub fn read_json_arg(arg: &str) -> anyhow::Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path, e))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).map_err(|e| anyhow::anyhow!("Invalid JSON: {}", e))
}
