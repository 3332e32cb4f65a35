use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;
use uuid::Uuid;

use quarry_cli::{Command, Config, read_json_arg};
use quarry_client::{
    ApifyClient, DirectClient, HttpEmbeddingTrigger, HttpUsageRecorder, ScrapeProviderFactory,
};
use quarry_core::{
    AppError, CreateJobRequest, DbConfig, JobStatus, JobStore, LaunchService, OutputConfig,
    OutputFormatter, PollConfig, PollService, ProviderKind, RecoveryConfig, RecoveryReport,
    RecoveryService, ScrapeJob, ScraperType, load_scrapers_config,
};
use quarry_db::{DocumentRepository, JobRepository, MIGRATOR};

type Sink = OutputFormatter<DocumentRepository, HttpEmbeddingTrigger, HttpUsageRecorder>;
type Poller = PollService<JobRepository, ScrapeProviderFactory, Sink>;

/// Delay between polls when a check fails transiently.
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::parse();

    if let Err(e) = run(config).await {
        match e.downcast_ref::<AppError>() {
            Some(app_error) => eprintln!("\nError: {}\n", app_error.user_message()),
            None => eprintln!("\nError: {:#}\n", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("Connecting to database...");
    let db_config = DbConfig::default();
    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let scrapers = Arc::new(load_scrapers_config(config.scrapers_config.clone())?);

    // Create services with concrete implementations (dependency injection)
    let mut factory = ScrapeProviderFactory::new();
    if let Some(token) = config.apify_token.as_deref() {
        factory = factory.with_apify(ApifyClient::new(token, scrapers.clone())?);
    }
    if let Some(endpoint) = config.direct_provider_url.as_deref() {
        factory = factory.with_direct(DirectClient::new(
            endpoint,
            config.direct_provider_key.clone(),
        )?);
    }

    let store = JobRepository::new(pool.clone());
    let sink = OutputFormatter::new(
        DocumentRepository::new(pool),
        HttpEmbeddingTrigger::new(config.embedding_trigger_url.as_deref())?,
        HttpUsageRecorder::new(config.usage_recorder_url.as_deref())?,
    );
    let poller = PollService::new(
        store.clone(),
        factory.clone(),
        sink.clone(),
        PollConfig::default(),
    );

    match config.command {
        Command::Launch {
            scraper_type,
            project,
            provider,
            input,
            output,
            wait,
            timeout,
        } => {
            let scraper_type: ScraperType = scraper_type.parse()?;
            let provider: ProviderKind = provider.parse()?;
            let output_config: OutputConfig = match output {
                Some(arg) => serde_json::from_value(read_json_arg(&arg)?)
                    .context("Invalid output configuration")?,
                None => OutputConfig::default(),
            };
            let request = CreateJobRequest::new(project, scraper_type, read_json_arg(&input)?)
                .with_provider(provider)
                .with_output_config(output_config);

            let launcher = LaunchService::new(store, factory, sink, scrapers);
            let job = launcher.launch(request).await?;
            print_job_summary(&job);

            if wait && job.status.is_transient() {
                let job = wait_for_terminal(&poller, job.id, Duration::from_secs(timeout)).await?;
                print_job_summary(&job);
            }
        }
        Command::Poll {
            job_id,
            wait,
            timeout,
        } => {
            let job = if wait {
                wait_for_terminal(&poller, job_id, Duration::from_secs(timeout)).await?
            } else {
                poller.poll(job_id).await?.job
            };
            print_job_summary(&job);
        }
        Command::Show { job_id } => {
            let job = store
                .get_job(job_id)
                .await?
                .ok_or(AppError::JobNotFound(job_id))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Command::Jobs {
            project,
            status,
            limit,
        } => {
            let status = status
                .as_deref()
                .map(str::parse::<JobStatus>)
                .transpose()?;
            let jobs = store.list_jobs(project, status, limit).await?;
            print_job_table(&jobs);
        }
        Command::Recover { project } => {
            let recovery = RecoveryService::new(store, factory, sink, RecoveryConfig::default());
            let report = recovery.sweep(project).await?;
            print_recovery_report(&report);
        }
    }

    Ok(())
}

/// Polls until the job is terminal or `timeout` elapses.
///
/// Transient check failures are retried; any other error ends the wait.
async fn wait_for_terminal(
    poller: &Poller,
    job_id: Uuid,
    timeout: Duration,
) -> anyhow::Result<ScrapeJob> {
    let started = Instant::now();

    loop {
        let delay = match poller.poll(job_id).await {
            Ok(outcome) => {
                if outcome.job.status.is_terminal() {
                    return Ok(outcome.job);
                }
                info!(%job_id, status = %outcome.job.status, "Job still in progress");
                outcome.retry_after.unwrap_or(RETRY_DELAY)
            }
            Err(e) if e.is_retryable() => {
                warn!(%job_id, error = %e, "Transient poll failure, retrying");
                RETRY_DELAY
            }
            Err(e) => return Err(e.into()),
        };

        if started.elapsed() + delay > timeout {
            anyhow::bail!(
                "Job {} did not finish within {}s; poll it again later",
                job_id,
                timeout.as_secs()
            );
        }
        tokio::time::sleep(delay).await;
    }
}

fn print_job_summary(job: &ScrapeJob) {
    println!();
    println!("  Job:          {}", job.id);
    println!("  Provider:     {} ({})", job.provider, job.scraper_type);
    println!("  Status:       {}", job.status);
    if let Some(run_id) = &job.external_run_id {
        println!("  Run:          {}", run_id);
    }
    if let Some(result) = &job.result {
        println!(
            "  Documents:    {} ({} items, {} dropped)",
            result.documents.len(),
            result.item_count,
            result.dropped_count
        );
    }
    if let Some(error) = &job.error_message {
        println!("  Error:        {}", error);
    }
    if job.recovered {
        println!("  Resolved by recovery after {} attempt(s)", job.retry_count);
    }
    println!();
}

fn print_job_table(jobs: &[ScrapeJob]) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    println!(
        "{:<36}  {:<8}  {:<8}  {:<7}  {:<20}",
        "ID", "TYPE", "PROVIDER", "STATUS", "CREATED"
    );
    for job in jobs {
        println!(
            "{:<36}  {:<8}  {:<8}  {:<7}  {:<20}",
            job.id,
            job.scraper_type.as_str(),
            job.provider.as_str(),
            job.status.as_str(),
            job.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn print_recovery_report(report: &RecoveryReport) {
    println!();
    println!("  Examined:     {}", report.examined());
    println!("  Recovered:    {}", report.recovered_count);
    println!("  Failed:       {}", report.failed_count);
    for detail in &report.details {
        let outcome = detail.outcome.as_str();
        match &detail.message {
            Some(message) => println!("    {}  {:<16} {}", detail.job_id, outcome, message),
            None => println!("    {}  {}", detail.job_id, outcome),
        }
    }
    println!();
}
