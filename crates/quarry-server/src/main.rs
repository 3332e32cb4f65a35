//! Quarry REST API Server
//!
//! This binary starts the Quarry REST API server, exposing endpoints for
//! launching, polling and recovering scrape jobs, and runs the background
//! recovery sweeper.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use quarry_client::{
    ApifyClient, DirectClient, HttpEmbeddingTrigger, HttpUsageRecorder, ScrapeProviderFactory,
};
use quarry_core::{
    DbConfig, OutputFormatter, ProviderKind, SweeperConfig, TracingSweeperReporter,
    load_scrapers_config,
};
use quarry_db::{DocumentRepository, MIGRATOR};

use quarry_server::{AppState, ServerConfig, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Parse command line arguments
    let config = ServerConfig::parse();

    // Connect to database
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(DbConfig::default().max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database connection established");

    // Load scraper configuration
    let scrapers = Arc::new(load_scrapers_config(config.scrapers_config.clone())?);
    info!("Loaded {} scraper definitions", scrapers.scrapers.len());

    // Initialize providers
    let mut factory = ScrapeProviderFactory::new();
    if let Some(token) = config.apify_token.as_deref() {
        let mut apify = ApifyClient::new(token, scrapers.clone())
            .context("Failed to initialize Apify client")?;
        match config
            .webhook_url(ProviderKind::Apify.as_str())
            .context("Invalid WEBHOOK_BASE_URL")?
        {
            Some(url) => apify = apify.with_webhook_url(url),
            None => warn!("WEBHOOK_BASE_URL not set; Apify jobs will be resolved by polling"),
        }
        factory = factory.with_apify(apify);
    }
    if let Some(endpoint) = config.direct_provider_url.as_deref() {
        let direct = DirectClient::new(endpoint, config.direct_provider_key.clone())
            .context("Failed to initialize direct provider client")?;
        factory = factory.with_direct(direct);
    }
    if factory.configured().is_empty() {
        warn!("No scraping provider configured; launches will be rejected");
    }

    // Result delivery
    let embeddings = HttpEmbeddingTrigger::new(config.embedding_trigger_url.as_deref())
        .context("Invalid EMBEDDING_TRIGGER_URL")?;
    let usage = HttpUsageRecorder::new(config.usage_recorder_url.as_deref())
        .context("Invalid USAGE_RECORDER_URL")?;
    let sink = OutputFormatter::new(DocumentRepository::new(pool.clone()), embeddings, usage);

    // Create shutdown token for graceful shutdown
    let shutdown_token = CancellationToken::new();

    // Create application state
    let app_state = AppState::new(pool, factory, sink, scrapers)
        .with_admin_token(config.admin_token.clone())
        .with_webhook_secret(config.webhook_secret.clone());

    if app_state.admin_token.is_none() {
        warn!("QUARRY_ADMIN_TOKEN not set; job endpoints are disabled");
    }

    // Start background recovery sweeper
    let sweeper_handle = if config.sweep_interval_secs > 0 {
        let sweeper = app_state.sweeper(
            SweeperConfig::default().with_interval(Duration::from_secs(config.sweep_interval_secs)),
        );
        let cancel = shutdown_token.clone();
        Some(tokio::spawn(async move {
            sweeper.run(cancel, &TracingSweeperReporter).await;
        }))
    } else {
        info!("Background recovery sweeper disabled");
        None
    };

    // Build router
    let app = create_router(app_state, &config)?;

    // Bind to address
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid address")?;

    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!("Starting Quarry API server on http://{}", addr);
    info!("Swagger UI available at http://{}/swagger-ui", addr);

    // Start server with graceful shutdown; the governor keys on peer IP
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_token))
    .await
    .context("Server error")?;

    if let Some(handle) = sweeper_handle {
        if let Err(e) = handle.await {
            warn!(error = %e, "Recovery sweeper task failed");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");

    // Stop the sweeper between sweeps
    shutdown_token.cancel();
}
