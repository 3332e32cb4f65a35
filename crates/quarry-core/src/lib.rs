//! Quarry Core - Domain types, orchestration logic, and services.
//!
//! This crate provides the scrape-job orchestration core of Quarry:
//!
//! - **Domain models**: [`ScrapeJob`], [`JobStatus`], [`ResultSet`], etc.
//! - **Services**: [`LaunchService`], [`PollService`], [`WebhookService`],
//!   [`RecoveryService`] and the background [`SweeperService`]
//! - **Traits**: [`JobStore`], [`ScrapeProvider`], [`DocumentStore`] and the
//!   downstream collaborators, for dependency injection
//!
//! # Architecture
//!
//! Jobs are resolved by whichever of three independent paths observes
//! completion first: client polling, provider webhooks, or the recovery
//! sweep. There is no in-process scheduler. All three paths coordinate
//! through a conditional status update in the [`JobStore`]; the caller whose
//! update is accepted owns the result and triggers delivery, every other
//! caller reads back the committed job.
//!
//! This crate performs no I/O of its own. `quarry-db` implements the stores,
//! `quarry-client` implements providers and downstream calls.
//!
//! # Example
//!
//! ```ignore
//! use quarry_core::{CreateJobRequest, LaunchService, PollService, ScraperType};
//!
//! let launcher = LaunchService::new(store.clone(), factory.clone(), sink.clone(), scrapers);
//! let job = launcher
//!     .launch(CreateJobRequest::new(project_id, ScraperType::Profile, input))
//!     .await?;
//!
//! let poller = PollService::new(store, factory, sink, PollConfig::default());
//! let outcome = poller.poll(job.id).await?;
//! ```

pub mod config;
pub mod error;
pub mod formatter;
pub mod job;
pub mod job_store;
pub mod launcher;
pub mod poller;
pub mod recovery;
pub mod resolver;
pub mod sweeper;
pub mod traits;
pub mod webhook;

// Configuration
pub use config::{
    DbConfig, HttpConfig, PollConfig, RecoveryConfig, ScraperEntry, ScrapersConfig,
    SweeperConfig, default_config_path, load_scrapers_config,
};

// Error handling
pub use error::{AppError, ProviderErrorDetails, ProviderErrorKind};

// Domain models
pub use formatter::{
    DeliveryReport, NormalizedDocument, OutputConfig, OutputFormatter, ResultSet,
    normalize_items,
};
pub use job::{
    CreateJobRequest, JobResolution, JobStatus, ProviderKind, ScrapeJob, ScraperType,
    TransitionOutcome,
};

// Traits for dependency injection
pub use job_store::JobStore;
pub use traits::{
    DocumentStore, EmbeddingTrigger, ProviderFactory, ResultSink, RunStatus, ScrapeProvider,
    StartOutcome, StartRequest, UsageRecorder,
};

// Services (generic over trait implementations)
pub use launcher::{LaunchService, validate_input};
pub use poller::{PollOutcome, PollService};
pub use recovery::{RecoveryDetail, RecoveryOutcome, RecoveryReport, RecoveryService};
pub use resolver::Resolver;
pub use webhook::{WebhookNotification, WebhookOutcome, WebhookRunState, WebhookService};

// Background sweeper
pub use sweeper::{
    SilentSweeperReporter, SweeperEvent, SweeperReporter, SweeperService, TracingSweeperReporter,
};
