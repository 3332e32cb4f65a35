//! Quarry Server - REST API for scrape-job orchestration
//!
//! This crate exposes the Quarry services over HTTP:
//!
//! - **Jobs**: launch, poll, inspect and list scrape jobs
//! - **Webhooks**: provider completion callbacks
//! - **Recovery**: on-demand and periodic stale-job sweeps
//!
//! # API Documentation
//!
//! When running the server, interactive API documentation is available
//! at `/swagger-ui`.

pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod router;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use router::{api_routes, create_router};
pub use state::AppState;
