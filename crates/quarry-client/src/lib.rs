//! Quarry Client - HTTP clients for external APIs
//!
//! This crate provides HTTP clients for interacting with:
//!
//! - [`apify`] - Apify actor runs and datasets (asynchronous provider)
//! - [`direct`] - a synchronous scraping endpoint
//! - [`downstream`] - embedding trigger and usage recorder services
//!
//! # Overview
//!
//! The clients handle authentication, request building, response parsing,
//! and error mapping for their respective APIs. [`ScrapeProviderFactory`]
//! hands the orchestration services a client per job.

pub mod apify;
pub mod direct;
pub mod downstream;
mod http;
pub mod provider;

// Re-export main client types
pub use apify::{ApifyClient, ApifyWebhookPayload};
pub use direct::DirectClient;
pub use downstream::{HttpEmbeddingTrigger, HttpUsageRecorder};
pub use provider::{ScrapeProviderEnum, ScrapeProviderFactory};
