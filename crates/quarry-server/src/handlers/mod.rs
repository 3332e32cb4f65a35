//! HTTP request handlers for API endpoints.

pub mod health;
pub mod jobs;
pub mod recovery;
pub mod webhooks;
