//! Quarry DB - Database repository layer for PostgreSQL
//!
//! This crate provides the repository pattern for scrape-job persistence.
//!
//! # Overview
//!
//! The main components are:
//! - [`JobRepository`] - Job store with conditional status transitions
//! - [`DocumentRepository`] - Idempotent storage of normalized documents
//! - [`MIGRATOR`] - Embedded schema migrations

mod document_repository;
mod job_repository;

pub use document_repository::{DocumentRepository, StoredDocument};
pub use job_repository::JobRepository;

/// Schema migrations under `migrations/`, embedded at compile time.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
