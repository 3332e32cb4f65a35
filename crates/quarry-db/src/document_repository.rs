//! Document repository for normalized scrape results.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres};
use uuid::Uuid;

use quarry_core::error::AppError;
use quarry_core::formatter::NormalizedDocument;
use quarry_core::job::ScrapeJob;
use quarry_core::traits::DocumentStore;

/// Repository for documents ingested from scrape results.
///
/// Documents are unique per `(job_id, source_key)`; inserting a document
/// that already exists is a no-op.
#[derive(Clone)]
pub struct DocumentRepository {
    pool: Pool<Postgres>,
}

/// A persisted document.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredDocument {
    pub id: Uuid,
    pub job_id: Uuid,
    pub project_id: Uuid,
    pub source_key: String,
    pub title: Option<String>,
    pub content: String,
    pub url: Option<String>,
    pub metadata: Json<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts documents for a job inside one transaction.
    ///
    /// Returns the ids of the rows this call created.
    pub async fn insert_for_job(
        &self,
        job: &ScrapeJob,
        documents: &[NormalizedDocument],
    ) -> Result<Vec<Uuid>, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(documents.len());

        for doc in documents {
            let id: Option<(Uuid,)> = sqlx::query_as(
                r#"
                INSERT INTO scraped_documents (job_id, project_id, source_key, title, content, url, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (job_id, source_key) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(job.id)
            .bind(job.project_id)
            .bind(&doc.source_key)
            .bind(&doc.title)
            .bind(&doc.content)
            .bind(&doc.url)
            .bind(Json(&doc.metadata))
            .fetch_optional(&mut *tx)
            .await?;

            if let Some((id,)) = id {
                created.push(id);
            }
        }

        tx.commit().await?;

        tracing::debug!(
            job_id = %job.id,
            created = created.len(),
            skipped = documents.len() - created.len(),
            "Stored documents"
        );
        Ok(created)
    }

    /// Lists the documents of a job in insertion order.
    pub async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<StoredDocument>, AppError> {
        let rows: Vec<StoredDocument> = sqlx::query_as(
            r#"
            SELECT id, job_id, project_id, source_key, title, content, url, metadata, created_at
            FROM scraped_documents
            WHERE job_id = $1
            ORDER BY created_at ASC, source_key ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn count_for_job(&self, job_id: Uuid) -> Result<i64, AppError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM scraped_documents WHERE job_id = $1")
                .bind(job_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Trait Implementation: DocumentStore
// =============================================================================

impl DocumentStore for DocumentRepository {
    async fn insert_documents(
        &self,
        job: &ScrapeJob,
        documents: &[NormalizedDocument],
    ) -> Result<Vec<Uuid>, AppError> {
        self.insert_for_job(job, documents).await
    }
}
