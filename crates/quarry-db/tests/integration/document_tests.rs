//! Integration tests for DocumentRepository.

use uuid::Uuid;

use quarry_core::{DocumentStore, JobStore};
use quarry_db::{DocumentRepository, JobRepository};

use crate::integration::common::{profile_request, sample_result, setup_test_db};

#[tokio::test]
async fn test_insert_documents_is_idempotent() {
    let (pool, _container) = setup_test_db().await;
    let jobs = JobRepository::new(pool.clone());
    let documents = DocumentRepository::new(pool);
    let job = jobs.create_job(profile_request(Uuid::new_v4())).await.unwrap();
    let result = sample_result("ds-1");

    let created = documents
        .insert_documents(&job, &result.documents)
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let again = documents
        .insert_documents(&job, &result.documents)
        .await
        .unwrap();
    assert!(again.is_empty(), "existing documents are skipped");
    assert_eq!(documents.count_for_job(job.id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_documents_are_scoped_to_job() {
    let (pool, _container) = setup_test_db().await;
    let jobs = JobRepository::new(pool.clone());
    let documents = DocumentRepository::new(pool);
    let project_id = Uuid::new_v4();
    let first = jobs.create_job(profile_request(project_id)).await.unwrap();
    let second = jobs.create_job(profile_request(project_id)).await.unwrap();
    let result = sample_result("ds-1");

    documents
        .insert_documents(&first, &result.documents)
        .await
        .unwrap();
    let created = documents
        .insert_documents(&second, &result.documents)
        .await
        .unwrap();

    assert_eq!(created.len(), 2, "same source keys under another job");

    let stored = documents.list_for_job(second.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert!(stored.iter().all(|d| d.project_id == project_id));
    assert_eq!(stored[0].title.as_deref(), Some("NASA"));
    assert_eq!(stored[0].content, "Space");
}
