//! Integration tests for the batch SSL engine

mod common;

use common::{Harness, TENANT};
use edgeshop_control::{
    BatchConfig, BatchError, BatchJob, BatchSslEngine, InMemoryJobStore, JobStatus, JobStore,
};
use edgeshop_db::entities::certificate::CertificateStatus;
use edgeshop_provider::ProviderError;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn engine(h: &Harness, config: BatchConfig) -> (Arc<BatchSslEngine>, Arc<InMemoryJobStore>) {
    let store = Arc::new(InMemoryJobStore::new());
    let engine = Arc::new(BatchSslEngine::new(
        h.orchestrator.clone(),
        store.clone(),
        config,
    ));
    (engine, store)
}

async fn wait_for(engine: &BatchSslEngine, job_id: Uuid, status: JobStatus) -> BatchJob {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let job = engine.get(job_id).await.unwrap();
            if job.status == status {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("job {} never reached {}", job_id, status))
}

#[tokio::test]
async fn test_batch_activates_every_domain() {
    let h = Harness::new().await;
    let mut ids = Vec::new();
    for host in ["one.example", "two.example", "three.example"] {
        ids.push(h.verified_domain(host).await);
    }
    let (engine, _store) = engine(&h, BatchConfig::default());

    let job = engine.submit(ids.clone()).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.total_count, 3);
    assert_eq!(job.progress_count, 0);

    let done = wait_for(&engine, job.id, JobStatus::Completed).await;
    assert_eq!(done.progress_count, 3);
    assert_eq!(done.succeeded(), 3);
    assert!(done.started_at.is_some());
    assert!(done.completed_at.is_some());

    for id in ids {
        let cert = h.orchestrator.certificate_for(id).await.unwrap().unwrap();
        assert_eq!(cert.status, CertificateStatus::Active);
    }
}

#[tokio::test]
async fn test_batch_rejects_unverified_domains() {
    let h = Harness::new().await;
    let verified = h.verified_domain("one.example").await;
    let pending = h
        .orchestrator
        .register_domain("two.example", TENANT)
        .await
        .unwrap()
        .domain
        .id;
    let missing = Uuid::new_v4();
    let (engine, store) = engine(&h, BatchConfig::default());

    let err = engine
        .submit(vec![verified, pending, missing])
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DOMAINS_NOT_ELIGIBLE");
    match err {
        BatchError::Ineligible(domains) => {
            assert_eq!(domains.len(), 2);
            assert_eq!(domains[0].domain_id, pending);
            assert_eq!(domains[0].status.as_deref(), Some("zone_pending"));
            assert_eq!(domains[1].domain_id, missing);
            assert_eq!(domains[1].status, None);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.is_empty());
    assert_eq!(h.provider.calls("activate_ssl"), 0);
}

#[tokio::test]
async fn test_partial_failure_completes_job() {
    let h = Harness::new().await;
    let first = h.verified_domain("one.example").await;
    let second = h.verified_domain("two.example").await;
    let third = h.verified_domain("three.example").await;
    h.provider
        .fail("activate_ssl", "two.example", ProviderError::Timeout);
    let (engine, _store) = engine(&h, BatchConfig::default());

    let job = engine.submit(vec![first, second, third]).await.unwrap();
    let done = wait_for(&engine, job.id, JobStatus::Completed).await;

    assert_eq!(done.progress_count, 3);
    assert_eq!(done.succeeded(), 2);
    assert_eq!(done.failed(), 1);
    assert!(done.error.is_none());

    let failed = &done.results[&second];
    assert!(!failed.success);
    assert_eq!(failed.code.as_deref(), Some("PROVIDER_TIMEOUT"));
    assert!(failed.retryable);
    assert!(done.results[&first].success);
    assert!(done.results[&third].success);
}

#[tokio::test]
async fn test_batch_of_failures_still_completes() {
    let h = Harness::new().await;
    let id = h.verified_domain("one.example").await;
    h.provider.fail(
        "activate_ssl",
        "one.example",
        ProviderError::Unauthorized("bad token".to_string()),
    );
    let (engine, _store) = engine(&h, BatchConfig::default());

    let job = engine.submit(vec![id]).await.unwrap();
    let done = wait_for(&engine, job.id, JobStatus::Completed).await;

    assert_eq!(done.failed(), 1);
    assert!(!done.results[&id].retryable);
}

#[tokio::test]
async fn test_cancel_pending_but_not_running_job() {
    let h = Harness::new().await;
    let slow = h.verified_domain("slow.example").await;
    let queued = h.verified_domain("queued.example").await;
    h.provider
        .delay_ssl("slow.example", Duration::from_millis(500));
    let (engine, _store) = engine(
        &h,
        BatchConfig {
            max_concurrent_jobs: 1,
            ..Default::default()
        },
    );

    let running = engine.submit(vec![slow]).await.unwrap();
    wait_for(&engine, running.id, JobStatus::Running).await;
    let waiting = engine.submit(vec![queued]).await.unwrap();

    assert!(engine.cancel(waiting.id).await.unwrap());
    let cancelled = engine.get(waiting.id).await.unwrap();
    assert_eq!(cancelled.status, JobStatus::Failed);
    assert_eq!(cancelled.error.as_deref(), Some("cancelled before start"));

    let err = engine.cancel(running.id).await.unwrap_err();
    assert_eq!(err.code(), "JOB_RUNNING");

    let done = wait_for(&engine, running.id, JobStatus::Completed).await;
    assert_eq!(done.succeeded(), 1);
    // Cancelling a finished job is a no-op
    assert!(!engine.cancel(running.id).await.unwrap());

    // The cancelled job never ran
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.get(waiting.id).await.unwrap().progress_count, 0);
    assert!(h.orchestrator.certificate_for(queued).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancel_unknown_job() {
    let h = Harness::new().await;
    let (engine, _store) = engine(&h, BatchConfig::default());

    let err = engine.cancel(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.code(), "JOB_NOT_FOUND");
}

#[tokio::test]
async fn test_submission_limits() {
    let h = Harness::new().await;
    let id = h.verified_domain("one.example").await;
    let (engine, _store) = engine(
        &h,
        BatchConfig {
            max_batch_size: 2,
            ..Default::default()
        },
    );

    let err = engine.submit(Vec::new()).await.unwrap_err();
    assert!(matches!(err, BatchError::Empty));

    let err = engine
        .submit(vec![Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()])
        .await
        .unwrap_err();
    assert!(matches!(err, BatchError::TooLarge { size: 3, max: 2 }));

    // Duplicates collapse before the size check
    let job = engine.submit(vec![id, id, id]).await.unwrap();
    assert_eq!(job.total_count, 1);
    assert_eq!(job.domain_ids, vec![id]);
    wait_for(&engine, job.id, JobStatus::Completed).await;
}

#[tokio::test]
async fn test_list_and_purge() {
    let h = Harness::new().await;
    let id = h.verified_domain("one.example").await;
    let (engine, store) = engine(
        &h,
        BatchConfig {
            retention: Duration::ZERO,
            ..Default::default()
        },
    );

    let first = engine.submit(vec![id]).await.unwrap();
    wait_for(&engine, first.id, JobStatus::Completed).await;
    let second = engine.submit(vec![id]).await.unwrap();
    wait_for(&engine, second.id, JobStatus::Completed).await;

    let jobs = engine.list().await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, second.id);

    assert_eq!(engine.purge_expired().await.unwrap(), 2);
    assert!(store.list().await.unwrap().is_empty());
}
