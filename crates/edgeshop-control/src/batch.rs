//! Batch SSL activation
//!
//! A submitted batch becomes a [`BatchJob`] that waits for one of
//! `max_concurrent_jobs` slots, then fans its domains out to a bounded pool
//! of workers. Workers report back to the job's runner task, which is the
//! only writer of the job's progress.

use crate::error::OrchestratorError;
use crate::job_store::{BatchJob, DomainResult, JobStatus, JobStore, JobStoreError};
use crate::orchestrator::{DomainOrchestrator, SslOutcome};
use chrono::Utc;
use edgeshop_db::entities::domain::{self, DomainStatus};
use edgeshop_db::entities::Domain;
use sea_orm::{ColumnTrait, DbErr, EntityTrait, QueryFilter};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Batch engine settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Workers per job
    pub workers: usize,
    /// Largest accepted batch (after de-duplication)
    pub max_batch_size: usize,
    /// Jobs processed at the same time; the rest wait as pending
    pub max_concurrent_jobs: usize,
    /// How long terminal jobs are kept
    pub retention: Duration,
    /// How often the retention sweep runs
    pub sweep_interval: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_batch_size: 100,
            max_concurrent_jobs: 2,
            retention: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(10 * 60),
        }
    }
}

/// A requested domain that cannot be activated right now
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IneligibleDomain {
    pub domain_id: Uuid,
    /// Current status, or `None` if the domain does not exist
    pub status: Option<String>,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch must contain at least one domain")]
    Empty,

    #[error("batch of {size} domains exceeds the limit of {max}")]
    TooLarge { size: usize, max: usize },

    #[error("{} domain(s) are not verified and cannot be activated", .0.len())]
    Ineligible(Vec<IneligibleDomain>),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("job {0} is already running and cannot be cancelled")]
    JobRunning(Uuid),

    #[error(transparent)]
    Store(#[from] JobStoreError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl BatchError {
    pub fn code(&self) -> &'static str {
        match self {
            BatchError::Empty => "EMPTY_BATCH",
            BatchError::TooLarge { .. } => "BATCH_TOO_LARGE",
            BatchError::Ineligible(_) => "DOMAINS_NOT_ELIGIBLE",
            BatchError::JobNotFound(_) => "JOB_NOT_FOUND",
            BatchError::JobRunning(_) => "JOB_RUNNING",
            BatchError::Store(_) => "JOB_STORE_ERROR",
            BatchError::Database(_) => "DATABASE_ERROR",
        }
    }
}

pub struct BatchSslEngine {
    orchestrator: Arc<DomainOrchestrator>,
    store: Arc<dyn JobStore>,
    config: BatchConfig,
    job_slots: Arc<Semaphore>,
}

impl BatchSslEngine {
    pub fn new(
        orchestrator: Arc<DomainOrchestrator>,
        store: Arc<dyn JobStore>,
        config: BatchConfig,
    ) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            orchestrator,
            store,
            config,
            job_slots,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Validate a batch and queue it
    ///
    /// The whole submission is rejected, and no job is created, if any domain
    /// is missing or not verified.
    pub async fn submit(&self, domain_ids: Vec<Uuid>) -> Result<BatchJob, BatchError> {
        let mut seen = HashSet::new();
        let domain_ids: Vec<Uuid> = domain_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .collect();

        if domain_ids.is_empty() {
            return Err(BatchError::Empty);
        }
        if domain_ids.len() > self.config.max_batch_size {
            return Err(BatchError::TooLarge {
                size: domain_ids.len(),
                max: self.config.max_batch_size,
            });
        }

        let ineligible = self.ineligible(&domain_ids).await?;
        if !ineligible.is_empty() {
            debug!(count = ineligible.len(), "Rejecting batch with ineligible domains");
            return Err(BatchError::Ineligible(ineligible));
        }

        let job = BatchJob::new(domain_ids);
        self.store.put(job.clone()).await?;

        info!(job_id = %job.id, total = job.total_count, "Batch SSL job queued");

        tokio::spawn(run_job(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.store),
            Arc::clone(&self.job_slots),
            self.config.workers.max(1),
            job.id,
            job.domain_ids.clone(),
        ));

        Ok(job)
    }

    async fn ineligible(&self, domain_ids: &[Uuid]) -> Result<Vec<IneligibleDomain>, BatchError> {
        let found = Domain::find()
            .filter(domain::Column::Id.is_in(domain_ids.iter().copied()))
            .all(self.orchestrator.db())
            .await?;

        let ineligible = domain_ids
            .iter()
            .filter_map(|id| match found.iter().find(|d| d.id == *id) {
                Some(d) if d.status == DomainStatus::Verified => None,
                Some(d) => Some(IneligibleDomain {
                    domain_id: *id,
                    status: Some(d.status.as_str().to_string()),
                }),
                None => Some(IneligibleDomain {
                    domain_id: *id,
                    status: None,
                }),
            })
            .collect();
        Ok(ineligible)
    }

    pub async fn get(&self, job_id: Uuid) -> Result<BatchJob, BatchError> {
        self.store
            .get(job_id)
            .await?
            .ok_or(BatchError::JobNotFound(job_id))
    }

    /// All jobs, newest first
    pub async fn list(&self) -> Result<Vec<BatchJob>, BatchError> {
        let mut jobs = self.store.list().await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Cancel a job that has not started
    ///
    /// Returns `Ok(true)` when the job was cancelled and `Ok(false)` when it
    /// had already finished. A running job is never interrupted.
    pub async fn cancel(&self, job_id: Uuid) -> Result<bool, BatchError> {
        match self
            .store
            .transition(
                job_id,
                JobStatus::Pending,
                JobStatus::Failed,
                Some("cancelled before start".to_string()),
            )
            .await
        {
            Ok(_) => {
                info!(job_id = %job_id, "Batch SSL job cancelled");
                Ok(true)
            }
            Err(JobStoreError::Conflict {
                actual: JobStatus::Running,
                ..
            }) => Err(BatchError::JobRunning(job_id)),
            Err(JobStoreError::Conflict { .. }) => Ok(false),
            Err(JobStoreError::NotFound(_)) => Err(BatchError::JobNotFound(job_id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop terminal jobs older than the retention window
    pub async fn purge_expired(&self) -> Result<usize, BatchError> {
        let retention = chrono::Duration::from_std(self.config.retention)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let purged = self
            .store
            .purge_terminal_before(Utc::now() - retention)
            .await?;
        if purged > 0 {
            info!(purged, "Purged expired batch jobs");
        }
        Ok(purged)
    }

    /// Periodically purge expired jobs until the handle is aborted
    pub fn spawn_retention_sweep(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.config.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(e) = engine.purge_expired().await {
                    warn!(error = %e, "Batch job retention sweep failed");
                }
            }
        })
    }
}

impl From<&Result<SslOutcome, OrchestratorError>> for DomainResult {
    fn from(result: &Result<SslOutcome, OrchestratorError>) -> Self {
        match result {
            Ok(_) => DomainResult::ok(),
            Err(e) => DomainResult::failed(e.code(), e.to_string(), e.is_retryable()),
        }
    }
}

/// Runner for one job: waits for a slot, fans out, aggregates
async fn run_job(
    orchestrator: Arc<DomainOrchestrator>,
    store: Arc<dyn JobStore>,
    job_slots: Arc<Semaphore>,
    workers: usize,
    job_id: Uuid,
    domain_ids: Vec<Uuid>,
) {
    let _permit = match job_slots.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            let _ = store
                .transition(
                    job_id,
                    JobStatus::Pending,
                    JobStatus::Failed,
                    Some("batch engine shut down".to_string()),
                )
                .await;
            return;
        }
    };

    match store
        .transition(job_id, JobStatus::Pending, JobStatus::Running, None)
        .await
    {
        Ok(_) => {}
        Err(JobStoreError::Conflict { actual, .. }) => {
            debug!(job_id = %job_id, status = %actual, "Job no longer pending, not starting");
            return;
        }
        Err(JobStoreError::NotFound(_)) => return,
        Err(e) => {
            error!(job_id = %job_id, error = %e, "Failed to start batch job");
            let _ = store
                .transition(
                    job_id,
                    JobStatus::Pending,
                    JobStatus::Failed,
                    Some(format!("failed to start: {}", e)),
                )
                .await;
            return;
        }
    }

    info!(job_id = %job_id, total = domain_ids.len(), workers, "Batch SSL job started");

    let (work_tx, work_rx) = mpsc::channel::<Uuid>(domain_ids.len().max(1));
    for id in &domain_ids {
        // Capacity covers every domain
        let _ = work_tx.try_send(*id);
    }
    drop(work_tx);
    let work_rx = Arc::new(Mutex::new(work_rx));

    let (result_tx, mut result_rx) = mpsc::channel::<(Uuid, DomainResult)>(domain_ids.len().max(1));
    for worker in 0..workers.min(domain_ids.len()) {
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            loop {
                let next = work_rx.lock().await.recv().await;
                let Some(domain_id) = next else { break };

                let outcome = orchestrator.activate_ssl(domain_id).await;
                let result = DomainResult::from(&outcome);
                debug!(job_id = %job_id, worker, domain_id = %domain_id, success = result.success, "Domain processed");

                if result_tx.send((domain_id, result)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut processed = 0usize;
    while let Some((domain_id, result)) = result_rx.recv().await {
        match store.record_result(job_id, domain_id, result).await {
            Ok(job) => processed = job.progress_count,
            Err(e) => error!(job_id = %job_id, domain_id = %domain_id, error = %e, "Failed to record batch result"),
        }
    }

    // Workers that died mid-job leave domains without a result
    if processed > 0 && processed < domain_ids.len() {
        if let Ok(Some(job)) = store.get(job_id).await {
            for domain_id in domain_ids.iter().filter(|id| !job.results.contains_key(id)) {
                let result = DomainResult::failed(
                    "WORKER_CRASHED",
                    "worker stopped before processing this domain",
                    true,
                );
                if let Ok(job) = store.record_result(job_id, *domain_id, result).await {
                    processed = job.progress_count;
                }
            }
        }
    }

    let (status, failure) = if processed == 0 {
        (
            JobStatus::Failed,
            Some("batch crashed before processing any domain".to_string()),
        )
    } else {
        (JobStatus::Completed, None)
    };

    match store
        .transition(job_id, JobStatus::Running, status, failure)
        .await
    {
        Ok(job) => info!(
            job_id = %job_id,
            status = %job.status,
            succeeded = job.succeeded(),
            failed = job.failed(),
            "Batch SSL job finished"
        ),
        Err(e) => error!(job_id = %job_id, error = %e, "Failed to finish batch job"),
    }
}
