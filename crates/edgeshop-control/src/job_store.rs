//! Batch job storage
//!
//! [`JobStore`] is the seam between the batch engine and wherever job state
//! lives. [`InMemoryJobStore`] keeps jobs in process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Jobs only move forward: pending -> running -> completed|failed, or pending -> failed
    fn can_become(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of SSL activation for one domain in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub retryable: bool,
}

impl DomainResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            retryable: false,
        }
    }

    pub fn failed(code: &str, error: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            code: Some(code.to_string()),
            retryable,
        }
    }
}

/// One batch SSL activation job
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchJob {
    pub id: Uuid,
    /// Requested domains in submission order, no duplicates
    pub domain_ids: Vec<Uuid>,
    pub status: JobStatus,
    pub progress_count: usize,
    pub total_count: usize,
    pub results: HashMap<Uuid, DomainResult>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Job-level failure reason
    pub error: Option<String>,
}

impl BatchJob {
    pub fn new(domain_ids: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            total_count: domain_ids.len(),
            domain_ids,
            status: JobStatus::Pending,
            progress_count: 0,
            results: HashMap::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.values().filter(|r| !r.success).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobStoreError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("job {0} is running and cannot be deleted")]
    Running(Uuid),

    #[error("job {id} is {actual}, expected {expected}")]
    Conflict {
        id: Uuid,
        expected: JobStatus,
        actual: JobStatus,
    },

    #[error("job status cannot move from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("domain {domain_id} is not part of job {id}")]
    UnknownDomain { id: Uuid, domain_id: Uuid },

    #[error("job store error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<BatchJob>, JobStoreError>;

    /// Insert or replace a job
    async fn put(&self, job: BatchJob) -> Result<(), JobStoreError>;

    /// Remove a job; running jobs are refused
    async fn delete(&self, id: Uuid) -> Result<bool, JobStoreError>;

    async fn list(&self) -> Result<Vec<BatchJob>, JobStoreError>;

    /// Atomically move a job from `from` to `to`
    ///
    /// Sets `started_at` on entering running and `completed_at` on entering a
    /// terminal state. Fails with [`JobStoreError::Conflict`] if the job is not
    /// currently in `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        error: Option<String>,
    ) -> Result<BatchJob, JobStoreError>;

    /// Record the result for one domain of a running job and advance progress
    async fn record_result(
        &self,
        id: Uuid,
        domain_id: Uuid,
        result: DomainResult,
    ) -> Result<BatchJob, JobStoreError>;

    /// Delete terminal jobs that completed before `cutoff`
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<usize, JobStoreError> {
        let mut purged = 0;
        for job in self.list().await? {
            let expired = job.status.is_terminal()
                && job.completed_at.unwrap_or(job.created_at) < cutoff;
            if expired && self.delete(job.id).await? {
                purged += 1;
            }
        }
        Ok(purged)
    }
}

/// Process-memory job store
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<Uuid, BatchJob>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: Uuid) -> Result<Option<BatchJob>, JobStoreError> {
        Ok(self.jobs.get(&id).map(|job| job.value().clone()))
    }

    async fn put(&self, job: BatchJob) -> Result<(), JobStoreError> {
        self.jobs.insert(job.id, job);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, JobStoreError> {
        // remove_if holds the shard lock for the check
        match self
            .jobs
            .remove_if(&id, |_, job| job.status != JobStatus::Running)
        {
            Some(_) => Ok(true),
            None if self.jobs.contains_key(&id) => Err(JobStoreError::Running(id)),
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<BatchJob>, JobStoreError> {
        Ok(self.jobs.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        error: Option<String>,
    ) -> Result<BatchJob, JobStoreError> {
        if !from.can_become(to) {
            return Err(JobStoreError::InvalidTransition { from, to });
        }

        let mut job = self.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.status != from {
            return Err(JobStoreError::Conflict {
                id,
                expected: from,
                actual: job.status,
            });
        }

        let now = Utc::now();
        job.status = to;
        match to {
            JobStatus::Running => job.started_at = Some(now),
            JobStatus::Completed | JobStatus::Failed => job.completed_at = Some(now),
            JobStatus::Pending => {}
        }
        if error.is_some() {
            job.error = error;
        }

        Ok(job.value().clone())
    }

    async fn record_result(
        &self,
        id: Uuid,
        domain_id: Uuid,
        result: DomainResult,
    ) -> Result<BatchJob, JobStoreError> {
        let mut job = self.jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        if job.status != JobStatus::Running {
            return Err(JobStoreError::Conflict {
                id,
                expected: JobStatus::Running,
                actual: job.status,
            });
        }
        if !job.domain_ids.contains(&domain_id) {
            return Err(JobStoreError::UnknownDomain { id, domain_id });
        }

        // First result per domain counts toward progress
        if job.results.insert(domain_id, result).is_none() {
            job.progress_count = (job.progress_count + 1).min(job.total_count);
        }

        Ok(job.value().clone())
    }
}
