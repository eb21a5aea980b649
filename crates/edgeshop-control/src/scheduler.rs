//! Background certificate renewal
//!
//! A single timer periodically looks for active, auto-renewing certificates
//! that expire within the renewal window and feeds them back through
//! [`DomainOrchestrator::renew_ssl`]. Every attempt is written to the
//! renewal log. A tick that arrives while a pass is still running is
//! skipped, never queued.

use crate::orchestrator::DomainOrchestrator;
use chrono::{DateTime, Utc};
use edgeshop_db::entities::certificate::{self, CertificateStatus};
use edgeshop_db::entities::domain::DomainStatus;
use edgeshop_db::entities::renewal_log::{self, RenewalOutcome};
use edgeshop_db::entities::{Certificate, Domain, RenewalLog};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Shortest allowed interval between passes
const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Bounds for the per-renewal provider timeout
const MIN_RENEWAL_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RENEWAL_TIMEOUT: Duration = Duration::from_secs(600);

/// Bounds for renewal log retention in days
const MIN_LOG_RETENTION_DAYS: u32 = 1;
const MAX_LOG_RETENTION_DAYS: u32 = 365;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    #[error("days to keep must be between 1 and 365, got {0}")]
    InvalidRetention(u32),

    #[error("a renewal pass is already running")]
    PassInProgress,

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl SchedulerError {
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::InvalidConfig(_) => "INVALID_CONFIG",
            SchedulerError::InvalidRetention(_) => "INVALID_RETENTION",
            SchedulerError::PassInProgress => "PASS_IN_PROGRESS",
            SchedulerError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Renewal scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
    /// Time between passes
    #[serde(with = "duration_secs")]
    pub interval: Duration,
    /// Renewal window: certificates expiring within this many days are renewed
    pub days_before_expiry: u32,
    /// Most certificates processed in one pass
    pub max_per_run: u32,
    /// Provider timeout for a single renewal
    #[serde(with = "duration_secs")]
    pub renewal_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            days_before_expiry: 30,
            max_per_run: 50,
            renewal_timeout: Duration::from_secs(120),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if !(1..=89).contains(&self.days_before_expiry) {
            return Err(SchedulerError::InvalidConfig(format!(
                "daysBeforeExpiry must be between 1 and 89, got {}",
                self.days_before_expiry
            )));
        }
        if self.interval < MIN_INTERVAL {
            return Err(SchedulerError::InvalidConfig(format!(
                "interval must be at least {}s, got {}s",
                MIN_INTERVAL.as_secs(),
                self.interval.as_secs()
            )));
        }
        if !(1..=500).contains(&self.max_per_run) {
            return Err(SchedulerError::InvalidConfig(format!(
                "maxPerRun must be between 1 and 500, got {}",
                self.max_per_run
            )));
        }
        if self.renewal_timeout < MIN_RENEWAL_TIMEOUT || self.renewal_timeout > MAX_RENEWAL_TIMEOUT
        {
            return Err(SchedulerError::InvalidConfig(format!(
                "renewal timeout must be between {}s and {}s, got {}s",
                MIN_RENEWAL_TIMEOUT.as_secs(),
                MAX_RENEWAL_TIMEOUT.as_secs(),
                self.renewal_timeout.as_secs()
            )));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
}

/// Totals for one renewal pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub candidates: usize,
    pub renewed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Certificates marked expired by the sweep that opens each pass
    pub expired: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// Timer is active
    pub running: bool,
    pub pass_in_progress: bool,
    pub config: SchedulerConfig,
    pub last_run: Option<RunSummary>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Clears the pass flag when dropped, including on panic
struct PassGuard(Arc<AtomicBool>);

impl PassGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PassGuard(Arc::clone(flag)))
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RenewalScheduler {
    orchestrator: Arc<DomainOrchestrator>,
    config: RwLock<SchedulerConfig>,
    timer: Mutex<Option<JoinHandle<()>>>,
    pass_running: Arc<AtomicBool>,
    last_run: RwLock<Option<RunSummary>>,
    next_run_at: Mutex<Option<DateTime<Utc>>>,
}

impl RenewalScheduler {
    pub fn new(
        orchestrator: Arc<DomainOrchestrator>,
        config: SchedulerConfig,
    ) -> Result<Arc<Self>, SchedulerError> {
        config.validate()?;
        Ok(Arc::new(Self {
            orchestrator,
            config: RwLock::new(config),
            timer: Mutex::new(None),
            pass_running: Arc::new(AtomicBool::new(false)),
            last_run: RwLock::new(None),
            next_run_at: Mutex::new(None),
        }))
    }

    /// Start the timer; a no-op returning `false` if it is already running
    pub async fn start(self: &Arc<Self>) -> bool {
        let interval = self.config.read().await.interval;

        let mut timer = self.timer.lock().unwrap_or_else(|e| e.into_inner());
        if timer.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Renewal scheduler already running");
            return false;
        }

        let this = Arc::clone(self);
        *timer = Some(tokio::spawn(async move { this.run_timer(interval).await }));

        info!(
            interval_secs = interval.as_secs(),
            "Certificate renewal scheduler started"
        );
        true
    }

    /// Stop the timer; a no-op returning `false` if it is not running
    ///
    /// A pass already in progress runs to completion.
    pub fn stop(&self) -> bool {
        let handle = self.timer.lock().unwrap_or_else(|e| e.into_inner()).take();
        self.set_next_run(None);
        match handle {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                info!("Certificate renewal scheduler stopped");
                true
            }
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Trigger a pass in the background
    ///
    /// Returns `false` without starting anything if a pass is already running.
    pub fn run_once(self: &Arc<Self>) -> bool {
        let Some(guard) = PassGuard::acquire(&self.pass_running) else {
            debug!("Renewal pass already in progress");
            return false;
        };

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = this.execute_pass().await {
                error!(error = %e, "Renewal pass failed");
            }
        });
        true
    }

    /// Run a pass and wait for it
    pub async fn run_pass(&self) -> Result<RunSummary, SchedulerError> {
        let _guard = PassGuard::acquire(&self.pass_running).ok_or(SchedulerError::PassInProgress)?;
        self.execute_pass().await
    }

    pub async fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            running: self.is_running(),
            pass_in_progress: self.pass_running.load(Ordering::SeqCst),
            config: self.config.read().await.clone(),
            last_run: self.last_run.read().await.clone(),
            next_run_at: *self.next_run_at.lock().unwrap_or_else(|e| e.into_inner()),
        }
    }

    pub async fn config(&self) -> SchedulerConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration
    ///
    /// A running timer is restarted when the interval changes.
    pub async fn update_config(
        self: &Arc<Self>,
        config: SchedulerConfig,
    ) -> Result<SchedulerConfig, SchedulerError> {
        config.validate()?;

        let interval_changed = {
            let mut current = self.config.write().await;
            let changed = current.interval != config.interval;
            *current = config.clone();
            changed
        };

        info!(
            interval_secs = config.interval.as_secs(),
            days_before_expiry = config.days_before_expiry,
            max_per_run = config.max_per_run,
            renewal_timeout_secs = config.renewal_timeout.as_secs(),
            "Renewal scheduler configuration updated"
        );

        if interval_changed && self.stop() {
            self.start().await;
        }
        Ok(config)
    }

    /// Delete renewal log entries older than `days_to_keep` days
    pub async fn prune_logs(&self, days_to_keep: u32) -> Result<u64, SchedulerError> {
        if !(MIN_LOG_RETENTION_DAYS..=MAX_LOG_RETENTION_DAYS).contains(&days_to_keep) {
            return Err(SchedulerError::InvalidRetention(days_to_keep));
        }

        let cutoff = Utc::now() - chrono::Duration::days(days_to_keep as i64);
        let result = RenewalLog::delete_many()
            .filter(renewal_log::Column::ExecutedAt.lt(cutoff))
            .exec(self.orchestrator.db())
            .await?;

        info!(deleted = result.rows_affected, days_to_keep, "Pruned renewal log");
        Ok(result.rows_affected)
    }

    /// Most recent renewal log entries, newest first
    pub async fn recent_logs(&self, limit: u64) -> Result<Vec<renewal_log::Model>, SchedulerError> {
        Ok(RenewalLog::find()
            .order_by_desc(renewal_log::Column::ExecutedAt)
            .limit(limit)
            .all(self.orchestrator.db())
            .await?)
    }

    async fn run_timer(self: Arc<Self>, interval: Duration) {
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            self.set_next_run(chrono::Duration::from_std(interval).ok().map(|d| Utc::now() + d));
            ticker.tick().await;

            debug!("Running scheduled certificate renewal check");
            if !self.run_once() {
                warn!("Previous renewal pass still running, skipping tick");
            }
        }
    }

    fn set_next_run(&self, at: Option<DateTime<Utc>>) {
        *self.next_run_at.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    async fn execute_pass(&self) -> Result<RunSummary, SchedulerError> {
        let config = self.config.read().await.clone();
        let db = self.orchestrator.db();
        let started_at = Utc::now();
        let mut summary = RunSummary {
            started_at: Some(started_at),
            ..Default::default()
        };

        summary.expired = match self.orchestrator.expire_lapsed_certificates(started_at).await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "Certificate expiry sweep failed");
                0
            }
        };

        let window_end = started_at + chrono::Duration::days(config.days_before_expiry as i64);
        let candidates = Certificate::find()
            .filter(certificate::Column::Status.eq(CertificateStatus::Active))
            .filter(certificate::Column::AutoRenew.eq(true))
            .filter(certificate::Column::ExpiresAt.lte(window_end))
            .order_by_asc(certificate::Column::ExpiresAt)
            .limit(config.max_per_run as u64)
            .all(db)
            .await?;
        summary.candidates = candidates.len();

        info!(
            candidates = candidates.len(),
            days_before_expiry = config.days_before_expiry,
            "Checking certificates for renewal"
        );

        for cert in candidates {
            let (hostname, outcome, detail) = self.renew(&cert, config.renewal_timeout).await?;
            match outcome {
                RenewalOutcome::Renewed => summary.renewed += 1,
                RenewalOutcome::Skipped => summary.skipped += 1,
                RenewalOutcome::Failed => summary.failed += 1,
            }

            renewal_log::ActiveModel {
                id: Set(Uuid::new_v4()),
                domain: Set(hostname),
                executed_at: Set(Utc::now()),
                outcome: Set(outcome),
                detail: Set(detail),
            }
            .insert(db)
            .await?;
        }

        summary.finished_at = Some(Utc::now());
        info!(
            renewed = summary.renewed,
            skipped = summary.skipped,
            failed = summary.failed,
            expired = summary.expired,
            "Renewal pass finished"
        );

        *self.last_run.write().await = Some(summary.clone());
        Ok(summary)
    }

    /// One renewal attempt; never fails except on database errors
    async fn renew(
        &self,
        cert: &certificate::Model,
        timeout: Duration,
    ) -> Result<(String, RenewalOutcome, String), SchedulerError> {
        let Some(domain) = Domain::find_by_id(cert.domain_id)
            .one(self.orchestrator.db())
            .await?
        else {
            return Ok((
                cert.domain_id.to_string(),
                RenewalOutcome::Skipped,
                "domain no longer exists".to_string(),
            ));
        };

        if domain.status != DomainStatus::Verified {
            debug!(domain = %domain.hostname, status = domain.status.as_str(), "Skipping renewal");
            return Ok((
                domain.hostname,
                RenewalOutcome::Skipped,
                format!("domain is {}, not ready for renewal", domain.status.as_str()),
            ));
        }

        let previous_expiry = cert.expires_at;
        let result = self.orchestrator.renew_ssl(domain.id, timeout).await;

        let (outcome, detail) = match result {
            Ok(ssl) if ssl.certificate.expires_at > previous_expiry => {
                info!(domain = %domain.hostname, expires_at = ?ssl.certificate.expires_at, "Certificate renewed");
                (
                    RenewalOutcome::Renewed,
                    format!(
                        "certificate now expires {}",
                        ssl.certificate
                            .expires_at
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_default()
                    ),
                )
            }
            Ok(ssl) if ssl.is_pending() => (
                RenewalOutcome::Skipped,
                "issuance pending at provider".to_string(),
            ),
            Ok(_) => (
                RenewalOutcome::Skipped,
                "provider has not issued a newer certificate yet".to_string(),
            ),
            Err(e) if e.is_timeout() => {
                warn!(domain = %domain.hostname, timeout_secs = timeout.as_secs(), "Certificate renewal timed out");
                (
                    RenewalOutcome::Failed,
                    format!("{}: renewal timed out after {}s", e.code(), timeout.as_secs()),
                )
            }
            Err(e) => {
                warn!(domain = %domain.hostname, error = %e, "Certificate renewal failed");
                (RenewalOutcome::Failed, format!("{}: {}", e.code(), e))
            }
        };

        Ok((domain.hostname, outcome, detail))
    }
}
