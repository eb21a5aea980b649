use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use edgeshop_control::{
    BatchError, OrchestratorError, SchedulerConfig, SchedulerError,
};
use edgeshop_provider::ProviderError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Renewal log entries returned with the cron status
const RECENT_LOG_LIMIT: u64 = 50;

/// Default renewal log retention for the prune endpoint
const DEFAULT_DAYS_TO_KEEP: u32 = 30;

fn api_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse::new(code, message)))
}

fn orchestrator_error(e: OrchestratorError) -> ApiError {
    let status = if e.is_client_error() {
        match &e {
            OrchestratorError::InvalidHostname(_) | OrchestratorError::MissingTenant => {
                StatusCode::BAD_REQUEST
            }
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        }
    } else {
        match &e {
            OrchestratorError::Provider(ProviderError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            OrchestratorError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        }
    };
    if status.is_server_error() {
        error!(code = e.code(), error = %e, "Domain operation failed");
    }
    api_error(status, e.code(), e.to_string())
}

fn batch_error(e: BatchError) -> ApiError {
    let status = match &e {
        BatchError::Empty | BatchError::TooLarge { .. } => StatusCode::BAD_REQUEST,
        BatchError::Ineligible(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BatchError::JobNotFound(_) => StatusCode::NOT_FOUND,
        BatchError::JobRunning(_) => StatusCode::CONFLICT,
        BatchError::Store(_) | BatchError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let code = e.code();
    let message = e.to_string();
    let ineligible = match e {
        BatchError::Ineligible(domains) => {
            Some(domains.into_iter().map(IneligibleDomainView::from).collect())
        }
        _ => None,
    };
    (
        status,
        Json(ErrorResponse {
            ineligible,
            ..ErrorResponse::new(code, message)
        }),
    )
}

fn scheduler_error(e: SchedulerError) -> ApiError {
    let status = match &e {
        SchedulerError::InvalidConfig(_) | SchedulerError::InvalidRetention(_) => {
            StatusCode::BAD_REQUEST
        }
        SchedulerError::PassInProgress => StatusCode::CONFLICT,
        SchedulerError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.code(), e.to_string())
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        success: true,
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ----------------------------------------------------------------------
// Domains
// ----------------------------------------------------------------------

/// Register a custom domain and create its provider zone
#[utoipa::path(
    post,
    path = "/api/domains",
    request_body = RegisterDomainRequest,
    responses(
        (status = 201, description = "Domain registered, zone pending", body = DomainResponse),
        (status = 400, description = "Invalid hostname or tenant", body = ErrorResponse),
        (status = 409, description = "Hostname already registered", body = ErrorResponse),
        (status = 502, description = "Provider error; domain stored as failed", body = ErrorResponse)
    ),
    tag = "domains"
)]
pub async fn register_domain(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterDomainRequest>,
) -> Result<(StatusCode, Json<DomainResponse>), ApiError> {
    info!(hostname = %req.hostname, tenant_id = %req.tenant_id, "Registering domain");

    let details = state
        .orchestrator
        .register_domain(&req.hostname, &req.tenant_id)
        .await
        .map_err(orchestrator_error)?;

    Ok((
        StatusCode::CREATED,
        Json(DomainResponse {
            success: true,
            domain: details.domain.into(),
            certificate: details.certificate.map(Into::into),
            zone: details.zone.map(Into::into),
        }),
    ))
}

/// List custom domains, newest first
#[utoipa::path(
    get,
    path = "/api/domains",
    params(DomainListQuery),
    responses(
        (status = 200, description = "Domains", body = DomainListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "domains"
)]
pub async fn list_domains(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DomainListQuery>,
) -> Result<Json<DomainListResponse>, ApiError> {
    debug!(tenant_id = ?query.tenant_id, "Listing domains");

    let domains: Vec<DomainView> = state
        .orchestrator
        .list_domains(query.tenant_id.as_deref())
        .await
        .map_err(orchestrator_error)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(DomainListResponse {
        success: true,
        total: domains.len(),
        domains,
    }))
}

/// Get a domain with its certificate and zone
#[utoipa::path(
    get,
    path = "/api/domains/{id}",
    params(
        ("id" = Uuid, Path, description = "Domain ID")
    ),
    responses(
        (status = 200, description = "Domain", body = DomainResponse),
        (status = 404, description = "Domain not found", body = ErrorResponse)
    ),
    tag = "domains"
)]
pub async fn get_domain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DomainResponse>, ApiError> {
    let details = state
        .orchestrator
        .get_domain(id)
        .await
        .map_err(orchestrator_error)?;

    Ok(Json(DomainResponse {
        success: true,
        domain: details.domain.into(),
        certificate: details.certificate.map(Into::into),
        zone: details.zone.map(Into::into),
    }))
}

/// Delete a domain, its certificate and its provider zone
#[utoipa::path(
    delete,
    path = "/api/domains/{id}",
    params(
        ("id" = Uuid, Path, description = "Domain ID")
    ),
    responses(
        (status = 200, description = "Domain deleted", body = DeleteDomainResponse),
        (status = 404, description = "Domain not found", body = ErrorResponse)
    ),
    tag = "domains"
)]
pub async fn delete_domain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteDomainResponse>, ApiError> {
    info!(domain_id = %id, "Deleting domain");

    state
        .orchestrator
        .remove_domain(id)
        .await
        .map_err(orchestrator_error)?;

    Ok(Json(DeleteDomainResponse {
        success: true,
        deleted: true,
    }))
}

/// Check DNS for a domain
///
/// A DNS mismatch is not an error: the response carries the diagnostic and
/// the domain keeps its status.
#[utoipa::path(
    post,
    path = "/api/domains/{id}/verify",
    params(
        ("id" = Uuid, Path, description = "Domain ID")
    ),
    responses(
        (status = 200, description = "Verification result", body = VerifyResponse),
        (status = 404, description = "Domain not found", body = ErrorResponse),
        (status = 409, description = "Domain has no zone yet or was deactivated", body = ErrorResponse)
    ),
    tag = "domains"
)]
pub async fn verify_domain(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<VerifyResponse>, ApiError> {
    debug!(domain_id = %id, "Verifying domain");

    let outcome = state
        .orchestrator
        .verify_domain(id)
        .await
        .map_err(orchestrator_error)?;

    Ok(Json(VerifyResponse {
        success: true,
        domain: outcome.domain.into(),
        verification: outcome.verification.into(),
    }))
}

// ----------------------------------------------------------------------
// SSL
// ----------------------------------------------------------------------

/// Activate the edge certificate for a verified domain
#[utoipa::path(
    post,
    path = "/api/ssl/activate",
    request_body = ActivateSslRequest,
    responses(
        (status = 200, description = "Certificate active or issuance pending", body = SslResponse),
        (status = 404, description = "Domain not found", body = ErrorResponse),
        (status = 409, description = "Domain not verified or zone not active yet", body = ErrorResponse),
        (status = 502, description = "Provider error", body = ErrorResponse),
        (status = 504, description = "Provider timed out", body = ErrorResponse)
    ),
    tag = "ssl"
)]
pub async fn activate_ssl(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActivateSslRequest>,
) -> Result<Json<SslResponse>, ApiError> {
    info!(domain_id = %req.domain_id, "Activating SSL");

    let outcome = state
        .orchestrator
        .activate_ssl(req.domain_id)
        .await
        .map_err(orchestrator_error)?;

    Ok(Json(SslResponse {
        success: true,
        pending: outcome.is_pending(),
        domain: outcome.domain.into(),
        certificate: outcome.certificate.into(),
    }))
}

/// Submit a batch SSL activation job
#[utoipa::path(
    post,
    path = "/api/ssl/batch",
    request_body = BatchSubmitRequest,
    responses(
        (status = 202, description = "Job queued", body = BatchSubmitResponse),
        (status = 400, description = "Empty or oversized batch", body = ErrorResponse),
        (status = 422, description = "Some domains are not verified; no job created", body = ErrorResponse)
    ),
    tag = "ssl"
)]
pub async fn submit_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchSubmitRequest>,
) -> Result<(StatusCode, Json<BatchSubmitResponse>), ApiError> {
    let job = state
        .batch
        .submit(req.domain_ids)
        .await
        .map_err(batch_error)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchSubmitResponse {
            success: true,
            job_id: job.id,
            status: job.status.as_str().to_string(),
            total_count: job.total_count,
        }),
    ))
}

/// Get one batch job, or list all jobs when `jobId` is omitted
#[utoipa::path(
    get,
    path = "/api/ssl/batch",
    params(JobQuery),
    responses(
        (status = 200, description = "Job status (or job list when jobId is omitted)", body = BatchJobResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    ),
    tag = "ssl"
)]
pub async fn get_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = match query.job_id {
        Some(job_id) => {
            let job = state.batch.get(job_id).await.map_err(batch_error)?;
            serde_json::to_value(BatchJobResponse {
                success: true,
                job: job.into(),
            })
        }
        None => {
            let jobs = state.batch.list().await.map_err(batch_error)?;
            serde_json::to_value(BatchJobListResponse {
                success: true,
                jobs: jobs.into_iter().map(Into::into).collect(),
            })
        }
    }
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR", e.to_string()))?;

    Ok(Json(body))
}

/// Cancel a batch job that has not started
#[utoipa::path(
    delete,
    path = "/api/ssl/batch",
    params(JobQuery),
    responses(
        (status = 200, description = "Cancellation result", body = CancelResponse),
        (status = 400, description = "jobId missing", body = ErrorResponse),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Job is running", body = ErrorResponse)
    ),
    tag = "ssl"
)]
pub async fn cancel_batch(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobQuery>,
) -> Result<Json<CancelResponse>, ApiError> {
    let job_id = query
        .job_id
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "MISSING_JOB_ID", "jobId is required"))?;

    let cancelled = state.batch.cancel(job_id).await.map_err(batch_error)?;

    Ok(Json(CancelResponse {
        success: true,
        cancelled,
    }))
}

// ----------------------------------------------------------------------
// Renewal scheduler
// ----------------------------------------------------------------------

/// Scheduler status with the most recent renewal attempts
#[utoipa::path(
    get,
    path = "/api/ssl/cron",
    responses(
        (status = 200, description = "Scheduler status", body = CronStatusResponse)
    ),
    tag = "renewal"
)]
pub async fn cron_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CronStatusResponse>, ApiError> {
    let status = state.scheduler.status().await;
    let recent_logs = state
        .scheduler
        .recent_logs(RECENT_LOG_LIMIT)
        .await
        .map_err(scheduler_error)?;

    Ok(Json(CronStatusResponse {
        success: true,
        running: status.running,
        pass_in_progress: status.pass_in_progress,
        config: status.config.into(),
        last_run: status.last_run.map(Into::into),
        next_run_at: status.next_run_at,
        recent_logs: recent_logs.into_iter().map(Into::into).collect(),
    }))
}

/// Start or stop the timer, or trigger a pass now
#[utoipa::path(
    post,
    path = "/api/ssl/cron",
    request_body = CronActionRequest,
    responses(
        (status = 200, description = "Action applied", body = CronActionResponse)
    ),
    tag = "renewal"
)]
pub async fn cron_action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CronActionRequest>,
) -> Json<CronActionResponse> {
    let changed = match req.action {
        CronAction::Start => state.scheduler.start().await,
        CronAction::Stop => state.scheduler.stop(),
        CronAction::Run => state.scheduler.run_once(),
    };
    info!(action = ?req.action, changed, "Renewal scheduler action");

    Json(CronActionResponse {
        success: true,
        action: req.action,
        changed,
    })
}

/// Update scheduler configuration; omitted fields keep their value
#[utoipa::path(
    put,
    path = "/api/ssl/cron",
    request_body = CronConfigUpdate,
    responses(
        (status = 200, description = "Configuration updated", body = CronConfigResponse),
        (status = 400, description = "Configuration out of range", body = ErrorResponse)
    ),
    tag = "renewal"
)]
pub async fn update_cron_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<CronConfigUpdate>,
) -> Result<Json<CronConfigResponse>, ApiError> {
    let current = state.scheduler.config().await;
    let config = SchedulerConfig {
        interval: update
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or(current.interval),
        days_before_expiry: update
            .days_before_expiry
            .unwrap_or(current.days_before_expiry),
        max_per_run: update.max_per_run.unwrap_or(current.max_per_run),
        renewal_timeout: update
            .renewal_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(current.renewal_timeout),
    };

    let config = state
        .scheduler
        .update_config(config)
        .await
        .map_err(scheduler_error)?;

    Ok(Json(CronConfigResponse {
        success: true,
        config: config.into(),
    }))
}

/// Delete old renewal log entries
#[utoipa::path(
    delete,
    path = "/api/ssl/cron",
    params(PruneQuery),
    responses(
        (status = 200, description = "Entries deleted", body = PruneResponse),
        (status = 400, description = "daysToKeep out of range", body = ErrorResponse)
    ),
    tag = "renewal"
)]
pub async fn prune_renewal_log(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PruneQuery>,
) -> Result<Json<PruneResponse>, ApiError> {
    let deleted = state
        .scheduler
        .prune_logs(query.days_to_keep.unwrap_or(DEFAULT_DAYS_TO_KEEP))
        .await
        .map_err(scheduler_error)?;

    Ok(Json(PruneResponse {
        success: true,
        deleted,
    }))
}
