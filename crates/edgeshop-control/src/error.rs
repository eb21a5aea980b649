//! Error types for domain orchestration

use crate::hostname::HostnameError;
use crate::lifecycle::{CertificateStateError, TransitionError};
use edgeshop_provider::ProviderError;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid hostname: {0}")]
    InvalidHostname(#[from] HostnameError),

    #[error("tenant id is required")]
    MissingTenant,

    #[error("hostname {0} is already registered")]
    AlreadyRegistered(String),

    #[error("domain {0} not found")]
    NotFound(Uuid),

    #[error("domain {id} is {status}: {reason}")]
    InvalidState {
        id: Uuid,
        status: &'static str,
        reason: String,
    },

    #[error("zone for {0} is not active yet")]
    ZoneNotActive(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Certificate(#[from] CertificateStateError),

    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

impl OrchestratorError {
    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidHostname(_) => "INVALID_HOSTNAME",
            OrchestratorError::MissingTenant => "MISSING_TENANT",
            OrchestratorError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            OrchestratorError::NotFound(_) => "DOMAIN_NOT_FOUND",
            OrchestratorError::InvalidState { .. } => "INVALID_STATE",
            OrchestratorError::ZoneNotActive(_) => "ZONE_NOT_ACTIVE",
            OrchestratorError::Provider(e) => e.code(),
            OrchestratorError::Transition(_) => "INVALID_TRANSITION",
            OrchestratorError::Certificate(_) => "INVALID_CERTIFICATE",
            OrchestratorError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether repeating the same call later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::ZoneNotActive(_) => true,
            OrchestratorError::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The provider did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, OrchestratorError::Provider(ProviderError::Timeout))
    }

    /// Caller input problems (as opposed to upstream or infrastructure failures)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            OrchestratorError::InvalidHostname(_)
                | OrchestratorError::MissingTenant
                | OrchestratorError::AlreadyRegistered(_)
                | OrchestratorError::NotFound(_)
                | OrchestratorError::InvalidState { .. }
                | OrchestratorError::ZoneNotActive(_)
                | OrchestratorError::Transition(_)
        )
    }
}
