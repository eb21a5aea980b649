//! Domain and certificate lifecycle
//!
//! `status`, `dns_verified` and `ssl_active` on a domain row, and `status`,
//! `issued_at` and `expires_at` on a certificate row, are projections of the
//! tagged states below. The `write_*` functions are the only code that
//! assigns those columns.

use chrono::{DateTime, Utc};
use edgeshop_db::entities::certificate::{self, CertificateStatus};
use edgeshop_db::entities::domain::{self, DomainStatus};
use sea_orm::ActiveValue::Set;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event} to a domain in state {state}")]
pub struct TransitionError {
    pub state: &'static str,
    pub event: &'static str,
}

/// Lifecycle of one custom domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Pending,
    ZonePending,
    Verified {
        /// Last DNS check matched
        dns_current: bool,
        /// Active, unexpired certificate bound
        ssl_active: bool,
    },
    Failed,
    Inactive,
}

/// Things that happen to a domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainEvent {
    ZoneCreated,
    DnsVerified,
    DnsMismatch,
    SslActivated,
    SslFailed,
    SslLapsed,
    ProvisioningFailed,
    ZoneLost,
}

impl DomainEvent {
    fn name(&self) -> &'static str {
        match self {
            DomainEvent::ZoneCreated => "zone_created",
            DomainEvent::DnsVerified => "dns_verified",
            DomainEvent::DnsMismatch => "dns_mismatch",
            DomainEvent::SslActivated => "ssl_activated",
            DomainEvent::SslFailed => "ssl_failed",
            DomainEvent::SslLapsed => "ssl_lapsed",
            DomainEvent::ProvisioningFailed => "provisioning_failed",
            DomainEvent::ZoneLost => "zone_lost",
        }
    }
}

impl DomainState {
    /// Rebuild the state from a stored row
    pub fn of(model: &domain::Model) -> Self {
        match model.status {
            DomainStatus::Pending => DomainState::Pending,
            DomainStatus::ZonePending => DomainState::ZonePending,
            DomainStatus::Verified => DomainState::Verified {
                dns_current: model.dns_verified,
                ssl_active: model.ssl_active,
            },
            DomainStatus::Failed => DomainState::Failed,
            DomainStatus::Inactive => DomainState::Inactive,
        }
    }

    pub fn status(&self) -> DomainStatus {
        match self {
            DomainState::Pending => DomainStatus::Pending,
            DomainState::ZonePending => DomainStatus::ZonePending,
            DomainState::Verified { .. } => DomainStatus::Verified,
            DomainState::Failed => DomainStatus::Failed,
            DomainState::Inactive => DomainStatus::Inactive,
        }
    }

    pub fn dns_verified(&self) -> bool {
        matches!(
            self,
            DomainState::Verified {
                dns_current: true,
                ..
            }
        )
    }

    pub fn ssl_active(&self) -> bool {
        matches!(
            self,
            DomainState::Verified {
                ssl_active: true,
                ..
            }
        )
    }

    /// Apply an event, rejecting transitions the lifecycle does not allow
    pub fn apply(self, event: DomainEvent) -> Result<DomainState, TransitionError> {
        use DomainEvent as E;
        use DomainState as S;

        let next = match (self, event) {
            (S::Pending | S::Failed, E::ZoneCreated) => S::ZonePending,

            (S::Pending | S::ZonePending | S::Failed, E::ProvisioningFailed) => S::Failed,

            (S::ZonePending, E::DnsVerified) => S::Verified {
                dns_current: true,
                ssl_active: false,
            },
            (S::Verified { ssl_active, .. }, E::DnsVerified) => S::Verified {
                dns_current: true,
                ssl_active,
            },

            (S::ZonePending, E::DnsMismatch) => S::ZonePending,
            (S::Verified { ssl_active, .. }, E::DnsMismatch) => S::Verified {
                dns_current: false,
                ssl_active,
            },

            (S::Verified { dns_current, .. }, E::SslActivated) => S::Verified {
                dns_current,
                ssl_active: true,
            },
            (S::Verified { dns_current, .. }, E::SslFailed | E::SslLapsed) => S::Verified {
                dns_current,
                ssl_active: false,
            },
            // Only verified domains can carry ssl_active
            (state, E::SslLapsed) => state,

            (_, E::ZoneLost) => S::Inactive,

            (state, event) => {
                return Err(TransitionError {
                    state: state.status().as_str(),
                    event: event.name(),
                })
            }
        };

        Ok(next)
    }
}

/// Project a domain state onto its row
pub fn write_domain_state(model: &mut domain::ActiveModel, state: DomainState) {
    model.status = Set(state.status());
    model.dns_verified = Set(state.dns_verified());
    model.ssl_active = Set(state.ssl_active());
}

/// Lifecycle of a certificate row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateState {
    Pending,
    Active {
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
    Expired {
        issued_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    },
    Revoked,
    Error {
        issued_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CertificateStateError {
    #[error("certificate expiry {expires_at} is not after issue time {issued_at}")]
    InvalidValidity {
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    },
}

impl CertificateState {
    pub fn of(model: &certificate::Model) -> Self {
        match (&model.status, model.issued_at, model.expires_at) {
            (CertificateStatus::Pending, _, _) => CertificateState::Pending,
            (CertificateStatus::Active, Some(issued_at), Some(expires_at)) => {
                CertificateState::Active {
                    issued_at,
                    expires_at,
                }
            }
            // An active row without dates cannot be trusted
            (CertificateStatus::Active, issued_at, expires_at) => CertificateState::Error {
                issued_at,
                expires_at,
            },
            (CertificateStatus::Expired, issued_at, expires_at) => CertificateState::Expired {
                issued_at,
                expires_at,
            },
            (CertificateStatus::Revoked, _, _) => CertificateState::Revoked,
            (CertificateStatus::Error, issued_at, expires_at) => CertificateState::Error {
                issued_at,
                expires_at,
            },
        }
    }

    /// A freshly issued certificate
    pub fn activated(
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, CertificateStateError> {
        if expires_at <= issued_at {
            return Err(CertificateStateError::InvalidValidity {
                issued_at,
                expires_at,
            });
        }
        Ok(CertificateState::Active {
            issued_at,
            expires_at,
        })
    }

    /// State after a failed activation or renewal attempt
    ///
    /// A certificate that is still serving stays active; anything else is
    /// marked as errored.
    pub fn after_failure(self, now: DateTime<Utc>) -> Self {
        match self {
            CertificateState::Active { expires_at, .. } if expires_at > now => self,
            other => {
                let (issued_at, expires_at) = other.validity();
                CertificateState::Error {
                    issued_at,
                    expires_at,
                }
            }
        }
    }

    /// State once `now` is considered
    pub fn at(self, now: DateTime<Utc>) -> Self {
        match self {
            CertificateState::Active {
                issued_at,
                expires_at,
            } if expires_at <= now => CertificateState::Expired {
                issued_at: Some(issued_at),
                expires_at: Some(expires_at),
            },
            other => other,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, CertificateState::Active { .. })
    }

    pub fn status(&self) -> CertificateStatus {
        match self {
            CertificateState::Pending => CertificateStatus::Pending,
            CertificateState::Active { .. } => CertificateStatus::Active,
            CertificateState::Expired { .. } => CertificateStatus::Expired,
            CertificateState::Revoked => CertificateStatus::Revoked,
            CertificateState::Error { .. } => CertificateStatus::Error,
        }
    }

    fn validity(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match *self {
            CertificateState::Pending | CertificateState::Revoked => (None, None),
            CertificateState::Active {
                issued_at,
                expires_at,
            } => (Some(issued_at), Some(expires_at)),
            CertificateState::Expired {
                issued_at,
                expires_at,
            }
            | CertificateState::Error {
                issued_at,
                expires_at,
            } => (issued_at, expires_at),
        }
    }
}

/// Project a certificate state onto its row
pub fn write_certificate_state(model: &mut certificate::ActiveModel, state: CertificateState) {
    let (issued_at, expires_at) = state.validity();
    model.status = Set(state.status());
    model.issued_at = Set(issued_at);
    model.expires_at = Set(expires_at);
}
