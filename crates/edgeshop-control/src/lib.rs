//! Domain provisioning control plane
//!
//! - [`DomainOrchestrator`]: registers storefront domains, creates their
//!   provider zones, verifies DNS and activates edge certificates
//! - [`BatchSslEngine`]: runs SSL activation for many domains as a tracked job
//! - [`RenewalScheduler`]: renews certificates that are about to expire

pub mod batch;
pub mod error;
pub mod hostname;
pub mod job_store;
pub mod lifecycle;
pub mod orchestrator;
pub mod scheduler;

pub use batch::{BatchConfig, BatchError, BatchSslEngine, IneligibleDomain};
pub use error::OrchestratorError;
pub use hostname::{normalize_hostname, normalize_label, HostnameError};
pub use job_store::{
    BatchJob, DomainResult, InMemoryJobStore, JobStatus, JobStore, JobStoreError,
};
pub use lifecycle::{CertificateState, DomainEvent, DomainState, TransitionError};
pub use orchestrator::{
    DomainDetails, DomainOrchestrator, OrchestratorConfig, SslOutcome, VerifyOutcome,
};
pub use scheduler::{
    RenewalScheduler, RunSummary, SchedulerConfig, SchedulerError, SchedulerStatus,
};
