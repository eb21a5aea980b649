//! Database entities

pub mod certificate;
pub mod domain;
pub mod provider_zone;
pub mod renewal_log;

pub use certificate::Entity as Certificate;
pub use domain::Entity as Domain;
pub use provider_zone::Entity as ProviderZone;
pub use renewal_log::Entity as RenewalLog;

pub mod prelude {
    pub use super::certificate::Entity as Certificate;
    pub use super::domain::Entity as Domain;
    pub use super::provider_zone::Entity as ProviderZone;
    pub use super::renewal_log::Entity as RenewalLog;
}
