//! DNS verification for custom storefront domains
//!
//! [`DnsVerifier`] checks that `{label}.{hostname}` resolves to the service's
//! edge, either through a CNAME to the canonical edge hostname or through A
//! records that land on our own IPs or the provider's anycast ranges.
//! Resolution is abstracted behind [`DnsLookup`] so callers can swap the
//! system resolver for a fixed table in tests.

pub mod lookup;
pub mod ranges;
pub mod verifier;

pub use lookup::{DnsLookup, HickoryLookup, LookupError, StaticLookup};
pub use ranges::{IpRangeError, IpRangeSet};
pub use verifier::{
    DnsVerifier, FailureCode, RecordKind, VerificationFailure, VerificationResult, VerifierConfig,
};
