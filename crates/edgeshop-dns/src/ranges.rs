//! CIDR range matching for edge anycast addresses
//!
//! Supports individual addresses (`"203.0.113.7"`) and CIDR blocks
//! (`"104.16.0.0/13"`), IPv4 and IPv6.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

/// Published Cloudflare IPv4 ranges used for proxied records
const CLOUDFLARE_IPV4_RANGES: &[&str] = &[
    "173.245.48.0/20",
    "103.21.244.0/22",
    "103.22.200.0/22",
    "103.31.4.0/22",
    "141.101.64.0/18",
    "108.162.192.0/18",
    "190.93.240.0/20",
    "188.114.96.0/20",
    "197.234.240.0/22",
    "198.41.128.0/17",
    "162.158.0.0/15",
    "104.16.0.0/13",
    "104.24.0.0/14",
    "172.64.0.0/13",
    "131.0.72.0/22",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpRangeError {
    #[error("invalid IP address: {0}")]
    InvalidIpAddress(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
}

/// One network block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IpNetwork {
    addr: IpAddr,
    prefix_len: u8,
}

impl IpNetwork {
    fn parse(s: &str) -> Result<Self, IpRangeError> {
        let s = s.trim();
        let (addr_str, prefix) = match s.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (s, None),
        };

        let addr =
            IpAddr::from_str(addr_str).map_err(|_| IpRangeError::InvalidIpAddress(s.to_string()))?;
        let max_prefix = if addr.is_ipv4() { 32 } else { 128 };

        let prefix_len = match prefix {
            Some(p) => p
                .parse::<u8>()
                .ok()
                .filter(|len| *len <= max_prefix)
                .ok_or_else(|| IpRangeError::InvalidCidr(s.to_string()))?,
            None => max_prefix,
        };

        Ok(Self { addr, prefix_len })
    }

    fn contains(&self, ip: &IpAddr) -> bool {
        if self.prefix_len == 0 {
            return self.addr.is_ipv4() == ip.is_ipv4();
        }
        match (self.addr, ip) {
            (IpAddr::V4(net), IpAddr::V4(candidate)) => {
                let mask = !0u32 << (32 - self.prefix_len);
                (u32::from(net) & mask) == (u32::from(*candidate) & mask)
            }
            (IpAddr::V6(net), IpAddr::V6(candidate)) => {
                let mask = !0u128 << (128 - self.prefix_len);
                (u128::from(net) & mask) == (u128::from(*candidate) & mask)
            }
            _ => false,
        }
    }
}

impl fmt::Display for IpNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

/// A set of address ranges
///
/// Unlike an allowlist, an empty set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpRangeSet {
    networks: Vec<IpNetwork>,
}

impl IpRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list of addresses or CIDR blocks
    pub fn parse<I, S>(entries: I) -> Result<Self, IpRangeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let networks = entries
            .into_iter()
            .map(|entry| IpNetwork::parse(entry.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    /// Cloudflare's published IPv4 anycast ranges
    pub fn cloudflare_default() -> Self {
        let networks = CLOUDFLARE_IPV4_RANGES
            .iter()
            .filter_map(|range| IpNetwork::parse(range).ok())
            .collect();
        Self { networks }
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.networks.iter().any(|network| network.contains(ip))
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    /// Ranges in CIDR notation
    pub fn to_strings(&self) -> Vec<String> {
        self.networks.iter().map(ToString::to_string).collect()
    }
}
