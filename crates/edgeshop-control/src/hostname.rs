//! Hostname validation for custom domains
//!
//! Tenants register an apex hostname: one label followed by a TLD, where the
//! TLD may be a two-part public suffix such as `co.uk`. Subdomain labels are
//! validated with the same label rules.

use thiserror::Error;

/// Maximum total hostname length (RFC 1035)
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single label
const MAX_LABEL_LEN: usize = 63;

/// Second-level labels that form a public suffix under a country code TLD
/// (`co.uk`, `com.au`, `org.br`, ...)
const COUNTRY_SECOND_LEVELS: &[&str] = &[
    "ac", "co", "com", "edu", "gob", "gov", "ltd", "me", "net", "ne", "nom", "or", "org", "plc",
    "sch",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostnameError {
    #[error("hostname cannot be empty")]
    Empty,

    #[error("hostname too long (max 253 characters): {0}")]
    TooLong(usize),

    #[error("hostname must be a domain name plus TLD (e.g. shop.example), got '{0}'")]
    WrongShape(String),

    #[error("invalid label '{label}': {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("invalid top-level domain '{0}'")]
    InvalidTld(String),
}

/// Validate and normalize an apex hostname
///
/// Lowercases, trims whitespace and a trailing root dot.
pub fn normalize_hostname(input: &str) -> Result<String, HostnameError> {
    let hostname = input.trim().trim_end_matches('.').to_ascii_lowercase();

    if hostname.is_empty() {
        return Err(HostnameError::Empty);
    }
    if hostname.len() > MAX_HOSTNAME_LEN {
        return Err(HostnameError::TooLong(hostname.len()));
    }

    let labels: Vec<&str> = hostname.split('.').collect();
    if !(2..=3).contains(&labels.len()) {
        return Err(HostnameError::WrongShape(hostname));
    }

    for label in &labels {
        validate_label(label)?;
    }

    // TLD is alphabetic (or an IDN A-label)
    let tld = labels[labels.len() - 1];
    let idn = tld.starts_with("xn--");
    if tld.len() < 2 || (!idn && !tld.chars().all(|c| c.is_ascii_alphabetic())) {
        return Err(HostnameError::InvalidTld(tld.to_string()));
    }

    // Three labels only under a country public suffix (shop.co.uk), never a subdomain
    if labels.len() == 3 && (tld.len() != 2 || !COUNTRY_SECOND_LEVELS.contains(&labels[1])) {
        return Err(HostnameError::WrongShape(hostname));
    }

    Ok(hostname)
}

/// Validate and normalize a subdomain label such as `checkout`
pub fn normalize_label(input: &str) -> Result<String, HostnameError> {
    let label = input.trim().to_ascii_lowercase();
    validate_label(&label)?;
    Ok(label)
}

fn validate_label(label: &str) -> Result<(), HostnameError> {
    let invalid = |reason: &str| HostnameError::InvalidLabel {
        label: label.to_string(),
        reason: reason.to_string(),
    };

    if label.is_empty() {
        return Err(invalid("label cannot be empty"));
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(invalid("label too long (max 63 characters)"));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(invalid("label cannot start or end with hyphen"));
    }
    if let Some(ch) = label
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-')
    {
        return Err(invalid(&format!(
            "invalid character '{}' (only letters, digits and hyphens allowed)",
            ch
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_hostnames() {
        assert_eq!(normalize_hostname("shop.example").unwrap(), "shop.example");
        assert_eq!(normalize_hostname(" Shop.Example. ").unwrap(), "shop.example");
        assert_eq!(normalize_hostname("my-shop.co.uk").unwrap(), "my-shop.co.uk");
        assert_eq!(normalize_hostname("boutique.xn--p1ai").unwrap(), "boutique.xn--p1ai");
        assert_eq!(normalize_hostname("123shop.com").unwrap(), "123shop.com");
        assert_eq!(normalize_hostname("laden.com.au").unwrap(), "laden.com.au");
        assert_eq!(normalize_hostname("loja.org.br").unwrap(), "loja.org.br");
    }

    #[test]
    fn test_rejects_wrong_shape() {
        assert_eq!(normalize_hostname("").unwrap_err(), HostnameError::Empty);
        assert!(matches!(
            normalize_hostname("localhost").unwrap_err(),
            HostnameError::WrongShape(_)
        ));
        assert!(matches!(
            normalize_hostname("a.b.shop.example").unwrap_err(),
            HostnameError::WrongShape(_)
        ));
        assert!(matches!(
            normalize_hostname("checkout.shop.example").unwrap_err(),
            HostnameError::WrongShape(_)
        ));
    }

    #[test]
    fn test_rejects_subdomains_of_country_domains() {
        for host in ["www.abc.de", "api.dev.io", "shop.store.fr", "www.co.com"] {
            assert!(
                matches!(normalize_hostname(host), Err(HostnameError::WrongShape(_))),
                "{} should be rejected",
                host
            );
        }
    }

    #[test]
    fn test_rejects_bad_labels() {
        assert!(matches!(
            normalize_hostname("-shop.example").unwrap_err(),
            HostnameError::InvalidLabel { .. }
        ));
        assert!(matches!(
            normalize_hostname("sh_op.example").unwrap_err(),
            HostnameError::InvalidLabel { .. }
        ));
        assert!(matches!(
            normalize_hostname("shop..example").unwrap_err(),
            HostnameError::InvalidLabel { .. }
        ));
        assert!(matches!(
            normalize_hostname("https://shop.example").unwrap_err(),
            HostnameError::InvalidLabel { .. }
        ));
        let long = format!("{}.example", "a".repeat(64));
        assert!(matches!(
            normalize_hostname(&long).unwrap_err(),
            HostnameError::InvalidLabel { .. }
        ));
    }

    #[test]
    fn test_rejects_bad_tld() {
        assert!(matches!(
            normalize_hostname("shop.c").unwrap_err(),
            HostnameError::InvalidTld(_)
        ));
        assert!(matches!(
            normalize_hostname("shop.123").unwrap_err(),
            HostnameError::InvalidTld(_)
        ));
    }

    #[test]
    fn test_labels() {
        assert_eq!(normalize_label("Checkout").unwrap(), "checkout");
        assert!(normalize_label("").is_err());
        assert!(normalize_label("check.out").is_err());
    }
}
