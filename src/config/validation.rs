//! Configuration validation.
//!
//! Serde handles syntax; this module checks what serde cannot: a usable address
//! list and sane retry bounds. All problems are reported, not just the first.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::FailoverConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cluster.addresses must contain at least one address")]
    NoAddresses,

    #[error("cluster.addresses[{0}] is blank")]
    BlankAddress(usize),

    #[error("cluster.addresses[{index}] '{address}' is not a valid URL: {reason}")]
    InvalidAddress {
        index: usize,
        address: String,
        reason: String,
    },

    #[error("cluster.addresses contains '{0}' more than once")]
    DuplicateAddress(String),

    #[error("cluster.max_attempts must be at least 1")]
    ZeroMaxAttempts,

    #[error("cluster.failover_status_codes contains invalid HTTP status {0}")]
    InvalidStatusCode(u16),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FailoverConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let cluster = &config.cluster;

    if cluster.addresses.is_empty() {
        errors.push(ValidationError::NoAddresses);
    }

    let mut seen = HashSet::new();
    for (index, address) in cluster.addresses.iter().enumerate() {
        if address.trim().is_empty() {
            errors.push(ValidationError::BlankAddress(index));
            continue;
        }
        if let Err(e) = Url::parse(address) {
            errors.push(ValidationError::InvalidAddress {
                index,
                address: address.clone(),
                reason: e.to_string(),
            });
        }
        if !seen.insert(address.as_str()) && cluster.reject_duplicate_addresses {
            errors.push(ValidationError::DuplicateAddress(address.clone()));
        }
    }

    if cluster.max_attempts == Some(0) {
        errors.push(ValidationError::ZeroMaxAttempts);
    }

    for &code in &cluster.failover_status_codes {
        if !(100..=599).contains(&code) {
            errors.push(ValidationError::InvalidStatusCode(code));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
