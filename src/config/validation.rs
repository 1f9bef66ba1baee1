//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (retries >= 1, timeout > 0, backoff bounds)
//! - Check the endpoint forms a valid authority/path pair
//! - Check resolve overrides are socket addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CourierConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{CourierConfig, TransactionConfig};
use crate::transaction::Endpoint;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("transaction.max_retries must be at least 1")]
    NoRetries,

    #[error("transaction.timeout_ms must be greater than 0")]
    ZeroTimeout,

    #[error("transaction.retry_backoff_max_ms ({max}) is below retry_backoff_base_ms ({base})")]
    BackoffBounds { base: u64, max: u64 },

    #[error("endpoint is invalid: {0}")]
    Endpoint(String),

    #[error("transport.bundled_roots must name at least one certificate")]
    NoBundledRoots,

    #[error("transport.resolve entry for '{host}' is not a socket address: '{addr}'")]
    ResolveAddress { host: String, addr: String },
}

fn check_transaction(tx: &TransactionConfig, errors: &mut Vec<ValidationError>) {
    if tx.max_retries == 0 {
        errors.push(ValidationError::NoRetries);
    }
    if tx.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if tx.retry_backoff_max_ms < tx.retry_backoff_base_ms {
        errors.push(ValidationError::BackoffBounds {
            base: tx.retry_backoff_base_ms,
            max: tx.retry_backoff_max_ms,
        });
    }
}

fn into_result(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Check the retry budget and timing of a single controller.
pub fn validate_transaction(config: &TransactionConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_transaction(config, &mut errors);
    into_result(errors)
}

/// Check every semantic constraint, collecting all failures.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_transaction(&config.transaction, &mut errors);

    if let Err(e) = Endpoint::new(&config.endpoint.host, &config.endpoint.path) {
        errors.push(ValidationError::Endpoint(e.to_string()));
    }

    if config.transport.bundled_roots.is_empty() {
        errors.push(ValidationError::NoBundledRoots);
    }

    for (host, addr) in &config.transport.resolve {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::ResolveAddress {
                host: host.clone(),
                addr: addr.clone(),
            });
        }
    }

    into_result(errors)
}
