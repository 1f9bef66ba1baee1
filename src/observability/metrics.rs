//! Metrics collection.
//!
//! # Responsibilities
//! - Define transaction engine metrics (attempts, redirects, fallbacks, outcomes)
//! - Record through the `metrics` facade; the embedding process installs a recorder
//!
//! # Metrics
//! - `courier_attempts_total` (counter): attempts by outcome
//! - `courier_redirects_total` (counter): accepted redirect hops
//! - `courier_trust_fallback_total` (counter): handshakes retried with bundled roots
//! - `courier_transactions_total` (counter): transactions by outcome, encryption
//! - `courier_transaction_duration_seconds` (histogram): end-to-end latency
//!
//! # Design Decisions
//! - Without a recorder every call is a no-op
//! - Label values are static strings, never hosts or paths

use std::time::Duration;

use metrics::{counter, histogram};

use crate::transaction::EncryptionState;

/// Record the outcome of one attempt ("success", "redirect", "timeout", "transient", "fatal").
pub fn record_attempt(outcome: &'static str) {
    counter!("courier_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_redirect() {
    counter!("courier_redirects_total").increment(1);
}

pub fn record_trust_fallback() {
    counter!("courier_trust_fallback_total").increment(1);
}

/// Record a finished transaction.
pub fn record_transaction(outcome: &'static str, encryption: EncryptionState, elapsed: Duration) {
    counter!(
        "courier_transactions_total",
        "outcome" => outcome,
        "encryption" => encryption.as_str()
    )
    .increment(1);
    histogram!("courier_transaction_duration_seconds").record(elapsed.as_secs_f64());
}
