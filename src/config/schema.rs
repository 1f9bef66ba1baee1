//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sender.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root certificates shipped inside the binary and trusted by the fallback path.
pub const DEFAULT_BUNDLED_ROOTS: [&str; 2] = ["isrg_root_x1.pem", "isrg_root_x2.pem"];

/// Root configuration for the transaction engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CourierConfig {
    /// Initial target of every transaction.
    pub endpoint: EndpointConfig,

    /// Retry, redirect and timeout budget.
    pub transaction: TransactionConfig,

    /// Transport selection and trust configuration.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Initial endpoint (host + path).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Host name, without scheme or port (e.g., "api.example.com").
    pub host: String,

    /// Absolute path (e.g., "/v1/report").
    pub path: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            path: "/".to_string(),
        }
    }
}

/// Per-transaction budget. Immutable once a controller is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Maximum connection attempts per target (reset by every accepted redirect).
    pub max_retries: u32,

    /// Maximum redirect hops for the whole transaction.
    pub max_redirects: u32,

    /// Connect and read deadline for each attempt, in milliseconds.
    pub timeout_ms: u64,

    /// Base delay before retrying a transient failure. 0 retries immediately.
    pub retry_backoff_base_ms: u64,

    /// Upper bound for the retry delay.
    pub retry_backoff_max_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_redirects: 5,
            timeout_ms: 20_000,
            retry_backoff_base_ms: 0,
            retry_backoff_max_ms: 2_000,
        }
    }
}

impl TransactionConfig {
    /// Deadline applied to the connect phase and to the read phase of an attempt.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Transport selection and trust sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Use plaintext HTTP. Only for runtimes that cannot negotiate TLS.
    pub legacy_plaintext: bool,

    /// Names of the root certificates trusted when the platform store rejects a chain.
    pub bundled_roots: Vec<String>,

    /// Load bundled roots from this directory instead of the embedded set.
    pub roots_dir: Option<String>,

    /// Fixed socket addresses for hosts (e.g., "api.example.com" = "10.0.0.7:8443").
    pub resolve: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            legacy_plaintext: false,
            bundled_roots: DEFAULT_BUNDLED_ROOTS.iter().map(|s| s.to_string()).collect(),
            roots_dir: None,
            resolve: BTreeMap::new(),
        }
    }
}

impl TransportConfig {
    /// True when the bundled roots are the embedded default set.
    pub fn uses_default_bundle(&self) -> bool {
        self.roots_dir.is_none()
            && self.bundled_roots.len() == DEFAULT_BUNDLED_ROOTS.len()
            && self
                .bundled_roots
                .iter()
                .zip(DEFAULT_BUNDLED_ROOTS.iter())
                .all(|(a, b)| a == b)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Pretty output for terminals, JSON for log aggregation.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}
