//! Transport and security error types.

use thiserror::Error;

use crate::net::tls::TrustStoreError;

/// A failure that may succeed on another attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A connect or read deadline expired.
    #[error("{phase} timed out after {millis} ms")]
    Timeout { phase: &'static str, millis: u64 },

    /// Socket-level failure while connecting, sending or receiving.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP framing or connection failure.
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// TLS handshake failed on every trust path tried.
    #[error("TLS handshake with {host} failed: {source}")]
    Handshake {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// A request could not be assembled for this endpoint.
    #[error("failed to build request: {0}")]
    Request(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout { .. } => "timeout",
            TransportError::Io(_) => "io",
            TransportError::Http(_) => "http",
            TransportError::Handshake { .. } => "handshake",
            TransportError::Request(_) => "request",
        }
    }
}

/// Encrypted transport cannot be set up at all. Never retried.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// The crypto provider rejected the protocol configuration.
    #[error("TLS unavailable: {0}")]
    Unavailable(String),

    /// The bundled fallback trust store could not be built.
    #[error("fallback trust store unavailable: {0}")]
    TrustStore(#[from] TrustStoreError),

    /// The host cannot be used as a TLS server name.
    #[error("invalid TLS server name '{0}'")]
    InvalidServerName(String),
}

/// Result of a failed connection attempt.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Security(#[from] SecurityError),
}
