//! Terminal transaction failures.

use thiserror::Error;

use crate::net::error::{SecurityError, TransportError};
use crate::transaction::status::FatalStatus;

/// Why a transaction ended without a response. Never retried by the caller's
/// controller: every variant is terminal.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("failed to encode request: {0}")]
    Encode(#[source] std::io::Error),

    /// The server accepted the request but its response could not be decoded.
    #[error("failed to decode {code} response: {source}")]
    Decode {
        code: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("more than {limit} redirects")]
    TooManyRedirects { limit: u32 },

    #[error("invalid redirect: {0}")]
    InvalidRedirect(String),

    #[error("server answered {code}: {reason}")]
    Status { code: u16, reason: FatalStatus },

    #[error("secure transport unavailable: {0}")]
    Security(#[from] SecurityError),

    #[error("gave up after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Option<TransportError>,
    },
}

impl TransactionError {
    pub fn is_security(&self) -> bool {
        matches!(self, TransactionError::Security(_))
    }

    /// The fatal status code, if the server produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransactionError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransactionError::Encode(_) => "encode",
            TransactionError::Decode { .. } => "decode",
            TransactionError::TooManyRedirects { .. } => "too_many_redirects",
            TransactionError::InvalidRedirect(_) => "invalid_redirect",
            TransactionError::Status { .. } => "status",
            TransactionError::Security(_) => "security",
            TransactionError::RetriesExhausted { .. } => "retries_exhausted",
        }
    }
}
