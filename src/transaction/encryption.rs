//! Transport security posture of a transaction.

use std::fmt;

use serde::Serialize;

/// How transport security was established.
///
/// `NotSupported < NoRootCertificate < Ok` by strength. `Unknown` sits outside
/// that order: it is only the value before any attempt has connected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EncryptionState {
    /// Plaintext transport.
    NotSupported,
    /// TLS, but only trusted through the bundled roots.
    NoRootCertificate,
    /// TLS trusted by the platform store.
    Ok,
    /// No attempt has produced a connection yet.
    #[default]
    Unknown,
}

impl EncryptionState {
    /// Position in the strength order, `None` for `Unknown`.
    pub fn strength(self) -> Option<u8> {
        match self {
            EncryptionState::NotSupported => Some(0),
            EncryptionState::NoRootCertificate => Some(1),
            EncryptionState::Ok => Some(2),
            EncryptionState::Unknown => None,
        }
    }

    /// The weaker of two observations. `Unknown` never wins over a real state.
    pub fn weakest(self, other: EncryptionState) -> EncryptionState {
        match (self.strength(), other.strength()) {
            (None, _) => other,
            (_, None) => self,
            (Some(a), Some(b)) if b < a => other,
            _ => self,
        }
    }

    /// Fold a sequence of per-attempt observations, starting from `Unknown`.
    pub fn fold<I>(observations: I) -> EncryptionState
    where
        I: IntoIterator<Item = EncryptionState>,
    {
        observations
            .into_iter()
            .fold(EncryptionState::Unknown, EncryptionState::weakest)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EncryptionState::NotSupported => "NOT_SUPPORTED",
            EncryptionState::NoRootCertificate => "NO_ROOT_CERTIFICATE",
            EncryptionState::Ok => "OK",
            EncryptionState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EncryptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
