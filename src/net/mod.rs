//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Endpoint (host + path)
//!     → connector.rs (TCP, TLS with platform trust)
//!         ↳ untrusted chain → tls.rs bundled roots → TLS again
//!     → connection.rs (HTTP/1.1 POST, response head, body)
//!     → Hand back to the transaction controller
//!
//! Trust paths:
//!     platform store → EncryptionState::Ok
//!     bundled roots  → EncryptionState::NoRootCertificate
//!     plaintext      → EncryptionState::NotSupported
//! ```
//!
//! # Design Decisions
//! - One connection per attempt, closed when the attempt ends
//! - Every failure is classified here as transient or security
//! - Trust stores are immutable and shared between concurrent transactions

pub mod connection;
pub mod connector;
pub mod error;
pub mod tls;

pub use connection::{Exchange, HttpConnection, ResponseHead};
pub use connector::{Connect, ConnectionEstablisher, Established};
pub use error::{ConnectError, SecurityError, TransportError};
pub use tls::{RootSource, TrustBundle, TrustConfig, TrustStoreBuilder, TrustStoreError};
