//! Transaction subsystem.
//!
//! # Data Flow
//! ```text
//! caller request (I)
//!     → codec.rs (encode + gzip, once)
//!     → controller.rs attempt loop
//!         → net::connector (connection + EncryptionState)
//!         → net::connection (POST, status line)
//!         → status.rs (Success | Redirect | Fatal)
//!             Redirect → endpoint.rs (next target) → loop
//!             Success  → codec.rs (decode) → response (O)
//!     → error.rs on any terminal failure
//! ```
//!
//! # Design Decisions
//! - Each transaction is strictly sequential and owns its own state
//! - Only transport failures are retried; every other failure is terminal
//! - The caller sees a decoded response or an error, never both

pub mod codec;
pub mod controller;
pub mod encryption;
pub mod endpoint;
pub mod error;
pub mod status;

pub use codec::{Codec, JsonCodec};
pub use controller::{Delivery, Transaction, TransactionController, TransactionStats};
pub use encryption::EncryptionState;
pub use endpoint::{Endpoint, EndpointError};
pub use error::TransactionError;
pub use status::{classify, FatalStatus, StatusClass};
