//! Resilient POST request/response transaction engine.

pub mod config;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod transaction;

pub use config::CourierConfig;
pub use net::{ConnectionEstablisher, TrustStoreBuilder};
pub use transaction::{
    Codec, Delivery, EncryptionState, Endpoint, JsonCodec, TransactionController, TransactionError,
};
