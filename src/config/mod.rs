//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → CourierConfig (validated, immutable)
//!     → TransactionConfig copied into each controller
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a controller never observes changes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CourierConfig, EndpointConfig, LogFormat, ObservabilityConfig, TransactionConfig,
    TransportConfig, DEFAULT_BUNDLED_ROOTS,
};
pub use validation::{validate_config, validate_transaction, ValidationError};
