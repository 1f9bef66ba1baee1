//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! net + transaction produce:
//!     → logging.rs (structured log events keyed by transaction_id)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stderr, pretty or JSON)
//!     → Whatever metrics recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Transaction ID flows through every event of a transaction
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
