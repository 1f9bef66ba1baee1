//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Attempt against an endpoint:
//!     → timeouts.rs (deadline on connect phase, deadline on read phase)
//!     → On transient failure: controller counts the attempt
//!     → backoff.rs (optional jittered delay before the next attempt)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every network phase has a deadline
//! - A timeout is transient, never fatal
//! - Backoff is off by default; retries follow immediately

pub mod backoff;
pub mod timeouts;
