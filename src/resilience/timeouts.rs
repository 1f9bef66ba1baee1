//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap connect and read phases of an attempt with the configured deadline
//! - Translate an elapsed deadline into a retryable transport error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors so they can be logged as such

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::net::error::TransportError;

/// Run `fut` under `deadline`, reporting expiry as a `Timeout` for `phase`.
pub async fn with_deadline<T, E, F>(
    phase: &'static str,
    deadline: Duration,
    fut: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<TransportError>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(E::from(TransportError::Timeout {
            phase,
            millis: deadline.as_millis() as u64,
        })),
    }
}
