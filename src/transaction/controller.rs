//! Retry/redirect state machine.
//!
//! # Responsibilities
//! - Encode and compress the request once per send
//! - Run attempts: connect, transmit, classify status, decode
//! - Close each attempt's connection before the next one starts
//! - Follow 307/308 redirects by rewriting the target host and path
//! - Retry transient failures within the attempt budget
//! - Fold the encryption state observed by every connected attempt
//!
//! # Counter Semantics
//! ```text
//! attempt  = 0, redirect = 0
//! while attempt < max_retries:
//!     transient failure  → attempt += 1
//!     accepted redirect  → redirect += 1, attempt = 0
//!     redirect >= max_redirects on a redirect status → TooManyRedirects
//! loop exit → RetriesExhausted
//! ```
//! The redirect counter is never reset within a transaction, so a redirect
//! chain cannot be stretched by interleaving failures.

use std::time::Instant;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{
    validate_config, validate_transaction, ConfigError, CourierConfig, TransactionConfig, ValidationError,
};
use crate::net::connection::Exchange;
use crate::net::connector::{Connect, ConnectionEstablisher, Established};
use crate::net::error::{ConnectError, TransportError};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::transaction::codec::{encode_compressed, Codec};
use crate::transaction::encryption::EncryptionState;
use crate::transaction::endpoint::Endpoint;
use crate::transaction::error::TransactionError;
use crate::transaction::status::{classify, StatusClass};

/// Counters describing how a transaction went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TransactionStats {
    /// Connection attempts made, across all targets.
    pub connections: u32,
    /// Redirect hops accepted.
    pub redirects: u32,
    /// 0-based attempt index of the last attempt on the final target.
    pub final_attempt: u32,
}

/// A decoded response plus how it was obtained.
#[derive(Debug, Clone)]
pub struct Delivery<O> {
    pub response: O,
    pub endpoint: Endpoint,
    pub encryption: EncryptionState,
    pub stats: TransactionStats,
}

/// Sends requests of one codec's type to an endpoint.
///
/// The controller is immutable; each `send` runs its own [`Transaction`], so
/// one controller can serve concurrent callers.
pub struct TransactionController<C, K = ConnectionEstablisher> {
    endpoint: Endpoint,
    config: TransactionConfig,
    codec: C,
    connector: K,
}

impl<C: Codec> TransactionController<C, ConnectionEstablisher> {
    /// Build a controller with the real connector from a loaded config.
    pub fn from_config(config: &CourierConfig, codec: C) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let endpoint = Endpoint::new(&config.endpoint.host, &config.endpoint.path)
            .map_err(|e| ConfigError::Validation(vec![ValidationError::Endpoint(e.to_string())]))?;
        let connector = ConnectionEstablisher::from_config(config)
            .map_err(|e| ConfigError::Validation(vec![e]))?;

        Self::new(endpoint, config.transaction, codec, connector)
    }
}

impl<C, K> TransactionController<C, K>
where
    C: Codec,
    K: Connect,
{
    /// Rejects a config with no attempt budget or a zero timeout.
    pub fn new(endpoint: Endpoint, config: TransactionConfig, codec: C, connector: K) -> Result<Self, ConfigError> {
        validate_transaction(&config).map_err(ConfigError::Validation)?;

        Ok(Self {
            endpoint,
            config,
            codec,
            connector,
        })
    }

    /// Initial target of every transaction.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    pub fn connector(&self) -> &K {
        &self.connector
    }

    /// Start a fresh transaction against the initial endpoint.
    pub fn transaction(&self) -> Transaction<'_, C, K> {
        Transaction {
            controller: self,
            id: Uuid::new_v4(),
            endpoint: self.endpoint.clone(),
            encryption: EncryptionState::Unknown,
            stats: TransactionStats::default(),
        }
    }

    /// Send `request` and return the decoded response with its diagnostics.
    pub async fn send(&self, request: &C::Request) -> Result<Delivery<C::Response>, TransactionError> {
        let mut transaction = self.transaction();
        let response = transaction.send(request).await?;

        Ok(Delivery {
            response,
            endpoint: transaction.endpoint,
            encryption: transaction.encryption,
            stats: transaction.stats,
        })
    }
}

/// State of one logical request/response exchange.
pub struct Transaction<'a, C, K> {
    controller: &'a TransactionController<C, K>,
    id: Uuid,
    endpoint: Endpoint,
    encryption: EncryptionState,
    stats: TransactionStats,
}

enum Outcome<O> {
    Success(O),
    Redirect(Option<String>),
}

enum AttemptError {
    Transient(TransportError),
    Fatal(TransactionError),
}

impl From<TransportError> for AttemptError {
    fn from(e: TransportError) -> Self {
        AttemptError::Transient(e)
    }
}

impl From<ConnectError> for AttemptError {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::Transport(e) => AttemptError::Transient(e),
            ConnectError::Security(e) => AttemptError::Fatal(TransactionError::Security(e)),
        }
    }
}

impl<'a, C, K> Transaction<'a, C, K>
where
    C: Codec,
    K: Connect,
{
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current target; after `send` returns, the last one used.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Weakest security of any connected attempt, `Unknown` if none connected.
    pub fn encryption_state(&self) -> EncryptionState {
        self.encryption
    }

    pub fn stats(&self) -> TransactionStats {
        self.stats
    }

    /// Run the transaction to a terminal state.
    pub async fn send(&mut self, request: &C::Request) -> Result<C::Response, TransactionError> {
        let started = Instant::now();
        let result = self.run(request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_transaction(outcome, self.encryption, started.elapsed());

        match &result {
            Ok(_) => tracing::info!(
                transaction_id = %self.id,
                endpoint = %self.endpoint,
                encryption = %self.encryption,
                connections = self.stats.connections,
                redirects = self.stats.redirects,
                "Transaction completed"
            ),
            Err(e) => tracing::info!(
                transaction_id = %self.id,
                endpoint = %self.endpoint,
                encryption = %self.encryption,
                connections = self.stats.connections,
                error = %e,
                "Transaction failed"
            ),
        }

        result
    }

    async fn run(&mut self, request: &C::Request) -> Result<C::Response, TransactionError> {
        let config = self.controller.config;
        let body = encode_compressed(&self.controller.codec, request).map_err(TransactionError::Encode)?;

        let mut attempt: u32 = 0;
        let mut redirect: u32 = 0;
        let mut last_error = None;

        while attempt < config.max_retries {
            self.stats.connections += 1;
            self.stats.final_attempt = attempt;

            tracing::debug!(
                transaction_id = %self.id,
                endpoint = %self.endpoint,
                attempt,
                redirect,
                "Starting attempt"
            );

            match self.attempt(body.clone()).await {
                Ok(Outcome::Success(response)) => {
                    metrics::record_attempt("success");
                    return Ok(response);
                }
                Ok(Outcome::Redirect(location)) => {
                    metrics::record_attempt("redirect");

                    if redirect >= config.max_redirects {
                        return Err(TransactionError::TooManyRedirects {
                            limit: config.max_redirects,
                        });
                    }
                    let location = location
                        .ok_or_else(|| TransactionError::InvalidRedirect("missing Location header".to_string()))?;
                    let next = Endpoint::from_location(&location)
                        .map_err(|e| TransactionError::InvalidRedirect(e.to_string()))?;

                    redirect += 1;
                    self.stats.redirects = redirect;
                    metrics::record_redirect();

                    tracing::info!(
                        transaction_id = %self.id,
                        from = %self.endpoint,
                        to = %next,
                        redirect,
                        "Following redirect"
                    );

                    self.endpoint = next;
                    attempt = 0;
                    last_error = None;
                }
                Err(AttemptError::Fatal(e)) => {
                    metrics::record_attempt("fatal");
                    return Err(e);
                }
                Err(AttemptError::Transient(e)) => {
                    metrics::record_attempt(if e.is_timeout() { "timeout" } else { "transient" });
                    tracing::warn!(
                        transaction_id = %self.id,
                        endpoint = %self.endpoint,
                        attempt,
                        kind = e.kind(),
                        error = %e,
                        "Attempt failed"
                    );

                    attempt += 1;
                    last_error = Some(e);

                    if attempt < config.max_retries {
                        let delay = calculate_backoff(
                            attempt,
                            config.retry_backoff_base_ms,
                            config.retry_backoff_max_ms,
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }

        Err(TransactionError::RetriesExhausted {
            attempts: attempt,
            last: last_error,
        })
    }

    /// One connect/send/receive cycle. The connection is closed before returning.
    async fn attempt(&mut self, body: Bytes) -> Result<Outcome<C::Response>, AttemptError> {
        let Established {
            mut connection,
            encryption,
        } = self.controller.connector.connect(&self.endpoint).await?;

        self.encryption = self.encryption.weakest(encryption);

        let result = self.exchange(&mut connection, encryption, body).await;
        connection.close().await;
        result
    }

    async fn exchange(
        &self,
        connection: &mut K::Connection,
        encryption: EncryptionState,
        body: Bytes,
    ) -> Result<Outcome<C::Response>, AttemptError> {
        let head = connection.send(&self.endpoint, body).await?;
        tracing::debug!(
            transaction_id = %self.id,
            status = head.status,
            encryption = %encryption,
            "Status received"
        );

        match classify(head.status) {
            StatusClass::Success => {
                let payload = connection.read_body().await?;
                let mut reader: &[u8] = &payload;
                // Never resent: the server has already accepted the request.
                let response = self.controller.codec.decode(&mut reader).map_err(|source| {
                    AttemptError::Fatal(TransactionError::Decode {
                        code: head.status,
                        source,
                    })
                })?;
                Ok(Outcome::Success(response))
            }
            StatusClass::Redirect => Ok(Outcome::Redirect(head.location)),
            StatusClass::Fatal(reason) => Err(AttemptError::Fatal(TransactionError::Status {
                code: head.status,
                reason,
            })),
        }
    }
}
