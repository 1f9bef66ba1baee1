//! A single HTTP/1.1 exchange over an established stream.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Drive the hyper client connection on a background task
//! - Send one POST with the fixed wire headers and read its response
//! - Release the stream on `close` or when the connection value is dropped

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1::{self, SendRequest};
use hyper::header;
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use crate::net::error::TransportError;
use crate::resilience::timeouts::with_deadline;
use crate::transaction::Endpoint;

/// Fixed User-Agent sent with every request.
pub const USER_AGENT: &str = concat!("courier/", env!("CARGO_PKG_VERSION"));

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Status and redirect target of a response, body not yet read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub location: Option<String>,
}

/// One request/response exchange on an open connection.
#[async_trait]
pub trait Exchange: Send {
    /// Transmit the already-compressed body and wait for the status line.
    async fn send(&mut self, endpoint: &Endpoint, body: Bytes) -> Result<ResponseHead, TransportError>;

    /// Read the full body of the response returned by `send`.
    async fn read_body(&mut self) -> Result<Bytes, TransportError>;

    /// Close the stream. Returns once the socket has been released.
    async fn close(&mut self);
}

/// Build the POST for `endpoint` with the fixed wire headers.
pub fn build_request(endpoint: &Endpoint, body: Bytes) -> Result<Request<Full<Bytes>>, TransportError> {
    Request::builder()
        .method(Method::POST)
        .uri(endpoint.path())
        .header(header::HOST, endpoint.host())
        .header(header::ACCEPT, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .header(header::USER_AGENT, USER_AGENT)
        .body(Full::new(body))
        .map_err(|e| TransportError::Request(e.to_string()))
}

/// An HTTP/1.1 client connection. Dropping it closes the stream.
pub struct HttpConnection {
    id: ConnectionId,
    sender: SendRequest<Full<Bytes>>,
    driver: JoinHandle<()>,
    response: Option<Incoming>,
    read_timeout: Duration,
}

impl HttpConnection {
    /// Perform the HTTP/1.1 handshake over an established stream.
    pub async fn handshake<T>(io: T, read_timeout: Duration) -> Result<Self, TransportError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let id = ConnectionId::new();
        let (sender, conn) = http1::handshake::<_, Full<Bytes>>(TokioIo::new(io)).await?;

        let driver = tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(connection_id = %id, error = %e, "Connection driver stopped");
            }
        });

        tracing::trace!(connection_id = %id, "Connection established");

        Ok(Self {
            id,
            sender,
            driver,
            response: None,
            read_timeout,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

#[async_trait]
impl Exchange for HttpConnection {
    async fn send(&mut self, endpoint: &Endpoint, body: Bytes) -> Result<ResponseHead, TransportError> {
        let request = build_request(endpoint, body)?;
        let deadline = self.read_timeout;
        let sender = &mut self.sender;

        let response = with_deadline("read", deadline, async move {
            sender.ready().await?;
            sender.send_request(request).await.map_err(TransportError::from)
        })
        .await?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        tracing::trace!(connection_id = %self.id, status, "Response received");

        self.response = Some(response.into_body());
        Ok(ResponseHead { status, location })
    }

    async fn read_body(&mut self) -> Result<Bytes, TransportError> {
        let body = self
            .response
            .take()
            .ok_or_else(|| TransportError::Request("no response to read".to_string()))?;

        let collected = with_deadline("read", self.read_timeout, async move {
            body.collect().await.map_err(TransportError::from)
        })
        .await?;

        Ok(collected.to_bytes())
    }

    async fn close(&mut self) {
        self.response = None;
        self.driver.abort();
        // The stream is owned by the driver task and dropped with it.
        let _ = (&mut self.driver).await;
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

impl Drop for HttpConnection {
    fn drop(&mut self) {
        self.driver.abort();
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}
