//! Connection establishment with trust fallback.
//!
//! # Responsibilities
//! - Open TCP to the endpoint host (or its configured override address)
//! - Negotiate TLS against the platform trust store first
//! - On an untrusted chain, reconnect once trusting only the bundled roots
//! - Report which trust path produced the connection
//!
//! # Design Decisions
//! - Only `UnknownIssuer` and `BadSignature` trigger the fallback; expired or
//!   mismatched certificates stay ordinary handshake failures
//! - The bundled trust config is built on first fallback and shared afterwards
//! - Plaintext is a deployment switch, never a fallback

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rustls::pki_types::ServerName;
use rustls::CertificateError;
use tokio::net::TcpStream;

use crate::config::{CourierConfig, TransportConfig, ValidationError};
use crate::net::connection::{Exchange, HttpConnection};
use crate::net::error::{ConnectError, SecurityError, TransportError};
use crate::net::tls::{platform_trust, RootSource, TrustBundle, TrustConfig};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;
use crate::transaction::{EncryptionState, Endpoint};

pub const TLS_PORT: u16 = 443;
pub const PLAINTEXT_PORT: u16 = 80;

/// An open connection and the security it was established with.
#[derive(Debug)]
pub struct Established<C> {
    pub connection: C,
    pub encryption: EncryptionState,
}

/// Opens one connection per attempt.
#[async_trait]
pub trait Connect: Send + Sync {
    type Connection: Exchange;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Established<Self::Connection>, ConnectError>;
}

/// Trust used for the first handshake.
#[derive(Debug, Clone)]
pub enum PrimaryTrust {
    /// The platform's default store.
    Platform,
    /// A caller-supplied store.
    Custom(TrustConfig),
}

/// TCP + optional TLS connector with platform-then-bundled trust.
#[derive(Debug, Clone)]
pub struct ConnectionEstablisher {
    timeout: Duration,
    legacy_plaintext: bool,
    resolve: HashMap<String, SocketAddr>,
    primary: PrimaryTrust,
    fallback: Arc<TrustBundle>,
}

impl ConnectionEstablisher {
    /// TLS with platform trust and the embedded bundle as fallback.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            legacy_plaintext: false,
            resolve: HashMap::new(),
            primary: PrimaryTrust::Platform,
            fallback: TrustBundle::bundled(),
        }
    }

    pub fn from_config(config: &CourierConfig) -> Result<Self, ValidationError> {
        let transport = &config.transport;
        let mut establisher = Self::new(config.transaction.timeout())
            .with_legacy_plaintext(transport.legacy_plaintext)
            .with_fallback_trust(fallback_bundle(transport));

        for (host, addr) in &transport.resolve {
            let parsed = addr.parse().map_err(|_| ValidationError::ResolveAddress {
                host: host.clone(),
                addr: addr.clone(),
            })?;
            establisher = establisher.with_resolve(host, parsed);
        }

        Ok(establisher)
    }

    pub fn with_legacy_plaintext(mut self, enabled: bool) -> Self {
        self.legacy_plaintext = enabled;
        self
    }

    /// Replace the platform store for the first handshake.
    pub fn with_primary_trust(mut self, trust: TrustConfig) -> Self {
        self.primary = PrimaryTrust::Custom(trust);
        self
    }

    pub fn with_fallback_trust(mut self, bundle: Arc<TrustBundle>) -> Self {
        self.fallback = bundle;
        self
    }

    /// Connect to `addr` whenever the endpoint host is `host`.
    pub fn with_resolve(mut self, host: &str, addr: SocketAddr) -> Self {
        self.resolve.insert(host.to_ascii_lowercase(), addr);
        self
    }

    pub fn is_plaintext(&self) -> bool {
        self.legacy_plaintext
    }

    async fn open_tcp(&self, endpoint: &Endpoint, port: u16) -> Result<TcpStream, TransportError> {
        let stream = match self.resolve.get(endpoint.host()) {
            Some(addr) => TcpStream::connect(*addr).await?,
            None => TcpStream::connect((endpoint.dial_host(), port)).await?,
        };
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    async fn connect_plaintext(&self, endpoint: &Endpoint) -> Result<HttpConnection, ConnectError> {
        let stream = with_deadline("connect", self.timeout, self.open_tcp(endpoint, PLAINTEXT_PORT)).await?;
        Ok(HttpConnection::handshake(stream, self.timeout).await?)
    }

    async fn connect_tls(&self, endpoint: &Endpoint, trust: &TrustConfig) -> Result<HttpConnection, ConnectError> {
        let server_name = ServerName::try_from(endpoint.dial_host().to_string())
            .map_err(|_| SecurityError::InvalidServerName(endpoint.host().to_string()))?;
        let connector = trust.connector();

        let stream = with_deadline("connect", self.timeout, async {
            let tcp = self.open_tcp(endpoint, TLS_PORT).await?;
            connector
                .connect(server_name, tcp)
                .await
                .map_err(|source| TransportError::Handshake {
                    host: endpoint.host().to_string(),
                    source,
                })
        })
        .await?;

        Ok(HttpConnection::handshake(stream, self.timeout).await?)
    }
}

#[async_trait]
impl Connect for ConnectionEstablisher {
    type Connection = HttpConnection;

    async fn connect(&self, endpoint: &Endpoint) -> Result<Established<HttpConnection>, ConnectError> {
        if self.legacy_plaintext {
            let connection = self.connect_plaintext(endpoint).await?;
            return Ok(Established {
                connection,
                encryption: EncryptionState::NotSupported,
            });
        }

        let primary = match &self.primary {
            PrimaryTrust::Platform => platform_trust()?,
            PrimaryTrust::Custom(trust) => trust.clone(),
        };

        match self.connect_tls(endpoint, &primary).await {
            Ok(connection) => Ok(Established {
                connection,
                encryption: EncryptionState::Ok,
            }),
            Err(ConnectError::Transport(TransportError::Handshake { ref source, .. }))
                if is_untrusted_chain(source) =>
            {
                tracing::warn!(
                    host = %endpoint.host(),
                    error = %source,
                    "Certificate chain not trusted by platform store, retrying with bundled roots"
                );
                metrics::record_trust_fallback();

                let fallback = self.fallback.trust_config().map_err(SecurityError::from)?;
                let connection = self.connect_tls(endpoint, fallback).await?;

                tracing::info!(host = %endpoint.host(), "Connected using bundled roots");
                Ok(Established {
                    connection,
                    encryption: EncryptionState::NoRootCertificate,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Fallback bundle described by the transport config.
pub fn fallback_bundle(transport: &TransportConfig) -> Arc<TrustBundle> {
    if transport.uses_default_bundle() {
        return TrustBundle::bundled();
    }

    let source = match &transport.roots_dir {
        Some(dir) => RootSource::Directory(dir.into()),
        None => RootSource::Embedded,
    };
    Arc::new(TrustBundle::new(source, transport.bundled_roots.clone()))
}

/// True when a handshake failed because no trusted root vouches for the chain.
pub fn is_untrusted_chain(error: &io::Error) -> bool {
    let tls_error = error
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>());

    matches!(
        tls_error,
        Some(rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer | CertificateError::BadSignature
        ))
    )
}
