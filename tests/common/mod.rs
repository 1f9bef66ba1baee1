//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::read::GzDecoder;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, KeyPair,
    KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;

use courier::config::TransactionConfig;
use courier::net::{ConnectionEstablisher, RootSource, TrustBundle, TrustConfig, TrustStoreBuilder};

/// What the mock endpoint does with the next request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
    },
    /// Read the request and never answer.
    Stall,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Reply::Respond {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    pub fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Reply::Respond {
            status,
            headers: vec![("Location".to_string(), location.to_string())],
            body: String::new(),
        }
    }
}

/// A request as the mock endpoint saw it, body already gunzipped.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// How long an accept waits for the previous connection to reach EOF.
const RELEASE_GRACE: Duration = Duration::from_millis(200);

/// Upper bound on how long a served connection is held open.
const HOLD_LIMIT: Duration = Duration::from_secs(30);

/// A scripted HTTP/1.1 endpoint on 127.0.0.1, plaintext or TLS.
pub struct MockEndpoint {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    connections: Arc<AtomicUsize>,
    released: Arc<Mutex<Vec<bool>>>,
}

impl MockEndpoint {
    pub async fn start(script: Vec<Reply>) -> Self {
        Self::spawn(script, None).await
    }

    pub async fn start_tls(script: Vec<Reply>, acceptor: TlsAcceptor) -> Self {
        Self::spawn(script, Some(acceptor)).await
    }

    async fn spawn(script: Vec<Reply>, acceptor: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(Mutex::new(Vec::new()));

        let (s, r, c, rel) = (script.clone(), requests.clone(), connections.clone(), released.clone());
        tokio::spawn(async move {
            let mut previous: Option<watch::Receiver<bool>> = None;
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                c.fetch_add(1, Ordering::SeqCst);

                if let Some(mut closed) = previous.take() {
                    let eof = tokio::time::timeout(RELEASE_GRACE, closed.wait_for(|done| *done)).await;
                    rel.lock().unwrap().push(matches!(eof, Ok(Ok(_))));
                }

                let (closed_tx, closed_rx) = watch::channel(false);
                previous = Some(closed_rx);

                let (script, requests, acceptor) = (s.clone(), r.clone(), acceptor.clone());
                tokio::spawn(async move {
                    match acceptor {
                        Some(acceptor) => {
                            // A client that rejects the certificate aborts here.
                            if let Ok(stream) = acceptor.accept(socket).await {
                                serve(stream, script, requests).await;
                            }
                        }
                        None => serve(socket, script, requests).await,
                    }
                    let _ = closed_tx.send(true);
                });
            }
        });

        Self {
            addr,
            requests,
            connections,
            released,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// TCP connections accepted so far, including failed TLS handshakes.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// For every connection after the first: whether the client had closed
    /// the previous one by the time it was accepted.
    pub fn released_before_next_accept(&self) -> Vec<bool> {
        self.released.lock().unwrap().clone()
    }
}

async fn serve<S>(mut stream: S, script: Arc<Mutex<VecDeque<Reply>>>, requests: Arc<Mutex<Vec<CapturedRequest>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let Some(request) = read_request(&mut stream).await else {
        return;
    };
    requests.lock().unwrap().push(request);

    let reply = script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Reply::status(500));

    match reply {
        Reply::Stall => {}
        Reply::Respond {
            status,
            headers,
            body,
        } => {
            let mut response = format!(
                "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                status,
                reason(status),
                body.len()
            );
            for (name, value) in headers {
                response.push_str(&format!("{name}: {value}\r\n"));
            }
            response.push_str("\r\n");
            response.push_str(&body);

            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.flush().await;
            let _ = stream.shutdown().await;
        }
    }

    // Hold the connection until the client closes it.
    let mut sink = [0u8; 1024];
    let _ = tokio::time::timeout(HOLD_LIMIT, async {
        while let Ok(n) = stream.read(&mut sink).await {
            if n == 0 {
                break;
            }
        }
    })
    .await;
}

async fn read_request<S: AsyncRead + Unpin>(stream: &mut S) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let raw = &buf[header_end..header_end + length];
    let mut body = String::new();
    if headers.get("content-encoding").map(String::as_str) == Some("gzip") {
        GzDecoder::new(raw).read_to_string(&mut body).ok()?;
    } else {
        body = String::from_utf8_lossy(raw).to_string();
    }

    Some(CapturedRequest {
        method,
        path,
        headers,
        body,
    })
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

/// A throwaway CA and a server certificate it issued.
pub struct TestPki {
    pub ca_pem: String,
    pub acceptor: TlsAcceptor,
}

impl TestPki {
    pub fn new(hosts: &[&str]) -> Self {
        let ca_key = KeyPair::generate().unwrap();
        let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "courier test root");
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let leaf_key = KeyPair::generate().unwrap();
        let names: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
        let mut leaf_params = CertificateParams::new(names).unwrap();
        leaf_params
            .distinguished_name
            .push(DnType::CommonName, hosts[0]);
        leaf_params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let leaf_cert = leaf_params.signed_by(&leaf_key, &ca_cert, &ca_key).unwrap();

        let chain: Vec<CertificateDer<'static>> = vec![leaf_cert.der().clone()];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der()));

        let server = rustls::ServerConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(chain, key)
        .unwrap();

        Self {
            ca_pem: ca_cert.pem(),
            acceptor: TlsAcceptor::from(Arc::new(server)),
        }
    }

    /// In-memory root source holding this CA as `test_root.pem`.
    pub fn root_source(&self) -> RootSource {
        RootSource::Memory(HashMap::from([(
            "test_root.pem".to_string(),
            self.ca_pem.clone().into_bytes(),
        )]))
    }

    /// A trust config that trusts only this CA.
    pub fn trust(&self) -> TrustConfig {
        TrustStoreBuilder::new(self.root_source())
            .build(&["test_root.pem"])
            .unwrap()
    }

    /// A fallback bundle holding only this CA.
    pub fn bundle(&self) -> Arc<TrustBundle> {
        Arc::new(TrustBundle::new(
            self.root_source(),
            vec!["test_root.pem".to_string()],
        ))
    }
}

/// Transaction budget with a short deadline for tests.
pub fn fast_config(max_retries: u32, max_redirects: u32) -> TransactionConfig {
    TransactionConfig {
        max_retries,
        max_redirects,
        timeout_ms: 500,
        ..TransactionConfig::default()
    }
}

/// A connector that sends every listed host to `addr`.
pub fn establisher_for(addr: SocketAddr, hosts: &[&str], config: &TransactionConfig) -> ConnectionEstablisher {
    hosts
        .iter()
        .fold(ConnectionEstablisher::new(config.timeout()), |establisher, host| {
            establisher.with_resolve(host, addr)
        })
}
