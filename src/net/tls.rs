//! TLS trust configuration and certificate loading.
//!
//! # Responsibilities
//! - Build client configs that trust exactly a named set of bundled roots
//! - Resolve root certificate resources (embedded, directory, in-memory)
//! - Cache the platform trust store and the default bundle once per process
//!
//! # Design Decisions
//! - The fallback store never includes platform roots; it is a narrow trust domain
//! - Failed builds are not cached, the next fallback tries again
//! - The ring provider is selected explicitly so no process default is required

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use thiserror::Error;
use tokio_rustls::TlsConnector;

use crate::config::DEFAULT_BUNDLED_ROOTS;
use crate::net::error::SecurityError;

/// Root certificates compiled into the binary, by resource name.
const EMBEDDED_ROOTS: &[(&str, &[u8])] = &[
    ("isrg_root_x1.pem", include_bytes!("roots/isrg_root_x1.pem")),
    ("isrg_root_x2.pem", include_bytes!("roots/isrg_root_x2.pem")),
];

static PROVIDER: Lazy<Arc<CryptoProvider>> =
    Lazy::new(|| Arc::new(rustls::crypto::ring::default_provider()));

static PLATFORM_TRUST: OnceCell<TrustConfig> = OnceCell::new();

static DEFAULT_BUNDLE: Lazy<Arc<TrustBundle>> = Lazy::new(|| {
    Arc::new(TrustBundle::new(
        RootSource::Embedded,
        DEFAULT_BUNDLED_ROOTS.iter().map(|s| s.to_string()).collect(),
    ))
});

/// Errors building a trust store from bundled roots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrustStoreError {
    #[error("root certificate resource '{0}' not found")]
    ResourceMissing(String),

    #[error("root certificate '{name}' is invalid: {reason}")]
    CertificateInvalid { name: String, reason: String },

    #[error("TLS client configuration failed: {0}")]
    ProviderUnavailable(String),
}

/// Where named root certificate resources are looked up.
#[derive(Debug, Clone)]
pub enum RootSource {
    /// The PEM files compiled into the binary.
    Embedded,
    /// `<dir>/<name>` on disk.
    Directory(PathBuf),
    /// Caller-provided PEM bytes.
    Memory(HashMap<String, Vec<u8>>),
}

impl RootSource {
    /// Fetch the raw PEM bytes of a named resource.
    pub fn load(&self, name: &str) -> Result<Cow<'_, [u8]>, TrustStoreError> {
        let missing = || TrustStoreError::ResourceMissing(name.to_string());

        match self {
            RootSource::Embedded => EMBEDDED_ROOTS
                .iter()
                .find(|(n, _)| *n == name)
                .map(|(_, pem)| Cow::Borrowed(*pem))
                .ok_or_else(missing),
            RootSource::Directory(dir) => {
                if name.contains(['/', '\\']) || name == ".." {
                    return Err(missing());
                }
                std::fs::read(dir.join(name))
                    .map(Cow::Owned)
                    .map_err(|e| {
                        tracing::debug!(name, dir = ?dir, error = %e, "Root resource unreadable");
                        missing()
                    })
            }
            RootSource::Memory(map) => map
                .get(name)
                .map(|pem| Cow::Borrowed(pem.as_slice()))
                .ok_or_else(missing),
        }
    }
}

/// An immutable TLS client configuration plus how many anchors it trusts.
#[derive(Clone)]
pub struct TrustConfig {
    client: Arc<ClientConfig>,
    anchors: usize,
}

impl TrustConfig {
    /// Wrap a root store in a client config using the crate's crypto provider.
    pub fn from_store(store: RootCertStore) -> Result<Self, rustls::Error> {
        let anchors = store.len();
        let client = ClientConfig::builder_with_provider(PROVIDER.clone())
            .with_safe_default_protocol_versions()?
            .with_root_certificates(store)
            .with_no_client_auth();

        Ok(Self {
            client: Arc::new(client),
            anchors,
        })
    }

    /// Number of trust anchors.
    pub fn anchors(&self) -> usize {
        self.anchors
    }

    pub fn client_config(&self) -> Arc<ClientConfig> {
        Arc::clone(&self.client)
    }

    pub fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.client_config())
    }
}

impl fmt::Debug for TrustConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustConfig")
            .field("anchors", &self.anchors)
            .finish()
    }
}

/// Builds trust stores containing only the requested roots.
#[derive(Debug, Clone)]
pub struct TrustStoreBuilder {
    source: RootSource,
}

impl TrustStoreBuilder {
    pub fn new(source: RootSource) -> Self {
        Self { source }
    }

    /// Build a client config trusting exactly `names`, in order.
    pub fn build<S: AsRef<str>>(&self, names: &[S]) -> Result<TrustConfig, TrustStoreError> {
        let mut store = RootCertStore::empty();

        for name in names {
            let name = name.as_ref();
            let pem = self.source.load(name)?;
            let invalid = |reason: String| TrustStoreError::CertificateInvalid {
                name: name.to_string(),
                reason,
            };

            let mut reader: &[u8] = &pem;
            let certs = rustls_pemfile::certs(&mut reader)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| invalid(e.to_string()))?;
            if certs.is_empty() {
                return Err(invalid("no PEM certificate found".to_string()));
            }

            for cert in certs {
                store.add(cert).map_err(|e| invalid(e.to_string()))?;
            }
        }

        tracing::debug!(roots = names.len(), anchors = store.len(), "Built bundled trust store");

        TrustConfig::from_store(store)
            .map_err(|e| TrustStoreError::ProviderUnavailable(e.to_string()))
    }
}

/// A named root set whose trust config is built on first use and then cached.
pub struct TrustBundle {
    builder: TrustStoreBuilder,
    names: Vec<String>,
    config: OnceCell<TrustConfig>,
}

impl TrustBundle {
    pub fn new(source: RootSource, names: Vec<String>) -> Self {
        Self {
            builder: TrustStoreBuilder::new(source),
            names,
            config: OnceCell::new(),
        }
    }

    /// The process-wide bundle of embedded default roots.
    pub fn bundled() -> Arc<TrustBundle> {
        Arc::clone(&DEFAULT_BUNDLE)
    }

    /// Build on first call; later calls return the cached config.
    pub fn trust_config(&self) -> Result<&TrustConfig, TrustStoreError> {
        self.config
            .get_or_try_init(|| self.builder.build(self.names.as_slice()))
    }

    pub fn is_loaded(&self) -> bool {
        self.config.get().is_some()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl fmt::Debug for TrustBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrustBundle")
            .field("names", &self.names)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// The platform's default trust store, loaded once per process.
pub fn platform_trust() -> Result<TrustConfig, SecurityError> {
    PLATFORM_TRUST
        .get_or_try_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for error in &loaded.errors {
                tracing::warn!(error = %error, "Skipping unreadable platform certificate");
            }

            let mut store = RootCertStore::empty();
            let (added, ignored) = store.add_parsable_certificates(loaded.certs);
            tracing::debug!(added, ignored, "Loaded platform trust store");

            TrustConfig::from_store(store).map_err(|e| SecurityError::Unavailable(e.to_string()))
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(entries: &[(&str, &[u8])]) -> RootSource {
        RootSource::Memory(
            entries
                .iter()
                .map(|(name, pem)| (name.to_string(), pem.to_vec()))
                .collect(),
        )
    }

    #[test]
    fn test_embedded_bundle_builds() {
        let config = TrustStoreBuilder::new(RootSource::Embedded)
            .build(&DEFAULT_BUNDLED_ROOTS)
            .unwrap();
        assert_eq!(config.anchors(), 2);
    }

    #[test]
    fn test_trusts_only_requested_roots() {
        let config = TrustStoreBuilder::new(RootSource::Embedded)
            .build(&["isrg_root_x2.pem"])
            .unwrap();
        assert_eq!(config.anchors(), 1);
    }

    #[test]
    fn test_missing_resource() {
        let err = TrustStoreBuilder::new(RootSource::Embedded)
            .build(&["isrg_root_x1.pem", "identrust_root_x3.pem"])
            .unwrap_err();
        assert_eq!(
            err,
            TrustStoreError::ResourceMissing("identrust_root_x3.pem".into())
        );
    }

    #[test]
    fn test_invalid_certificates() {
        let source = memory(&[
            ("empty.pem", b""),
            ("garbage.pem", b"this is not a certificate"),
            (
                "bad-der.pem",
                b"-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n",
            ),
        ]);
        let builder = TrustStoreBuilder::new(source);

        for name in ["empty.pem", "garbage.pem", "bad-der.pem"] {
            match builder.build(&[name]) {
                Err(TrustStoreError::CertificateInvalid { name: n, .. }) => assert_eq!(n, name),
                other => panic!("{name}: unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("root.pem"),
            include_bytes!("roots/isrg_root_x1.pem"),
        )
        .unwrap();

        let builder = TrustStoreBuilder::new(RootSource::Directory(dir.path().to_path_buf()));
        assert_eq!(builder.build(&["root.pem"]).unwrap().anchors(), 1);
        assert_eq!(
            builder.build(&["other.pem"]).unwrap_err(),
            TrustStoreError::ResourceMissing("other.pem".into())
        );
        assert_eq!(
            builder.build(&["../root.pem"]).unwrap_err(),
            TrustStoreError::ResourceMissing("../root.pem".into())
        );
    }

    #[test]
    fn test_bundle_is_built_once() {
        let bundle = TrustBundle::new(RootSource::Embedded, vec!["isrg_root_x1.pem".into()]);
        assert!(!bundle.is_loaded());

        let first = bundle.trust_config().unwrap().client_config();
        let second = bundle.trust_config().unwrap().client_config();
        assert!(bundle.is_loaded());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_failed_bundle_is_not_cached() {
        let bundle = TrustBundle::new(memory(&[]), vec!["missing.pem".into()]);
        assert!(bundle.trust_config().is_err());
        assert!(!bundle.is_loaded());
    }

    #[test]
    fn test_default_bundle_is_shared() {
        let a = TrustBundle::bundled();
        let b = TrustBundle::bundled();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.names(), DEFAULT_BUNDLED_ROOTS);
    }

    #[test]
    fn test_concurrent_first_use() {
        let bundle = Arc::new(TrustBundle::new(
            RootSource::Embedded,
            vec!["isrg_root_x1.pem".into(), "isrg_root_x2.pem".into()],
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bundle = Arc::clone(&bundle);
                std::thread::spawn(move || bundle.trust_config().unwrap().client_config())
            })
            .collect();

        let configs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for config in &configs[1..] {
            assert!(Arc::ptr_eq(&configs[0], config));
        }
    }
}
