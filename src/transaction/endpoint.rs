//! Transaction target (host + path).

use std::fmt;

use thiserror::Error;
use url::Url;

/// Why a host/path pair or redirect location was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("host '{0}' is not a valid authority")]
    InvalidHost(String),

    #[error("path '{0}' must be absolute and carry no query or fragment")]
    InvalidPath(String),

    #[error("location '{0}' is not an absolute URL with a host")]
    InvalidLocation(String),
}

/// Target of a transaction.
///
/// Host never carries a scheme, port or credentials; those are decided by the
/// transport. Path always starts with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    path: String,
}

impl Endpoint {
    /// Validate and normalize a host/path pair.
    pub fn new(host: &str, path: &str) -> Result<Self, EndpointError> {
        if host.is_empty() || host.contains(['/', '@', '?', '#']) {
            return Err(EndpointError::InvalidHost(host.to_string()));
        }
        if !path.starts_with('/') || path.contains(['?', '#']) {
            return Err(EndpointError::InvalidPath(path.to_string()));
        }

        let url = Url::parse(&format!("https://{host}{path}"))
            .map_err(|_| EndpointError::InvalidHost(host.to_string()))?;

        // An explicit port (even 443) is rejected, the transport owns ports.
        let after_literal = host.rsplit(']').next().unwrap_or(host);
        if url.port().is_some() || after_literal.contains(':') {
            return Err(EndpointError::InvalidHost(host.to_string()));
        }

        let normalized = url
            .host_str()
            .ok_or_else(|| EndpointError::InvalidHost(host.to_string()))?;

        Ok(Self {
            host: normalized.to_string(),
            path: url.path().to_string(),
        })
    }

    /// Build the next target from a redirect `Location` value.
    ///
    /// Only the host and path are taken; scheme, port, query and credentials in
    /// the location are discarded.
    pub fn from_location(location: &str) -> Result<Self, EndpointError> {
        let invalid = || EndpointError::InvalidLocation(location.to_string());

        let url = Url::parse(location.trim()).map_err(|_| invalid())?;
        let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;

        let path = match url.path() {
            "" => "/",
            p if p.starts_with('/') => p,
            _ => return Err(invalid()),
        };

        Self::new(host, path).map_err(|_| invalid())
    }

    /// Authority as sent in the `Host` header. IPv6 literals keep their brackets.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Host to resolve and verify: the authority with IPv6 brackets removed.
    pub fn dial_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(&self.host)
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}
