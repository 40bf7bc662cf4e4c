//! Discovery of the caller's public IPv4 address.
//!
//! The address is allow-listed in every proxy's configuration so the fleet
//! only serves the machine that created it.

use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;

use thiserror::Error;

/// Default lookup service returning the caller's address as plain text.
pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org";

/// Errors raised while discovering the public IP.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PublicIpError {
    /// Raised when the lookup request fails.
    #[error("public IP lookup failed: {message}")]
    Request {
        /// Transport or status error message.
        message: String,
    },
    /// Raised when the service answers with something other than an IPv4
    /// address.
    #[error("public IP lookup returned '{body}', expected an IPv4 address")]
    Malformed {
        /// Trimmed response body.
        body: String,
    },
}

/// Future returned by public IP lookups.
pub type PublicIpFuture<'a> = Pin<Box<dyn Future<Output = Result<Ipv4Addr, PublicIpError>> + Send + 'a>>;

/// Resolves the caller's current public IPv4 address.
pub trait PublicIpLookup {
    /// Returns the address the outside world sees for this host.
    fn public_ipv4(&self) -> PublicIpFuture<'_>;
}

/// Lookup backed by an ipify-compatible plain text endpoint.
#[derive(Clone, Debug)]
pub struct IpifyLookup {
    client: reqwest::Client,
    url: String,
}

impl Default for IpifyLookup {
    fn default() -> Self {
        Self::new(DEFAULT_IP_LOOKUP_URL)
    }
}

impl IpifyLookup {
    /// Creates a lookup against `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl PublicIpLookup for IpifyLookup {
    fn public_ipv4(&self) -> PublicIpFuture<'_> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(|err| PublicIpError::Request {
                    message: err.to_string(),
                })?;
            let body = response
                .text()
                .await
                .map_err(|err| PublicIpError::Request {
                    message: err.to_string(),
                })?;
            let trimmed = body.trim();
            trimmed
                .parse::<Ipv4Addr>()
                .map_err(|_| PublicIpError::Malformed {
                    body: trimmed.to_owned(),
                })
        })
    }
}

/// Lookup that always answers with a fixed address.
///
/// Useful when the caller already knows its address or in tests.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StaticIp(pub Ipv4Addr);

impl PublicIpLookup for StaticIp {
    fn public_ipv4(&self) -> PublicIpFuture<'_> {
        let address = self.0;
        Box::pin(async move { Ok(address) })
    }
}
