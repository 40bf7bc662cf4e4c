//! Errors surfaced by fleet operations.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::provider::ProviderError;
use crate::public_ip::PublicIpError;
use crate::readiness::ReadinessError;
use crate::user_data::UserDataError;

/// Errors raised while reconciling the fleet.
#[derive(Debug, Error)]
pub enum FleetError<ProviderErr>
where
    ProviderErr: std::error::Error + 'static,
{
    /// Raised when a provider call fails. Provider errors are never retried.
    #[error("provider request failed: {0}")]
    Provider(#[source] ProviderErr),
    /// Raised when the caller's public IP cannot be determined.
    #[error(transparent)]
    PublicIp(#[from] PublicIpError),
    /// Raised when the provider offers no location at all.
    #[error("provider offers no locations")]
    NoLocationAvailable,
    /// Raised when no non-ARM server type is priced at the chosen location.
    #[error("no eligible server type is priced at location {location}")]
    NoServerTypeAvailable {
        /// Location that was searched.
        location: String,
    },
    /// Raised when the configured image does not exist for an architecture.
    #[error("image '{name}' not found for architecture {architecture}")]
    ImageNotFound {
        /// Image name that was requested.
        name: String,
        /// Architecture of the chosen server type.
        architecture: String,
    },
    /// Raised when the provider holds no SSH key at all.
    #[error("no SSH key found")]
    NoSshKeyAvailable,
    /// Raised when the configured SSH key name does not exist.
    #[error("SSH key '{name}' not found")]
    SshKeyNotFound {
        /// Key name that was requested.
        name: String,
    },
    /// Raised when the image has no provisioning script.
    #[error(transparent)]
    UserData(#[from] UserDataError),
    /// Raised when a create request cannot be assembled.
    #[error("invalid server request: {0}")]
    Request(#[from] ProviderError),
    /// Raised when a created server comes back without a public IPv4.
    #[error("server {server} was created without a public IPv4 address")]
    MissingPublicIp {
        /// Provider identifier of the server.
        server: u64,
    },
    /// Raised when instances do not accept connections in time.
    #[error(transparent)]
    Readiness(#[from] ReadinessError),
    /// Raised when the requested range is empty.
    #[error("minimum of {min} proxies exceeds maximum of {max}")]
    InvalidRange {
        /// Requested minimum.
        min: usize,
        /// Requested maximum.
        max: usize,
    },
}

/// Error returned alongside the proxy addresses gathered before it occurred.
///
/// Fleet operations never roll back: instances created or kept before the
/// failure are real and their addresses are handed back to the caller.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct PartialFailure<ProviderErr>
where
    ProviderErr: std::error::Error + 'static,
{
    /// Addresses of instances that exist despite the failure.
    pub addresses: Vec<Ipv4Addr>,
    /// The first error encountered.
    #[source]
    pub source: FleetError<ProviderErr>,
}

impl<ProviderErr> PartialFailure<ProviderErr>
where
    ProviderErr: std::error::Error + 'static,
{
    /// Wraps `source` together with `addresses`.
    #[must_use]
    pub const fn new(addresses: Vec<Ipv4Addr>, source: FleetError<ProviderErr>) -> Self {
        Self { addresses, source }
    }

    /// Wraps `source` with no addresses.
    #[must_use]
    pub const fn empty(source: FleetError<ProviderErr>) -> Self {
        Self::new(Vec::new(), source)
    }

    /// Splits the failure into its addresses and error.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Ipv4Addr>, FleetError<ProviderErr>) {
        (self.addresses, self.source)
    }
}

/// Outcome of a fleet operation.
pub type FleetResult<ProviderErr> = Result<Vec<Ipv4Addr>, PartialFailure<ProviderErr>>;
