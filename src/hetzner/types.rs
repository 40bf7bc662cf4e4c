//! Wire types for the Hetzner Cloud API and their conversion into the
//! provider model.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::HetznerError;
use crate::provider::{CreateServerRequest, Image, Location, LocationPrice, Server, ServerType, SshKey};

/// Hetzner bills every location in euro; price entries carry no currency.
pub(super) const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Deserialize)]
pub(super) struct ErrorEnvelope {
    pub(super) error: ErrorBody,
}

#[derive(Deserialize)]
pub(super) struct ErrorBody {
    pub(super) code: String,
    pub(super) message: String,
}

#[derive(Default, Deserialize)]
pub(super) struct Meta {
    #[serde(default)]
    pub(super) pagination: Option<Pagination>,
}

#[derive(Deserialize)]
pub(super) struct Pagination {
    #[serde(default)]
    pub(super) next_page: Option<u64>,
}

#[derive(Deserialize)]
pub(super) struct WireLocation {
    name: String,
    country: String,
}

impl From<WireLocation> for Location {
    fn from(value: WireLocation) -> Self {
        Self {
            name: value.name,
            country: value.country,
        }
    }
}

#[derive(Deserialize)]
struct WireDatacenter {
    location: WireLocation,
}

#[derive(Deserialize)]
struct WireIpv4 {
    ip: String,
}

#[derive(Default, Deserialize)]
struct WirePublicNet {
    #[serde(default)]
    ipv4: Option<WireIpv4>,
}

#[derive(Deserialize)]
struct WireServerTypeRef {
    name: String,
}

#[derive(Deserialize)]
pub(super) struct WireServer {
    id: u64,
    name: String,
    created: String,
    #[serde(default)]
    public_net: WirePublicNet,
    server_type: WireServerTypeRef,
    datacenter: WireDatacenter,
}

impl TryFrom<WireServer> for Server {
    type Error = HetznerError;

    fn try_from(value: WireServer) -> Result<Self, Self::Error> {
        let id = value.id;
        let public_ipv4 = value
            .public_net
            .ipv4
            .map(|ipv4| {
                ipv4.ip.parse::<Ipv4Addr>().map_err(|err| {
                    HetznerError::decode("servers", format!("server {id}: {err}"))
                })
            })
            .transpose()?;
        Ok(Self {
            id,
            name: value.name,
            public_ipv4,
            location: value.datacenter.location.into(),
            server_type: value.server_type.name,
            created: value.created,
        })
    }
}

#[derive(Deserialize)]
struct WireAmount {
    net: String,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Deserialize)]
struct WirePrice {
    location: String,
    price_hourly: WireAmount,
}

#[derive(Deserialize)]
pub(super) struct WireServerType {
    name: String,
    architecture: String,
    #[serde(default)]
    prices: Vec<WirePrice>,
}

impl From<WireServerType> for ServerType {
    fn from(value: WireServerType) -> Self {
        Self {
            name: value.name,
            architecture: value.architecture,
            prices: value
                .prices
                .into_iter()
                .map(|price| LocationPrice {
                    location: price.location,
                    currency: price
                        .price_hourly
                        .currency
                        .unwrap_or_else(|| DEFAULT_CURRENCY.to_owned()),
                    hourly_net: price.price_hourly.net,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct WireImage {
    id: u64,
    #[serde(default)]
    name: Option<String>,
    architecture: String,
}

impl WireImage {
    pub(super) fn into_image(self, requested_name: &str) -> Image {
        Image {
            id: self.id,
            name: self.name.unwrap_or_else(|| requested_name.to_owned()),
            architecture: self.architecture,
        }
    }
}

#[derive(Deserialize)]
pub(super) struct WireSshKey {
    id: u64,
    name: String,
    created: String,
}

impl From<WireSshKey> for SshKey {
    fn from(value: WireSshKey) -> Self {
        Self {
            id: value.id,
            name: value.name,
            created: value.created,
        }
    }
}

#[derive(Serialize)]
struct PublicNetRequest {
    enable_ipv4: bool,
    enable_ipv6: bool,
}

#[derive(Serialize)]
pub(super) struct CreateServerBody<'a> {
    name: &'a str,
    server_type: &'a str,
    image: &'a str,
    location: &'a str,
    labels: &'a BTreeMap<String, String>,
    ssh_keys: &'a [String],
    start_after_create: bool,
    user_data: &'a str,
    public_net: PublicNetRequest,
}

impl<'a> From<&'a CreateServerRequest> for CreateServerBody<'a> {
    fn from(request: &'a CreateServerRequest) -> Self {
        Self {
            name: &request.name,
            server_type: &request.server_type,
            image: &request.image,
            location: &request.location,
            labels: &request.labels,
            ssh_keys: &request.ssh_keys,
            start_after_create: true,
            user_data: &request.user_data,
            public_net: PublicNetRequest {
                enable_ipv4: true,
                enable_ipv6: false,
            },
        }
    }
}

#[derive(Deserialize)]
pub(super) struct CreateServerResponse {
    pub(super) server: WireServer,
}
