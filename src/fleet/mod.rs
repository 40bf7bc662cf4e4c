//! Fleet reconciliation.
//!
//! [`Fleet`] keeps the number of proxy servers owned by one fleet tag within
//! a requested range. Ownership is re-derived from the provider on every
//! call through the `owner` label, so nothing is cached between calls apart
//! from the per-location usage counters that bias placement.
//!
//! Every operation is sequential: servers are created, deleted and gated
//! one at a time. The first failure stops the operation and is returned
//! together with the addresses of every server that exists at that point.
//! Nothing is retried and nothing is rolled back.

mod error;

use std::net::{Ipv4Addr, SocketAddr};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FleetConfig;
use crate::provider::{CreateServerRequest, Provider, Server, SshKey};
use crate::public_ip::PublicIpLookup;
use crate::readiness::{ReadinessError, ReadinessProbe};
use crate::registry::{OWNER_LABEL, list_owned};
use crate::selector::{LocationUsage, select_location, select_server_type};
use crate::user_data::{UserDataError, UserDataTemplates};

pub use error::{FleetError, FleetResult, PartialFailure};

const SERVER_NAME_PREFIX: &str = "proxy-";

/// Number of proxies an operation applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProxyCount {
    /// Every owned proxy.
    All,
    /// At most this many proxies, in provider order.
    Exactly(usize),
}

impl ProxyCount {
    /// Returns how many of `available` proxies the count covers.
    #[must_use]
    pub const fn limit(self, available: usize) -> usize {
        match self {
            Self::All => available,
            Self::Exactly(count) if count < available => count,
            Self::Exactly(_) => available,
        }
    }
}

/// Negative values select every proxy.
impl From<i64> for ProxyCount {
    fn from(value: i64) -> Self {
        usize::try_from(value).map_or(Self::All, Self::Exactly)
    }
}

/// Static settings applied to every server the fleet creates.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FleetSettings {
    /// Value of the ownership label.
    pub fleet_tag: String,
    /// Image name for new servers.
    pub image: String,
    /// SSH key to install; the newest key of the project when `None`.
    pub ssh_key: Option<String>,
    /// Port the proxy daemon listens on and readiness is probed on.
    pub proxy_port: u16,
    /// Provisioning scripts keyed by image name.
    pub templates: UserDataTemplates,
}

impl FleetSettings {
    /// Derives the settings from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UserDataError`] when the configured template file cannot be
    /// used.
    pub fn from_config(config: &FleetConfig) -> Result<Self, UserDataError> {
        let image = config.image.trim().to_owned();
        let templates = config.user_data_templates()?;
        if !templates.contains(&image) {
            warn!(%image, "no provisioning template for the configured image");
        }
        Ok(Self {
            fleet_tag: config.fleet_tag.trim().to_owned(),
            image,
            ssh_key: config.ssh_key_name().map(str::to_owned),
            proxy_port: config.proxy_port,
            templates,
        })
    }
}

/// Reconciles the proxy servers owned by one fleet tag.
#[derive(Debug)]
pub struct Fleet<P, L, R> {
    provider: P,
    ip_lookup: L,
    readiness: R,
    settings: FleetSettings,
    usage: LocationUsage,
}

impl<P, L, R> Fleet<P, L, R>
where
    P: Provider,
    L: PublicIpLookup,
    R: ReadinessProbe,
{
    /// Creates a fleet with empty location usage.
    #[must_use]
    pub fn new(provider: P, ip_lookup: L, readiness: R, settings: FleetSettings) -> Self {
        Self {
            provider,
            ip_lookup,
            readiness,
            settings,
            usage: LocationUsage::new(),
        }
    }

    /// Seeds the location usage counters.
    #[must_use]
    pub fn with_usage(mut self, usage: LocationUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Returns the current location usage counters.
    #[must_use]
    pub const fn usage(&self) -> &LocationUsage {
        &self.usage
    }

    /// Brings the number of owned proxies within `min..=max` and returns
    /// the addresses of every proxy once it accepts connections.
    ///
    /// Only owned servers with a public IPv4 address count towards the range.
    /// Missing proxies are created after the existing ones are gated. Excess
    /// proxies are deleted in provider order and the survivors are gated.
    ///
    /// # Errors
    ///
    /// Returns [`PartialFailure`] carrying the addresses of the proxies that
    /// exist when the first error occurred. `min > max` fails with
    /// [`FleetError::InvalidRange`] before any provider call.
    pub async fn ensure_proxies(&mut self, min: usize, max: usize) -> FleetResult<P::Error> {
        if min > max {
            return Err(PartialFailure::empty(FleetError::InvalidRange { min, max }));
        }

        let owned = self.owned().await.map_err(PartialFailure::empty)?;
        let mut servers = self.reachable(owned);
        let current = servers.len();
        debug!(current, min, max, "reconciling proxy fleet");

        if current < min {
            let mut addresses = self.addresses(&servers);
            if let Err(err) = self.gate(&addresses).await {
                return Err(PartialFailure::new(addresses, err.into()));
            }
            info!(current, missing = min - current, "spawning missing proxies");
            return match self.spawn_proxies(min - current).await {
                Ok(created) => {
                    addresses.extend(created);
                    Ok(addresses)
                }
                Err(failure) => {
                    let (created, source) = failure.into_parts();
                    addresses.extend(created);
                    Err(PartialFailure::new(addresses, source))
                }
            };
        }

        if current > max {
            let survivors = servers.split_off(current - max);
            let addresses = self.addresses(&survivors);
            info!(current, excess = current - max, "despawning excess proxies");
            if let Err(source) = self.delete_all(&servers).await {
                return Err(PartialFailure::new(addresses, source));
            }
            return self.gated(addresses).await;
        }

        let addresses = self.addresses(&servers);
        self.gated(addresses).await
    }

    /// Creates `count` new proxies one after another and returns their
    /// addresses once each accepts connections.
    ///
    /// # Errors
    ///
    /// Returns [`PartialFailure`] with the addresses of the proxies created
    /// before the failing step. Created proxies are never deleted again.
    pub async fn spawn_proxies(&mut self, count: usize) -> FleetResult<P::Error> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let allow_ip = self
            .ip_lookup
            .public_ipv4()
            .await
            .map_err(|err| PartialFailure::empty(err.into()))?;
        debug!(%allow_ip, count, "resolved caller address for proxy allow-list");

        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let address = match self.create_one(allow_ip).await {
                Ok(address) => address,
                Err(source) => return Err(PartialFailure::new(created, source)),
            };
            created.push(address);
            if let Err(err) = self.gate(&[address]).await {
                return Err(PartialFailure::new(created, err.into()));
            }
        }
        Ok(created)
    }

    /// Returns up to `count` owned proxies once they accept connections.
    /// Servers without a public IPv4 address are skipped. Never creates or
    /// deletes servers.
    ///
    /// # Errors
    ///
    /// Returns [`PartialFailure`] when listing or gating fails.
    pub async fn get_proxies(&mut self, count: ProxyCount) -> FleetResult<P::Error> {
        if count == ProxyCount::Exactly(0) {
            return Ok(Vec::new());
        }
        let owned = self.owned().await.map_err(PartialFailure::empty)?;
        let mut servers = self.reachable(owned);
        servers.truncate(count.limit(servers.len()));
        let addresses = self.addresses(&servers);
        self.gated(addresses).await
    }

    /// Deletes the first `count` owned proxies in provider order and returns
    /// the addresses of the proxies left running.
    ///
    /// # Errors
    ///
    /// Returns [`PartialFailure`] carrying the survivors when a delete call
    /// fails. Deletes issued before the failure stay in effect.
    pub async fn despawn_proxies(&mut self, count: ProxyCount) -> FleetResult<P::Error> {
        let mut servers = self.owned().await.map_err(PartialFailure::empty)?;
        if servers.is_empty() {
            debug!("no proxies to despawn");
            return Ok(Vec::new());
        }
        let survivors = servers.split_off(count.limit(servers.len()));
        let addresses = self.addresses(&survivors);
        match self.delete_all(&servers).await {
            Ok(()) => Ok(addresses),
            Err(source) => Err(PartialFailure::new(addresses, source)),
        }
    }

    async fn owned(&mut self) -> Result<Vec<Server>, FleetError<P::Error>> {
        list_owned(&self.provider, &self.settings.fleet_tag, &mut self.usage)
            .await
            .map_err(FleetError::Provider)
    }

    async fn create_one(&mut self, allow_ip: Ipv4Addr) -> Result<Ipv4Addr, FleetError<P::Error>> {
        let locations = self
            .provider
            .locations()
            .await
            .map_err(FleetError::Provider)?;
        let location =
            select_location(&locations, &self.usage).ok_or(FleetError::NoLocationAvailable)?;

        let server_types = self
            .provider
            .server_types()
            .await
            .map_err(FleetError::Provider)?;
        let priced = select_server_type(&server_types, location).ok_or_else(|| {
            FleetError::NoServerTypeAvailable {
                location: location.name.clone(),
            }
        })?;
        let server_type = priced.server_type;

        let image = self
            .provider
            .image(&self.settings.image, &server_type.architecture)
            .await
            .map_err(FleetError::Provider)?
            .ok_or_else(|| FleetError::ImageNotFound {
                name: self.settings.image.clone(),
                architecture: server_type.architecture.clone(),
            })?;
        let ssh_key = self.ssh_key().await?;
        let user_data = self.settings.templates.render(&image.name, allow_ip)?;

        let request = CreateServerRequest::builder()
            .name(format!("{SERVER_NAME_PREFIX}{}", Uuid::new_v4()))
            .server_type(&server_type.name)
            .image(image.id.to_string())
            .location(&location.name)
            .label(OWNER_LABEL, &self.settings.fleet_tag)
            .ssh_key(&ssh_key.name)
            .user_data(user_data)
            .build()?;

        info!(
            name = %request.name,
            location = %location.name,
            server_type = %server_type.name,
            ssh_key = %ssh_key.name,
            "creating proxy server"
        );
        let server = self
            .provider
            .create_server(&request)
            .await
            .map_err(FleetError::Provider)?;
        self.usage.increment(&location.name);

        let address = server
            .public_ipv4
            .ok_or(FleetError::MissingPublicIp { server: server.id })?;
        info!(id = server.id, %address, "created proxy server");
        Ok(address)
    }

    async fn ssh_key(&self) -> Result<SshKey, FleetError<P::Error>> {
        if let Some(name) = self.settings.ssh_key.as_deref() {
            return self
                .provider
                .ssh_key(name)
                .await
                .map_err(FleetError::Provider)?
                .ok_or_else(|| FleetError::SshKeyNotFound {
                    name: name.to_owned(),
                });
        }
        let keys = self
            .provider
            .ssh_keys()
            .await
            .map_err(FleetError::Provider)?;
        newest_key(keys).ok_or(FleetError::NoSshKeyAvailable)
    }

    async fn delete_all(&self, servers: &[Server]) -> Result<(), FleetError<P::Error>> {
        for server in servers {
            info!(id = server.id, name = %server.name, "deleting proxy server");
            self.provider
                .delete_server(server.id)
                .await
                .map_err(FleetError::Provider)?;
        }
        Ok(())
    }

    fn reachable(&self, mut servers: Vec<Server>) -> Vec<Server> {
        servers.retain(|server| {
            if server.public_ipv4.is_none() {
                warn!(
                    id = server.id,
                    name = %server.name,
                    fleet_tag = %self.settings.fleet_tag,
                    "ignoring proxy without a public IPv4 address"
                );
            }
            server.public_ipv4.is_some()
        });
        servers
    }

    fn addresses(&self, servers: &[Server]) -> Vec<Ipv4Addr> {
        servers
            .iter()
            .filter_map(|server| {
                if server.public_ipv4.is_none() {
                    warn!(
                        id = server.id,
                        name = %server.name,
                        fleet_tag = %self.settings.fleet_tag,
                        "skipping proxy without a public IPv4 address"
                    );
                }
                server.public_ipv4
            })
            .collect()
    }

    async fn gate(&self, addresses: &[Ipv4Addr]) -> Result<(), ReadinessError> {
        let targets: Vec<SocketAddr> = addresses
            .iter()
            .map(|address| SocketAddr::from((*address, self.settings.proxy_port)))
            .collect();
        self.readiness.wait_until_ready(&targets).await
    }

    async fn gated(&self, addresses: Vec<Ipv4Addr>) -> FleetResult<P::Error> {
        match self.gate(&addresses).await {
            Ok(()) => Ok(addresses),
            Err(err) => Err(PartialFailure::new(addresses, err.into())),
        }
    }
}

/// Picks the most recently created key; the first one wins ties.
fn newest_key(keys: Vec<SshKey>) -> Option<SshKey> {
    keys.into_iter()
        .reduce(|newest, key| if key.created > newest.created { key } else { newest })
}
