//! Test support utilities shared across unit and integration tests.
//!
//! [`ScriptedProvider`] keeps an in-memory account of servers and records
//! every call so tests can assert on the exact create/delete traffic a fleet
//! operation produced. [`ScriptedProbe`] stands in for the TCP readiness
//! gate.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::config::FleetConfig;
use crate::provider::{
    CreateServerRequest, Image, Location, LocationPrice, Provider, ProviderFuture, Server,
    ServerType, SshKey,
};
use crate::readiness::{ReadinessError, ReadinessFuture, ReadinessProbe};

/// Errors injected by [`ScriptedProvider`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedProviderError {
    /// Injected list failure.
    #[error("list failure")]
    List,
    /// Injected create failure.
    #[error("create failure")]
    Create,
    /// Injected delete failure.
    #[error("delete failure for server {0}")]
    Delete(u64),
}

#[derive(Debug, Default)]
struct ProviderState {
    servers: Vec<(BTreeMap<String, String>, Server)>,
    next_id: u64,
    locations: Vec<Location>,
    server_types: Vec<ServerType>,
    images: Vec<Image>,
    ssh_keys: Vec<SshKey>,
    fail_list: bool,
    fail_create_at: Option<usize>,
    fail_delete_of: Option<u64>,
    omit_public_ip: bool,
    creates: Vec<CreateServerRequest>,
    deletes: Vec<u64>,
    selectors: Vec<String>,
}

/// In-memory provider with a small Hetzner-like catalog.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    /// Creates a provider with an empty catalog and no servers.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a provider with two locations, an ARM and two x86 server
    /// types, Fedora images for both architectures and one SSH key.
    #[must_use]
    pub fn with_catalog() -> Self {
        let provider = Self::empty();
        provider.set_locations(&[("fsn1", "DE"), ("nbg1", "DE")]);
        provider.add_server_type("cax11", "arm", &[("fsn1", "0.0053"), ("nbg1", "0.0053")]);
        provider.add_server_type("cx32", "x86", &[("fsn1", "0.0110"), ("nbg1", "0.0110")]);
        provider.add_server_type("cx22", "x86", &[("fsn1", "0.0060"), ("nbg1", "0.0060")]);
        provider.add_image(1, "fedora-39", "x86");
        provider.add_image(2, "fedora-39", "arm");
        provider.add_ssh_key(1, "deploy", "2024-01-01T00:00:00+00:00");
        provider
    }

    fn lock(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the location catalog.
    pub fn set_locations(&self, locations: &[(&str, &str)]) {
        self.lock().locations = locations
            .iter()
            .map(|(name, country)| Location {
                name: (*name).to_owned(),
                country: (*country).to_owned(),
            })
            .collect();
    }

    /// Appends a server type priced in euro at the given locations.
    pub fn add_server_type(&self, name: &str, architecture: &str, prices: &[(&str, &str)]) {
        self.lock().server_types.push(ServerType {
            name: name.to_owned(),
            architecture: architecture.to_owned(),
            prices: prices
                .iter()
                .map(|(location, net)| LocationPrice {
                    location: (*location).to_owned(),
                    currency: String::from("EUR"),
                    hourly_net: (*net).to_owned(),
                })
                .collect(),
        });
    }

    /// Appends an image.
    pub fn add_image(&self, id: u64, name: &str, architecture: &str) {
        self.lock().images.push(Image {
            id,
            name: name.to_owned(),
            architecture: architecture.to_owned(),
        });
    }

    /// Appends an SSH key.
    pub fn add_ssh_key(&self, id: u64, name: &str, created: &str) {
        self.lock().ssh_keys.push(SshKey {
            id,
            name: name.to_owned(),
            created: created.to_owned(),
        });
    }

    /// Removes every SSH key.
    pub fn clear_ssh_keys(&self) {
        self.lock().ssh_keys.clear();
    }

    /// Seeds a server carrying `labels` at `location`.
    pub fn seed_server(&self, labels: &[(&str, &str)], location: &str) -> Server {
        self.seed(labels, location, true)
    }

    /// Seeds a server owned by `fleet_tag` that has no public IPv4 address.
    pub fn seed_unaddressed(&self, fleet_tag: &str, location: &str) -> Server {
        self.seed(&[("owner", fleet_tag)], location, false)
    }

    fn seed(&self, labels: &[(&str, &str)], location: &str, with_ip: bool) -> Server {
        let mut state = self.lock();
        let label_map = labels
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        let server = state.next_server(location, "cx22", with_ip);
        state.servers.push((label_map, server.clone()));
        server
    }

    /// Seeds `count` servers owned by `fleet_tag` at `location`.
    pub fn seed_owned(&self, fleet_tag: &str, location: &str, count: usize) -> Vec<Server> {
        (0..count)
            .map(|_| self.seed_server(&[("owner", fleet_tag)], location))
            .collect()
    }

    /// Makes every list call fail.
    pub fn fail_list(&self) {
        self.lock().fail_list = true;
    }

    /// Makes the create call with zero-based index `index` fail.
    pub fn fail_create_at(&self, index: usize) {
        self.lock().fail_create_at = Some(index);
    }

    /// Makes deleting server `id` fail.
    pub fn fail_delete_of(&self, id: u64) {
        self.lock().fail_delete_of = Some(id);
    }

    /// Makes created servers come back without a public IPv4 address.
    pub fn omit_public_ip(&self) {
        self.lock().omit_public_ip = true;
    }

    /// Returns every server in the account.
    #[must_use]
    pub fn servers(&self) -> Vec<Server> {
        self.lock()
            .servers
            .iter()
            .map(|(_, server)| server.clone())
            .collect()
    }

    /// Returns the create requests issued so far.
    #[must_use]
    pub fn creates(&self) -> Vec<CreateServerRequest> {
        self.lock().creates.clone()
    }

    /// Returns the ids passed to delete so far.
    #[must_use]
    pub fn deletes(&self) -> Vec<u64> {
        self.lock().deletes.clone()
    }

    /// Returns the label selectors used by list calls.
    #[must_use]
    pub fn selectors(&self) -> Vec<String> {
        self.lock().selectors.clone()
    }
}

impl ProviderState {
    fn next_server(&mut self, location: &str, server_type: &str, with_ip: bool) -> Server {
        self.next_id += 1;
        let id = self.next_id;
        let last_octet = u8::try_from(id % 250).unwrap_or(0);
        Server {
            id,
            name: format!("proxy-{id}"),
            public_ipv4: with_ip.then(|| Ipv4Addr::new(203, 0, 113, last_octet)),
            location: Location {
                name: location.to_owned(),
                country: String::from("DE"),
            },
            server_type: server_type.to_owned(),
            created: String::from("2024-01-01T00:00:00+00:00"),
        }
    }

    fn matches(labels: &BTreeMap<String, String>, selector: &str) -> bool {
        let Some((key, value)) = selector.split_once('=') else {
            return labels.contains_key(selector);
        };
        labels.get(key).is_some_and(|found| found == value)
    }
}

impl Provider for ScriptedProvider {
    type Error = ScriptedProviderError;

    fn list_servers<'a>(
        &'a self,
        label_selector: &'a str,
    ) -> ProviderFuture<'a, Vec<Server>, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.selectors.push(label_selector.to_owned());
            if state.fail_list {
                return Err(ScriptedProviderError::List);
            }
            Ok(state
                .servers
                .iter()
                .filter(|(labels, _)| ProviderState::matches(labels, label_selector))
                .map(|(_, server)| server.clone())
                .collect())
        })
    }

    fn create_server<'a>(
        &'a self,
        request: &'a CreateServerRequest,
    ) -> ProviderFuture<'a, Server, Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            let index = state.creates.len();
            state.creates.push(request.clone());
            if state.fail_create_at == Some(index) {
                return Err(ScriptedProviderError::Create);
            }
            let with_ip = !state.omit_public_ip;
            let mut server = state.next_server(&request.location, &request.server_type, with_ip);
            server.name.clone_from(&request.name);
            state.servers.push((request.labels.clone(), server.clone()));
            Ok(server)
        })
    }

    fn delete_server(&self, id: u64) -> ProviderFuture<'_, (), Self::Error> {
        Box::pin(async move {
            let mut state = self.lock();
            state.deletes.push(id);
            if state.fail_delete_of == Some(id) {
                return Err(ScriptedProviderError::Delete(id));
            }
            state.servers.retain(|(_, server)| server.id != id);
            Ok(())
        })
    }

    fn locations(&self) -> ProviderFuture<'_, Vec<Location>, Self::Error> {
        Box::pin(async move { Ok(self.lock().locations.clone()) })
    }

    fn server_types(&self) -> ProviderFuture<'_, Vec<ServerType>, Self::Error> {
        Box::pin(async move { Ok(self.lock().server_types.clone()) })
    }

    fn image<'a>(
        &'a self,
        name: &'a str,
        architecture: &'a str,
    ) -> ProviderFuture<'a, Option<Image>, Self::Error> {
        Box::pin(async move {
            Ok(self
                .lock()
                .images
                .iter()
                .find(|image| image.name == name && image.architecture == architecture)
                .cloned())
        })
    }

    fn ssh_key<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<SshKey>, Self::Error> {
        Box::pin(async move {
            Ok(self
                .lock()
                .ssh_keys
                .iter()
                .find(|key| key.name == name)
                .cloned())
        })
    }

    fn ssh_keys(&self) -> ProviderFuture<'_, Vec<SshKey>, Self::Error> {
        Box::pin(async move { Ok(self.lock().ssh_keys.clone()) })
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    calls: Vec<Vec<SocketAddr>>,
    fail: bool,
}

/// Readiness probe double that records targets and answers immediately.
#[derive(Clone, Debug, Default)]
pub struct ScriptedProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl ScriptedProbe {
    /// Creates a probe that reports every target ready.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every non-empty wait time out.
    pub fn fail(&self) {
        self.lock().fail = true;
    }

    /// Returns the target sets passed to each wait.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<SocketAddr>> {
        self.lock().calls.clone()
    }

    /// Returns every target that was waited on, in order.
    #[must_use]
    pub fn targets(&self) -> Vec<SocketAddr> {
        self.lock().calls.iter().flatten().copied().collect()
    }
}

impl ReadinessProbe for ScriptedProbe {
    fn wait_until_ready<'a>(&'a self, targets: &'a [SocketAddr]) -> ReadinessFuture<'a> {
        Box::pin(async move {
            let mut state = self.lock();
            state.calls.push(targets.to_vec());
            match targets.first() {
                Some(target) if state.fail => Err(ReadinessError::Timeout {
                    target: *target,
                    waited: Duration::from_secs(600),
                }),
                Some(_) | None => Ok(()),
            }
        })
    }
}

/// Returns a valid configuration for tests.
#[must_use]
pub fn fleet_config() -> FleetConfig {
    FleetConfig {
        token: String::from("test-token"),
        ssh_key: None,
        fleet_tag: String::from("hcpf"),
        image: String::from("fedora-39"),
        proxy_port: 8080,
        api_url: String::from("https://api.hetzner.cloud/v1"),
        ip_lookup_url: String::from("https://api.ipify.org"),
        user_data_file: None,
    }
}
