//! Provider abstraction for the cloud API the fleet runs on.
//!
//! The reconciler only talks to the cloud through [`Provider`], so the same
//! fleet logic can drive the Hetzner implementation or a scripted double in
//! tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::Ipv4Addr;
use std::pin::Pin;

use thiserror::Error;

/// Architecture name the provider uses for ARM server types.
pub const ARCH_ARM: &str = "arm";

/// Datacenter location offered by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Location {
    /// Short location name (for example `fsn1`).
    pub name: String,
    /// ISO country code of the location.
    pub country: String,
}

/// Hourly price of a server type at one location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocationPrice {
    /// Location the price applies to.
    pub location: String,
    /// Currency of the price (for example `EUR`).
    pub currency: String,
    /// Net hourly price as published by the provider. Kept as text because
    /// the provider publishes decimal strings.
    pub hourly_net: String,
}

/// Server flavour with its per-location pricing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerType {
    /// Server type name (for example `cx22`).
    pub name: String,
    /// CPU architecture (`x86` or `arm`).
    pub architecture: String,
    /// Published prices, one entry per location where the type is offered.
    pub prices: Vec<LocationPrice>,
}

impl ServerType {
    /// Returns the published price at `location`, if any.
    #[must_use]
    pub fn price_at(&self, location: &str) -> Option<&LocationPrice> {
        self.prices.iter().find(|price| price.location == location)
    }
}

/// Boot image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Image {
    /// Provider image identifier.
    pub id: u64,
    /// Image name (for example `fedora-39`).
    pub name: String,
    /// Architecture the image is built for.
    pub architecture: String,
}

/// SSH public key registered with the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshKey {
    /// Provider key identifier.
    pub id: u64,
    /// Key name.
    pub name: String,
    /// RFC 3339 creation timestamp.
    pub created: String,
}

/// Server as reported by the provider.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Server {
    /// Provider assigned identifier.
    pub id: u64,
    /// Server name.
    pub name: String,
    /// Public IPv4 address, when one is assigned.
    pub public_ipv4: Option<Ipv4Addr>,
    /// Location the server runs in.
    pub location: Location,
    /// Name of the server type the server was created with.
    pub server_type: String,
    /// RFC 3339 creation timestamp.
    pub created: String,
}

/// Parameters for creating one server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateServerRequest {
    /// Server name.
    pub name: String,
    /// Server type name.
    pub server_type: String,
    /// Image identifier or name.
    pub image: String,
    /// Location name.
    pub location: String,
    /// Labels attached to the server.
    pub labels: BTreeMap<String, String>,
    /// Names of SSH keys to install.
    pub ssh_keys: Vec<String>,
    /// Boot-time provisioning script.
    pub user_data: String,
}

impl CreateServerRequest {
    /// Starts a builder for a [`CreateServerRequest`].
    #[must_use]
    pub fn builder() -> CreateServerRequestBuilder {
        CreateServerRequestBuilder::new()
    }

    /// Validates the request, returning a descriptive error when a required
    /// field is missing.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] when any required string field
    /// is empty.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.name.is_empty() {
            return Err(ProviderError::Validation("name".to_owned()));
        }
        if self.server_type.is_empty() {
            return Err(ProviderError::Validation("server_type".to_owned()));
        }
        if self.image.is_empty() {
            return Err(ProviderError::Validation("image".to_owned()));
        }
        if self.location.is_empty() {
            return Err(ProviderError::Validation("location".to_owned()));
        }
        if self.user_data.trim().is_empty() {
            return Err(ProviderError::Validation("user_data".to_owned()));
        }
        Ok(())
    }
}

/// Builder for [`CreateServerRequest`] that trims and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateServerRequestBuilder {
    name: String,
    server_type: String,
    image: String,
    location: String,
    labels: BTreeMap<String, String>,
    ssh_keys: Vec<String>,
    user_data: String,
}

impl CreateServerRequestBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = value.into();
        self
    }

    /// Sets the server type.
    #[must_use]
    pub fn server_type(mut self, value: impl Into<String>) -> Self {
        self.server_type = value.into();
        self
    }

    /// Sets the image identifier or name.
    #[must_use]
    pub fn image(mut self, value: impl Into<String>) -> Self {
        self.image = value.into();
        self
    }

    /// Sets the location.
    #[must_use]
    pub fn location(mut self, value: impl Into<String>) -> Self {
        self.location = value.into();
        self
    }

    /// Adds a label.
    #[must_use]
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an SSH key by name.
    #[must_use]
    pub fn ssh_key(mut self, value: impl Into<String>) -> Self {
        self.ssh_keys.push(value.into());
        self
    }

    /// Sets the provisioning script.
    #[must_use]
    pub fn user_data(mut self, value: impl Into<String>) -> Self {
        self.user_data = value.into();
        self
    }

    /// Builds and validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] when a required field is empty.
    pub fn build(self) -> Result<CreateServerRequest, ProviderError> {
        let request = CreateServerRequest {
            name: self.name.trim().to_owned(),
            server_type: self.server_type.trim().to_owned(),
            image: self.image.trim().to_owned(),
            location: self.location.trim().to_owned(),
            labels: self.labels,
            ssh_keys: self.ssh_keys,
            user_data: self.user_data,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Errors raised independently of any provider implementation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProviderError {
    /// Raised when a request is missing a required field.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Cloud API consumed by the fleet reconciler.
pub trait Provider {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists every server matching `label_selector` (for example
    /// `owner=hcpf`), in provider order.
    fn list_servers<'a>(
        &'a self,
        label_selector: &'a str,
    ) -> ProviderFuture<'a, Vec<Server>, Self::Error>;

    /// Creates and starts a server.
    fn create_server<'a>(
        &'a self,
        request: &'a CreateServerRequest,
    ) -> ProviderFuture<'a, Server, Self::Error>;

    /// Deletes a server.
    fn delete_server(&self, id: u64) -> ProviderFuture<'_, (), Self::Error>;

    /// Lists all locations.
    fn locations(&self) -> ProviderFuture<'_, Vec<Location>, Self::Error>;

    /// Lists all server types with their pricing.
    fn server_types(&self) -> ProviderFuture<'_, Vec<ServerType>, Self::Error>;

    /// Looks up an image by name and architecture.
    fn image<'a>(
        &'a self,
        name: &'a str,
        architecture: &'a str,
    ) -> ProviderFuture<'a, Option<Image>, Self::Error>;

    /// Looks up an SSH key by name.
    fn ssh_key<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<SshKey>, Self::Error>;

    /// Lists all SSH keys.
    fn ssh_keys(&self) -> ProviderFuture<'_, Vec<SshKey>, Self::Error>;
}
