//! Hetzner Cloud implementation of the provider interface.
//!
//! Talks to the public REST API (`/v1`) with a bearer token. List endpoints
//! are paginated; every page is fetched before results are returned.

mod error;
mod types;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::FleetConfig;
use crate::provider::{
    CreateServerRequest, Image, Location, Provider, ProviderFuture, Server, ServerType, SshKey,
};
use types::{
    CreateServerBody, CreateServerResponse, ErrorEnvelope, Meta, WireImage, WireLocation,
    WireServer, WireServerType, WireSshKey,
};

pub use error::HetznerError;

/// Default API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.hetzner.cloud/v1";

const PER_PAGE: &str = "50";
const USER_AGENT: &str = concat!("proxyfleet/", env!("CARGO_PKG_VERSION"));

/// Provider backed by the Hetzner Cloud API.
#[derive(Clone, Debug)]
pub struct HetznerProvider {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl HetznerProvider {
    /// Creates a provider for `api_url` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::Transport`] when the HTTP client cannot be
    /// initialised.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, HetznerError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| HetznerError::transport(&err))?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            token: token.into(),
        })
    }

    /// Constructs a provider from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HetznerError::Config`] when the configuration fails
    /// validation, or [`HetznerError::Transport`] when the HTTP client cannot
    /// be initialised.
    pub fn from_config(config: &FleetConfig) -> Result<Self, HetznerError> {
        config.validate()?;
        Self::new(&config.api_url, &config.token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, HetznerError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|err| HetznerError::transport(&err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| HetznerError::transport(&err))?;

        if status.is_success() {
            return Ok(body.to_vec());
        }

        let (code, message) = serde_json::from_slice::<ErrorEnvelope>(&body).map_or_else(
            |_| {
                (
                    String::from("unknown"),
                    String::from_utf8_lossy(&body).into_owned(),
                )
            },
            |envelope| (envelope.error.code, envelope.error.message),
        );
        Err(HetznerError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    /// Fetches every page of a list endpoint and decodes the items stored
    /// under `resource`.
    async fn list_all<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, HetznerError> {
        let mut items = Vec::new();
        let mut page: u64 = 1;
        loop {
            let page_text = page.to_string();
            let request = self
                .client
                .get(self.url(resource))
                .query(query)
                .query(&[("page", page_text.as_str()), ("per_page", PER_PAGE)]);
            let body = self.send(request).await?;

            let mut document: serde_json::Value = serde_json::from_slice(&body)
                .map_err(|err| HetznerError::decode(resource, err.to_string()))?;
            let batch = document
                .get_mut(resource)
                .map(serde_json::Value::take)
                .ok_or_else(|| HetznerError::decode(resource, format!("missing '{resource}' field")))?;
            let decoded: Vec<T> = serde_json::from_value(batch)
                .map_err(|err| HetznerError::decode(resource, err.to_string()))?;
            items.extend(decoded);

            let meta: Meta = document
                .get_mut("meta")
                .map(serde_json::Value::take)
                .map(serde_json::from_value)
                .transpose()
                .map_err(|err| HetznerError::decode(resource, err.to_string()))?
                .unwrap_or_default();
            match meta.pagination.and_then(|pagination| pagination.next_page) {
                Some(next) if next > page => page = next,
                Some(_) | None => break,
            }
        }
        debug!(resource, count = items.len(), "listed hetzner resources");
        Ok(items)
    }
}

impl Provider for HetznerProvider {
    type Error = HetznerError;

    fn list_servers<'a>(
        &'a self,
        label_selector: &'a str,
    ) -> ProviderFuture<'a, Vec<Server>, Self::Error> {
        Box::pin(async move {
            let servers: Vec<WireServer> = self
                .list_all("servers", &[("label_selector", label_selector)])
                .await?;
            servers.into_iter().map(Server::try_from).collect()
        })
    }

    fn create_server<'a>(
        &'a self,
        request: &'a CreateServerRequest,
    ) -> ProviderFuture<'a, Server, Self::Error> {
        Box::pin(async move {
            request.validate()?;
            let payload = CreateServerBody::from(request);
            let body = self
                .send(self.client.post(self.url("servers")).json(&payload))
                .await?;
            let created: CreateServerResponse = serde_json::from_slice(&body)
                .map_err(|err| HetznerError::decode("server", err.to_string()))?;
            Server::try_from(created.server)
        })
    }

    fn delete_server(&self, id: u64) -> ProviderFuture<'_, (), Self::Error> {
        Box::pin(async move {
            self.send(self.client.delete(self.url(&format!("servers/{id}"))))
                .await?;
            Ok(())
        })
    }

    fn locations(&self) -> ProviderFuture<'_, Vec<Location>, Self::Error> {
        Box::pin(async move {
            let locations: Vec<WireLocation> = self.list_all("locations", &[]).await?;
            Ok(locations.into_iter().map(Location::from).collect())
        })
    }

    fn server_types(&self) -> ProviderFuture<'_, Vec<ServerType>, Self::Error> {
        Box::pin(async move {
            let server_types: Vec<WireServerType> = self.list_all("server_types", &[]).await?;
            Ok(server_types.into_iter().map(ServerType::from).collect())
        })
    }

    fn image<'a>(
        &'a self,
        name: &'a str,
        architecture: &'a str,
    ) -> ProviderFuture<'a, Option<Image>, Self::Error> {
        Box::pin(async move {
            let images: Vec<WireImage> = self
                .list_all("images", &[("name", name), ("architecture", architecture)])
                .await?;
            Ok(images
                .into_iter()
                .next()
                .map(|image| image.into_image(name)))
        })
    }

    fn ssh_key<'a>(&'a self, name: &'a str) -> ProviderFuture<'a, Option<SshKey>, Self::Error> {
        Box::pin(async move {
            let keys: Vec<WireSshKey> = self.list_all("ssh_keys", &[("name", name)]).await?;
            Ok(keys.into_iter().next().map(SshKey::from))
        })
    }

    fn ssh_keys(&self) -> ProviderFuture<'_, Vec<SshKey>, Self::Error> {
        Box::pin(async move {
            let keys: Vec<WireSshKey> = self.list_all("ssh_keys", &[]).await?;
            Ok(keys.into_iter().map(SshKey::from).collect())
        })
    }
}
