//! Configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::hetzner::DEFAULT_API_URL;
use crate::public_ip::DEFAULT_IP_LOOKUP_URL;
use crate::user_data::{DEFAULT_PROXY_PORT, UserDataError, UserDataTemplates};

/// Default value of the `owner` label marking fleet servers.
pub const DEFAULT_FLEET_TAG: &str = "hcpf";
/// Default boot image for new proxies.
pub const DEFAULT_IMAGE: &str = "fedora-39";

/// Fleet settings derived from environment variables, configuration files,
/// and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "HETZNER",
    discovery(
        app_name = "proxyfleet",
        env_var = "PROXYFLEET_CONFIG_PATH",
        config_file_name = "proxyfleet.toml",
        dotfile_name = ".proxyfleet.toml",
        project_file_name = "proxyfleet.toml"
    )
)]
pub struct FleetConfig {
    /// API token used for authentication. This value is required.
    pub token: String,
    /// Name of the SSH key installed on new proxies. When unset the most
    /// recently created key of the project is used.
    pub ssh_key: Option<String>,
    /// Value of the `owner` label identifying fleet servers.
    #[ortho_config(default = DEFAULT_FLEET_TAG.to_owned())]
    pub fleet_tag: String,
    /// Image name used for new proxies.
    #[ortho_config(default = DEFAULT_IMAGE.to_owned())]
    pub image: String,
    /// TCP port the proxy daemon listens on.
    #[ortho_config(default = DEFAULT_PROXY_PORT)]
    pub proxy_port: u16,
    /// Base URL of the Hetzner Cloud API.
    #[ortho_config(default = DEFAULT_API_URL.to_owned())]
    pub api_url: String,
    /// Plain text endpoint returning the caller's public IPv4 address.
    #[ortho_config(default = DEFAULT_IP_LOOKUP_URL.to_owned())]
    pub ip_lookup_url: String,
    /// Optional provisioning script template registered for `image`.
    pub user_data_file: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl FleetConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to proxyfleet.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("proxyfleet")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the SSH key preference, ignoring blank values.
    #[must_use]
    pub fn ssh_key_name(&self) -> Option<&str> {
        self.ssh_key
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Builds the provisioning template set for this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`UserDataError`] when the configured template file cannot be
    /// used.
    pub fn user_data_templates(&self) -> Result<UserDataTemplates, UserDataError> {
        let templates = UserDataTemplates::new(self.proxy_port);
        match self.user_data_file.as_deref() {
            Some(path) => templates.with_template_file(self.image.trim(), path),
            None => Ok(templates),
        }
    }

    /// Performs semantic validation on required fields. Error messages name
    /// the environment variable and configuration key to set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::InvalidPort`] when the proxy port is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.token,
            &FieldMetadata::new("Hetzner Cloud API token", "HETZNER_TOKEN", "token"),
        )?;
        Self::require_field(
            &self.fleet_tag,
            &FieldMetadata::new("fleet tag", "HETZNER_FLEET_TAG", "fleet_tag"),
        )?;
        Self::require_field(
            &self.image,
            &FieldMetadata::new("proxy image", "HETZNER_IMAGE", "image"),
        )?;
        Self::require_field(
            &self.api_url,
            &FieldMetadata::new("API URL", "HETZNER_API_URL", "api_url"),
        )?;
        Self::require_field(
            &self.ip_lookup_url,
            &FieldMetadata::new(
                "public IP lookup URL",
                "HETZNER_IP_LOOKUP_URL",
                "ip_lookup_url",
            ),
        )?;
        if self.proxy_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Raised when the proxy port is zero.
    #[error("proxy_port must be between 1 and 65535")]
    InvalidPort,
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
