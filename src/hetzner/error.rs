//! Error types for the Hetzner provider.

use crate::config::ConfigError;
use crate::provider::ProviderError;
use thiserror::Error;

/// Errors raised by the Hetzner provider.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum HetznerError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when a create request is missing a required field.
    #[error("invalid server request: {0}")]
    Validation(String),
    /// Raised when the API answers with a non-success status.
    #[error("hetzner API error ({status} {code}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Machine readable error code from the error envelope.
        code: String,
        /// Human readable message from the error envelope.
        message: String,
    },
    /// Raised when the request cannot be sent or the body cannot be read.
    #[error("hetzner request failed: {message}")]
    Transport {
        /// Message returned by the HTTP client.
        message: String,
    },
    /// Raised when a response body does not match the expected shape.
    #[error("failed to decode {resource} response: {message}")]
    Decode {
        /// Resource being decoded (for example `servers`).
        resource: String,
        /// Decoder error message.
        message: String,
    },
}

impl HetznerError {
    pub(super) fn transport(err: &reqwest::Error) -> Self {
        Self::Transport {
            message: err.to_string(),
        }
    }

    pub(super) fn decode(resource: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            resource: resource.to_owned(),
            message: message.into(),
        }
    }
}

impl From<ProviderError> for HetznerError {
    fn from(value: ProviderError) -> Self {
        match value {
            ProviderError::Validation(field) => Self::Validation(field),
        }
    }
}

impl From<ConfigError> for HetznerError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
