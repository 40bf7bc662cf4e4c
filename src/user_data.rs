//! Boot-time provisioning scripts for proxy instances.
//!
//! Every supported image maps to a script template that installs and starts
//! `tinyproxy`. Templates carry two placeholders: `{allow_ip}` receives the
//! caller's public IP so only that address may use the proxy, and `{port}`
//! receives the proxy port.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use thiserror::Error;

/// Placeholder replaced with the allow-listed client address.
pub const ALLOW_IP_PLACEHOLDER: &str = "{allow_ip}";
/// Placeholder replaced with the proxy port.
pub const PORT_PLACEHOLDER: &str = "{port}";

/// Port the proxy daemon listens on.
pub const DEFAULT_PROXY_PORT: u16 = 8080;

const FEDORA_TINYPROXY: &str = "#!/usr/bin/bash
dnf install -y tinyproxy
cat << EOF > /root/tinyproxy.conf
Port {port}
Listen 0.0.0.0
Timeout 600
Allow {allow_ip}
MaxClients 20
StartServers 20
EOF
tinyproxy -c /root/tinyproxy.conf";

const FEDORA_IMAGES: [&str; 3] = ["fedora-39", "fedora-38", "fedora-37"];

/// Errors raised while resolving provisioning scripts.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum UserDataError {
    /// Raised when no template is registered for the image.
    #[error("no user data template for image '{image}'")]
    NoTemplate {
        /// Image name that was looked up.
        image: String,
    },
    /// Raised when a template file path is blank.
    #[error("user data template file path must not be empty")]
    FilePathEmpty,
    /// Raised when a template file is empty or whitespace.
    #[error("user data template file `{path}` must not be empty")]
    FileEmpty {
        /// Expanded path of the file.
        path: String,
    },
    /// Raised when a template does not allow-list the caller.
    #[error("user data template `{path}` lacks the {{allow_ip}} placeholder")]
    MissingPlaceholder {
        /// Expanded path of the file.
        path: String,
    },
    /// Raised when reading a template file fails.
    #[error("failed to read user data template `{path}`: {message}")]
    FileRead {
        /// Expanded path that failed to read.
        path: String,
        /// Underlying error message.
        message: String,
    },
}

/// Image name to provisioning script lookup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserDataTemplates {
    templates: BTreeMap<String, String>,
    port: u16,
}

impl Default for UserDataTemplates {
    fn default() -> Self {
        Self::new(DEFAULT_PROXY_PORT)
    }
}

impl UserDataTemplates {
    /// Creates the built-in template set rendering the given proxy port.
    #[must_use]
    pub fn new(port: u16) -> Self {
        let templates = FEDORA_IMAGES
            .iter()
            .map(|image| ((*image).to_owned(), FEDORA_TINYPROXY.to_owned()))
            .collect();
        Self { templates, port }
    }

    /// Creates an empty template set.
    #[must_use]
    pub const fn empty(port: u16) -> Self {
        Self {
            templates: BTreeMap::new(),
            port,
        }
    }

    /// Registers (or replaces) the template for `image`.
    #[must_use]
    pub fn with_template(mut self, image: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(image.into(), template.into());
        self
    }

    /// Registers the template stored at `path` for `image`. A leading `~/`
    /// is expanded to the home directory.
    ///
    /// # Errors
    ///
    /// Returns [`UserDataError`] when the path is blank, the file cannot be
    /// read, is empty, or lacks the allow-list placeholder.
    pub fn with_template_file(
        self,
        image: impl Into<String>,
        path: &str,
    ) -> Result<Self, UserDataError> {
        if path.trim().is_empty() {
            return Err(UserDataError::FilePathEmpty);
        }
        let expanded = expand_tilde(path);
        let content = read_to_string_ambient(&expanded).map_err(|message| {
            UserDataError::FileRead {
                path: expanded.clone(),
                message,
            }
        })?;
        if content.trim().is_empty() {
            return Err(UserDataError::FileEmpty { path: expanded });
        }
        if !content.contains(ALLOW_IP_PLACEHOLDER) {
            return Err(UserDataError::MissingPlaceholder { path: expanded });
        }
        Ok(self.with_template(image, content))
    }

    /// Returns true when a template is registered for `image`.
    #[must_use]
    pub fn contains(&self, image: &str) -> bool {
        self.templates.contains_key(image)
    }

    /// Renders the script for `image`, allow-listing `allow_ip`.
    ///
    /// # Errors
    ///
    /// Returns [`UserDataError::NoTemplate`] when the image is unknown.
    pub fn render(&self, image: &str, allow_ip: Ipv4Addr) -> Result<String, UserDataError> {
        let template = self
            .templates
            .get(image)
            .ok_or_else(|| UserDataError::NoTemplate {
                image: image.to_owned(),
            })?;
        Ok(template
            .replace(ALLOW_IP_PLACEHOLDER, &allow_ip.to_string())
            .replace(PORT_PLACEHOLDER, &self.port.to_string()))
    }
}

fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn read_to_string_ambient(path: &str) -> Result<String, String> {
    let path_buf = Utf8Path::new(path);

    let (dir_path, file_path) = if path_buf.is_absolute() {
        let parent = path_buf
            .parent()
            .ok_or_else(|| format!("path has no parent directory: {path_buf}"))?;
        let file_name = path_buf
            .file_name()
            .ok_or_else(|| format!("path has no file name: {path_buf}"))?;
        (parent, Utf8Path::new(file_name))
    } else {
        (Utf8Path::new("."), path_buf)
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    dir.read_to_string(file_path).map_err(|err| err.to_string())
}
