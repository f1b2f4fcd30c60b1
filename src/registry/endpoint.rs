//! Registry endpoint addressing
//!
//! Configuration names registries loosely: `registry.example.com`, `https://host:5000/charts`,
//! `oci://host/path`. [`RegistryEndpoint`] normalizes all of them once per sync target.

use crate::error::{RegistryError, Result};
use std::fmt;
use url::Url;

/// Backend protocol spoken by an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryFlavor {
    /// Distribution API (`/v2/`)
    Oci,
    /// Helm repository serving `index.yaml` plus tarballs
    LegacyIndex,
    /// Generic artifact repository accepting multipart uploads
    RawUpload,
}

impl RegistryFlavor {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistryFlavor::Oci => "oci",
            RegistryFlavor::LegacyIndex => "legacy-index",
            RegistryFlavor::RawUpload => "raw-upload",
        }
    }
}

impl fmt::Display for RegistryFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    pub scheme: String,
    /// Host with optional port
    pub host: String,
    /// Path below the host without surrounding slashes, possibly empty
    pub path: String,
    pub flavor: RegistryFlavor,
}

impl RegistryEndpoint {
    /// Parse a registry location. `oci://` and bare hosts mean https.
    pub fn parse(raw: &str, flavor: RegistryFlavor) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(RegistryError::Validation(
                "registry location cannot be empty".to_string(),
            ));
        }

        let with_scheme = if let Some(rest) = trimmed.strip_prefix("oci://") {
            format!("https://{}", rest)
        } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let url = Url::parse(&with_scheme)?;
        let host = url.host_str().ok_or_else(|| {
            RegistryError::Validation(format!("registry location '{}' has no host", raw))
        })?;
        let host = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
            path: url.path().trim_matches('/').to_string(),
            flavor,
        })
    }

    pub fn with_flavor(mut self, flavor: RegistryFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// `scheme://host[:port]`
    pub fn root_url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    /// Root plus the configured path, used for index and raw-upload repositories
    pub fn base_url(&self) -> String {
        if self.path.is_empty() {
            self.root_url()
        } else {
            format!("{}/{}", self.root_url(), self.path)
        }
    }

    /// Distribution API prefix for one repository: `{root}/v2/{repository}`
    pub fn repository_url(&self, repository: &str) -> String {
        format!("{}/v2/{}", self.root_url(), repository.trim_matches('/'))
    }

    /// Repository name for `name` below the endpoint's path
    pub fn repository(&self, name: &str) -> String {
        let name = name.trim_matches('/');
        if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        }
    }

    /// Bare hostname, used as the credential lookup alias
    pub fn hostname(&self) -> &str {
        self.host.split(':').next().unwrap_or(&self.host)
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.base_url(), self.flavor)
    }
}
