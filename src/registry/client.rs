//! Registry client construction
//!
//! One `reqwest::Client` per run, configured from [`TransportConfig`]. Operation structs
//! borrow clones of it; `reqwest::Client` is reference counted internally.

use crate::cli::config::TransportConfig;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::auth::{AuthBroker, AuthHeaders};
use crate::registry::endpoint::RegistryEndpoint;
use crate::registry::operations::{BlobOperations, ManifestOperations};
use reqwest::Client;

pub struct RegistryClientBuilder {
    transport: TransportConfig,
    output: Logger,
}

impl RegistryClientBuilder {
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            output: Logger::default(),
        }
    }

    pub fn with_output(mut self, output: Logger) -> Self {
        self.output = output;
        self
    }

    pub fn build(self) -> Result<RegistryClient> {
        self.transport.validate()?;

        let mut builder = Client::builder()
            .connect_timeout(self.transport.metadata_timeout())
            .read_timeout(self.transport.read_timeout())
            .user_agent(concat!("airgap-mirror/", env!("CARGO_PKG_VERSION")));

        if self.transport.skip_tls {
            self.output.warning("TLS verification disabled for all registries");
            builder = builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }

        let client = builder
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(RegistryClient {
            client,
            transport: self.transport,
            output: self.output,
        })
    }
}

#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    transport: TransportConfig,
    output: Logger,
}

impl RegistryClient {
    pub fn builder(transport: TransportConfig) -> RegistryClientBuilder {
        RegistryClientBuilder::new(transport)
    }

    pub fn http(&self) -> &Client {
        &self.client
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    pub fn auth_broker(&self) -> AuthBroker {
        AuthBroker::new(
            self.client.clone(),
            self.output.clone(),
            self.transport.probe_timeout(),
            self.transport.metadata_timeout(),
        )
    }

    /// Manifest operations on one repository
    pub fn manifests(
        &self,
        endpoint: &RegistryEndpoint,
        repository: &str,
        auth: &AuthHeaders,
    ) -> ManifestOperations {
        ManifestOperations::new(
            self.client.clone(),
            endpoint.repository_url(repository),
            auth.clone(),
            self.output.clone(),
            self.transport.metadata_timeout(),
        )
    }

    /// Blob operations on one repository
    pub fn blobs(
        &self,
        endpoint: &RegistryEndpoint,
        repository: &str,
        auth: &AuthHeaders,
    ) -> BlobOperations {
        BlobOperations::new(
            self.client.clone(),
            endpoint.root_url(),
            endpoint.repository_url(repository),
            auth.clone(),
            self.output.clone(),
            self.transport.metadata_timeout(),
        )
    }
}
