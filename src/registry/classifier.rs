//! Endpoint classification: distribution API or legacy Helm index
//!
//! Probe failures are negative signals for that probe only. An inconclusive result is
//! reported as [`Classification::Unknown`]; callers treat it as "not OCI".

use crate::error::handlers::NetworkErrorHandler;
use crate::logging::Logger;
use crate::registry::auth::AuthHeaders;
use crate::registry::client::RegistryClient;
use crate::registry::endpoint::{RegistryEndpoint, RegistryFlavor};
use reqwest::StatusCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Oci,
    LegacyIndex,
    Unknown,
}

impl Classification {
    /// Flavor used for pulling: only a positive probe selects the distribution API
    pub fn pull_flavor(&self) -> RegistryFlavor {
        match self {
            Classification::Oci => RegistryFlavor::Oci,
            Classification::LegacyIndex | Classification::Unknown => RegistryFlavor::LegacyIndex,
        }
    }
}

pub struct RegistryClassifier<'a> {
    client: &'a RegistryClient,
}

impl<'a> RegistryClassifier<'a> {
    pub fn new(client: &'a RegistryClient) -> Self {
        Self { client }
    }

    fn output(&self) -> &Logger {
        self.client.output()
    }

    pub async fn classify(
        &self,
        endpoint: &RegistryEndpoint,
        auth: &AuthHeaders,
    ) -> Classification {
        let timeout = self.client.transport().probe_timeout();

        let v2_url = format!("{}/v2/", endpoint.root_url());
        let request = self.client.http().get(&v2_url).timeout(timeout);
        match auth.apply(request).send().await {
            Ok(response)
                if matches!(response.status(), StatusCode::OK | StatusCode::UNAUTHORIZED) =>
            {
                self.output().detail(&format!("{} speaks the distribution API", endpoint.host));
                return Classification::Oci;
            }
            Ok(response) => self.output().detail(&format!(
                "{} answered {} for /v2/",
                endpoint.host,
                response.status()
            )),
            Err(e) => self.output().detail(&format!(
                "/v2/ probe failed: {}",
                NetworkErrorHandler::handle_network_error(&e, "classification probe")
            )),
        }

        let index_url = format!("{}/index.yaml", endpoint.base_url());
        let request = self.client.http().head(&index_url).timeout(timeout);
        match auth.apply(request).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                self.output().detail(&format!("{} serves a Helm index", endpoint.base_url()));
                Classification::LegacyIndex
            }
            Ok(response) => {
                self.output().warning(&format!(
                    "Could not classify {}: index.yaml answered {}",
                    endpoint.base_url(),
                    response.status()
                ));
                Classification::Unknown
            }
            Err(e) => {
                self.output().warning(&format!(
                    "Could not classify {}: {}",
                    endpoint.base_url(),
                    NetworkErrorHandler::handle_network_error(&e, "classification probe")
                ));
                Classification::Unknown
            }
        }
    }
}
