//! Manifest operations for registry client
//!
//! Implements Docker Registry v2 and OCI manifest operations:
//! - Manifest download with multi-format Accept headers (GET /v2/{name}/manifests/{reference})
//! - Platform narrowing of manifest lists and OCI indexes
//! - Manifest commit (PUT /v2/{name}/manifests/{reference})
//! - Existence checks used by the push-mode policy

use crate::digest::DigestUtils;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::image::manifest::{
    Manifest, ManifestDocument, ManifestType, MANIFEST_ACCEPT, OCI_MANIFEST, effective_media_type,
};
use crate::logging::Logger;
use crate::registry::auth::AuthHeaders;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::time::Duration;

pub const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";

/// A resolved single-platform manifest, with the exact bytes the registry served
#[derive(Debug, Clone)]
pub struct FetchedManifest {
    pub raw: Vec<u8>,
    pub media_type: String,
    pub manifest: Manifest,
}

/// How to ask whether a manifest exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExistenceProbe {
    /// `HEAD` with the full Accept list (images)
    Head,
    /// `GET` accepting only OCI manifests (charts)
    OciGet,
}

#[derive(Clone)]
pub struct ManifestOperations {
    client: Client,
    /// `{root}/v2/{repository}`
    base: String,
    auth: AuthHeaders,
    output: Logger,
    timeout: Duration,
}

impl ManifestOperations {
    pub fn new(
        client: Client,
        base: String,
        auth: AuthHeaders,
        output: Logger,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            base,
            auth,
            output,
            timeout,
        }
    }

    fn manifest_url(&self, reference: &str) -> String {
        format!("{}/manifests/{}", self.base, reference)
    }

    /// Raw manifest bytes and their effective media type
    pub async fn get_manifest(&self, reference: &str) -> Result<(Vec<u8>, String)> {
        let url = self.manifest_url(reference);
        self.output.verbose(&format!("Fetching manifest {}", url));

        let request = self
            .client
            .get(&url)
            .header(ACCEPT, MANIFEST_ACCEPT)
            .timeout(self.timeout);
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "manifest fetch"))?;

        if !response.status().is_success() {
            return Err(HttpErrorHandler::from_response(
                response,
                &format!("manifest {}", reference),
            )
            .await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "manifest read"))?
            .to_vec();
        let media_type = effective_media_type(&data, content_type.as_deref())?;
        self.output.detail(&format!("Manifest type: {}", media_type));

        Ok((data, media_type))
    }

    /// Fetch `reference`, narrowing an index to `architecture`
    pub async fn fetch_manifest(
        &self,
        reference: &str,
        architecture: &str,
    ) -> Result<FetchedManifest> {
        let (mut raw, mut media_type) = self.get_manifest(reference).await?;

        if let ManifestDocument::Index(index) = ManifestDocument::parse(&raw, &media_type)? {
            let entry = index.select_platform(architecture)?;
            self.output.verbose(&format!(
                "Resolved {} for {} to {}",
                reference,
                architecture,
                DigestUtils::format_digest_short(&entry.digest)
            ));
            (raw, media_type) = self.get_manifest(&entry.digest).await?;
        }

        if !ManifestType::from_media_type(&media_type).is_supported_manifest() {
            return Err(RegistryError::UnsupportedFormat(format!(
                "manifest media type '{}' for {}",
                media_type, reference
            )));
        }

        let manifest = match ManifestDocument::parse(&raw, &media_type)? {
            ManifestDocument::Single(manifest) => manifest,
            ManifestDocument::Index(_) => {
                return Err(RegistryError::UnsupportedFormat(format!(
                    "nested manifest index for {}",
                    reference
                )));
            }
        };
        manifest.validate()?;

        Ok(FetchedManifest {
            raw,
            media_type,
            manifest,
        })
    }

    /// Commit a manifest; returns the registry's content digest for it
    pub async fn put_manifest(
        &self,
        reference: &str,
        media_type: &str,
        body: Vec<u8>,
    ) -> Result<String> {
        let url = self.manifest_url(reference);
        let local_digest = DigestUtils::compute_digest(&body);
        self.output.verbose(&format!(
            "Uploading manifest {} with content-type: {}",
            reference, media_type
        ));

        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, media_type)
            .body(body)
            .timeout(self.timeout);
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "manifest upload"))?;

        if !response.status().is_success() {
            return Err(HttpErrorHandler::from_response(
                response,
                &format!("manifest upload {}", reference),
            )
            .await);
        }

        let digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .unwrap_or(local_digest);
        self.output.success(&format!(
            "Manifest {} committed as {}",
            reference,
            DigestUtils::format_digest_short(&digest)
        ));
        Ok(digest)
    }

    /// Whether `reference` exists: 200 yes, 404 no, anything else is an error
    pub async fn manifest_exists(&self, reference: &str, probe: ExistenceProbe) -> Result<bool> {
        let url = self.manifest_url(reference);
        let request = match probe {
            ExistenceProbe::Head => self.client.head(&url).header(ACCEPT, MANIFEST_ACCEPT),
            ExistenceProbe::OciGet => self.client.get(&url).header(ACCEPT, OCI_MANIFEST),
        };
        let response = self
            .auth
            .apply(request.timeout(self.timeout))
            .send()
            .await
            .map_err(|e| {
                NetworkErrorHandler::handle_network_error(&e, "manifest existence check")
            })?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::UNAUTHORIZED => Err(RegistryError::Auth(format!(
                "not authorized to read {}",
                url
            ))),
            other => Err(RegistryError::Transport(format!(
                "existence check for {} failed with status {}",
                url, other
            ))),
        }
    }
}
