//! Image pull and push
//!
//! A pulled image is staged as `manifest.json` (the exact bytes the source served),
//! `config.json` and one digest-named file per layer. Push replays that directory:
//! config blob, layer blobs, then the manifest.

use crate::artifact::{Artifact, ArtifactHandler, PushReceipt, WorkArea};
use crate::cli::config::AuthConfig;
use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::image::manifest::{Manifest, ManifestType, effective_media_type};
use crate::image::reference::ImageReference;
use crate::registry::auth::{AccessScope, AuthHeaders};
use crate::registry::client::RegistryClient;
use crate::registry::endpoint::RegistryFlavor;
use crate::registry::operations::{BlobSource, ExistenceProbe, UploadOutcome};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const CONFIG_FILE: &str = "config.json";

pub struct ImageTransfer {
    client: RegistryClient,
    artifact: Artifact,
    source: ImageReference,
    target: ImageReference,
    source_creds: AuthConfig,
    target_creds: AuthConfig,
    architecture: String,
}

impl ImageTransfer {
    pub fn new(
        client: RegistryClient,
        artifact: Artifact,
        source: ImageReference,
        target: ImageReference,
        source_creds: AuthConfig,
        target_creds: AuthConfig,
    ) -> Self {
        let architecture = client.transport().architecture.clone();
        Self {
            client,
            artifact,
            source,
            target,
            source_creds,
            target_creds,
            architecture,
        }
    }

    pub fn with_architecture(mut self, architecture: impl Into<String>) -> Self {
        self.architecture = architecture.into();
        self
    }

    async fn authorize(
        &self,
        image: &ImageReference,
        creds: &AuthConfig,
        access: AccessScope,
    ) -> Result<AuthHeaders> {
        self.client
            .auth_broker()
            .authorize(
                &image.endpoint(),
                &image.repository,
                &image.reference,
                creds,
                access,
            )
            .await
    }

    /// Pull `source` into `dir`
    pub async fn pull_into(&self, dir: &Path) -> Result<()> {
        let output = self.client.output();
        let auth = self
            .authorize(&self.source, &self.source_creds, AccessScope::Pull)
            .await?;
        let endpoint = self.source.endpoint();

        let fetched = self
            .client
            .manifests(&endpoint, &self.source.repository, &auth)
            .fetch_manifest(&self.source.reference, &self.architecture)
            .await?;
        tokio::fs::write(dir.join(MANIFEST_FILE), &fetched.raw).await?;

        let blobs = self.client.blobs(&endpoint, &self.source.repository, &auth);
        let total = fetched.manifest.layers.len();
        for (i, layer) in fetched.manifest.layers.iter().enumerate() {
            output.step(&format!(
                "Layer {}/{}: {} ({})",
                i + 1,
                total,
                DigestUtils::format_digest_short(&layer.digest),
                output.format_size(layer.size)
            ));
            blobs
                .download_blob(&layer.digest, Some(layer.size), dir)
                .await
                .map_err(|e| e.context(&format!("layer {}", layer.digest)))?;
        }

        if let Some(config) = &fetched.manifest.config {
            blobs
                .download_blob_to(&config.digest, Some(config.size), &dir.join(CONFIG_FILE))
                .await
                .map_err(|e| e.context("image config"))?;
        }

        output.success(&format!("Pulled {} ({} layers)", self.source, total));
        Ok(())
    }

    /// Push a directory staged by [`Self::pull_into`] to `target`
    pub async fn push_from(&self, dir: &Path) -> Result<PushReceipt> {
        let output = self.client.output();
        let raw = tokio::fs::read(dir.join(MANIFEST_FILE)).await.map_err(|e| {
            RegistryError::Io(format!("staged manifest missing in {}: {}", dir.display(), e))
        })?;
        let media_type = effective_media_type(&raw, None)?;
        if !ManifestType::from_media_type(&media_type).is_supported_manifest() {
            return Err(RegistryError::UnsupportedFormat(format!(
                "staged manifest has media type '{}'",
                media_type
            )));
        }
        let manifest: Manifest = serde_json::from_slice(&raw)?;

        let auth = self
            .authorize(&self.target, &self.target_creds, AccessScope::Push)
            .await?;
        let endpoint = self.target.endpoint();
        let blobs = self.client.blobs(&endpoint, &self.target.repository, &auth);

        let mut uploaded = 0usize;
        if let Some(config) = &manifest.config {
            let outcome = blobs
                .upload_blob(
                    BlobSource::File(dir.join(CONFIG_FILE)),
                    &config.digest,
                    &config.media_type,
                )
                .await
                .map_err(|e| e.context("image config"))?;
            uploaded += usize::from(outcome == UploadOutcome::Uploaded);
        }

        for layer in &manifest.layers {
            let path = dir.join(DigestUtils::blob_file_name(&layer.digest));
            if !path.is_file() {
                return Err(RegistryError::Io(format!(
                    "staged layer {} is missing",
                    layer.digest
                )));
            }
            let outcome = blobs
                .upload_blob(BlobSource::File(path), &layer.digest, &layer.media_type)
                .await
                .map_err(|e| e.context(&format!("layer {}", layer.digest)))?;
            uploaded += usize::from(outcome == UploadOutcome::Uploaded);
        }

        let digest = self
            .client
            .manifests(&endpoint, &self.target.repository, &auth)
            .put_manifest(&self.target.reference, &media_type, raw)
            .await?;

        output.success(&format!(
            "Pushed {} ({} new blobs)",
            self.target, uploaded
        ));
        Ok(PushReceipt {
            reference: digest,
            message: format!("synced tag: {}", self.target),
        })
    }
}

#[async_trait]
impl ArtifactHandler for ImageTransfer {
    fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    async fn classify(&self) -> RegistryFlavor {
        RegistryFlavor::Oci
    }

    async fn exists_on_target(&self) -> Result<bool> {
        let auth = self
            .authorize(&self.target, &self.target_creds, AccessScope::Push)
            .await?;
        self.client
            .manifests(&self.target.endpoint(), &self.target.repository, &auth)
            .manifest_exists(&self.target.reference, ExistenceProbe::Head)
            .await
    }

    async fn pull(&self, area: &WorkArea) -> Result<PathBuf> {
        let dir = area.subdir(&self.source.folder_name())?;
        self.pull_into(&dir).await?;
        Ok(dir)
    }

    async fn push(&self, staged: &Path) -> Result<PushReceipt> {
        self.push_from(staged).await
    }
}
