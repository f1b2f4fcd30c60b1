//! Chart pull and push across the three backend flavors
//!
//! Pull: OCI sources are reassembled from their layers, legacy index sources are downloaded
//! as-is. Push: OCI targets get a config+layer+manifest triple, raw-upload targets a single
//! multipart POST.

use crate::artifact::{Artifact, ArtifactHandler, PushReceipt, WorkArea};
use crate::chart::index::HelmIndex;
use crate::chart::package::{ChartLayer, ChartPackage, assemble_layers};
use crate::cli::config::AuthConfig;
use crate::common::PathUtils;
use crate::digest::DigestUtils;
use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::image::manifest::{Descriptor, HELM_CHART_CONTENT, HELM_CONFIG, Manifest, OCI_MANIFEST};
use crate::registry::auth::{AccessScope, AuthHeaders};
use crate::registry::classifier::RegistryClassifier;
use crate::registry::client::RegistryClient;
use crate::registry::endpoint::{RegistryEndpoint, RegistryFlavor};
use crate::registry::operations::{BlobSource, ExistenceProbe};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub struct ChartTransfer {
    client: RegistryClient,
    artifact: Artifact,
    source: RegistryEndpoint,
    /// Chart path below the source, e.g. `demo` or `bitnami/redis`
    source_chart: String,
    version: String,
    target: RegistryEndpoint,
    target_repo: String,
    source_creds: AuthConfig,
    target_creds: AuthConfig,
}

impl ChartTransfer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: RegistryClient,
        artifact: Artifact,
        source: RegistryEndpoint,
        source_chart: impl Into<String>,
        target: RegistryEndpoint,
        target_repo: impl Into<String>,
        source_creds: AuthConfig,
        target_creds: AuthConfig,
    ) -> Self {
        let version = artifact.version.clone();
        Self {
            client,
            artifact,
            source,
            source_chart: source_chart.into().trim_matches('/').to_string(),
            version,
            target,
            target_repo: target_repo.into().trim_matches('/').to_string(),
            source_creds,
            target_creds,
        }
    }

    /// Last path segment of the source chart
    pub fn chart_name(&self) -> &str {
        self.source_chart
            .rsplit('/')
            .next()
            .unwrap_or(&self.source_chart)
    }

    fn package_name(&self) -> String {
        ChartPackage::file_name(self.chart_name(), &self.version)
    }

    /// Target repository for a chart called `name`
    fn target_repository(&self, name: &str) -> String {
        if self.target_repo.is_empty() {
            self.target.repository(name)
        } else {
            self.target
                .repository(&format!("{}/{}", self.target_repo, name))
        }
    }

    /// Classify the source and stage `{dir}/{name}-{version}.tgz`
    pub async fn pull_into(&self, dir: &Path) -> Result<PathBuf> {
        PathUtils::ensure_dir_exists(dir)?;
        match self.classify().await {
            RegistryFlavor::Oci => self.pull_oci(dir).await,
            _ => self.pull_legacy(dir).await,
        }
    }

    pub async fn pull_oci(&self, dir: &Path) -> Result<PathBuf> {
        let output = self.client.output();
        let repository = self.source.repository(&self.source_chart);
        let auth = self
            .client
            .auth_broker()
            .authorize(
                &self.source,
                &repository,
                &self.version,
                &self.source_creds,
                AccessScope::Pull,
            )
            .await?;

        let fetched = self
            .client
            .manifests(&self.source, &repository, &auth)
            .fetch_manifest(&self.version, &self.client.transport().architecture)
            .await?;

        let layer_dir = dir.join("layers");
        PathUtils::ensure_dir_exists(&layer_dir)?;
        let blobs = self.client.blobs(&self.source, &repository, &auth);
        let mut layers = Vec::with_capacity(fetched.manifest.layers.len());
        for layer in &fetched.manifest.layers {
            let path = blobs
                .download_blob(&layer.digest, Some(layer.size), &layer_dir)
                .await
                .map_err(|e| e.context(&format!("chart layer {}", layer.digest)))?;
            layers.push(ChartLayer {
                path,
                media_type: layer.media_type.clone(),
            });
        }

        let package = dir.join(self.package_name());
        let members = assemble_layers(&layers, &package)?;
        output.detail(&format!(
            "Assembled {} members from {} layers",
            members,
            layers.len()
        ));
        output.success(&format!(
            "Pulled {}:{} from {}",
            self.source_chart, self.version, self.source.root_url()
        ));
        Ok(package)
    }

    pub async fn pull_legacy(&self, dir: &Path) -> Result<PathBuf> {
        let output = self.client.output();
        let http = self.client.http();
        let auth = AuthHeaders::basic(&self.source_creds);
        let base = self.source.base_url();

        let index_url = format!("{}/index.yaml", base);
        output.verbose(&format!("Fetching {}", index_url));
        let request = http
            .get(&index_url)
            .timeout(self.client.transport().metadata_timeout());
        let response = auth
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "index fetch"))?;
        if !response.status().is_success() {
            return Err(HttpErrorHandler::from_response(response, "index.yaml").await);
        }
        let text = response
            .text()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "index read"))?;

        let index = HelmIndex::parse(&text)?;
        let chart_url = index
            .find(&self.source_chart, &self.version)?
            .download_url(&base)?;

        // Credentials only go to the repository's own host
        let request = http.get(&chart_url);
        let request = if chart_url.starts_with(&format!("{}/", self.source.root_url())) {
            auth.apply(request)
        } else {
            request
        };
        output.verbose(&format!("Downloading {}", chart_url));
        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "chart download"))?;
        if !response.status().is_success() {
            return Err(HttpErrorHandler::from_response(response, &chart_url).await);
        }

        let package = dir.join(self.package_name());
        let mut file = tokio::fs::File::create(&package).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| NetworkErrorHandler::handle_network_error(&e, "chart download"))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        output.success(&format!(
            "Pulled {}:{} ({})",
            self.source_chart,
            self.version,
            output.format_size(written)
        ));
        Ok(package)
    }

    /// Push a staged `.tgz` according to the target flavor
    pub async fn push_package(&self, path: &Path) -> Result<PushReceipt> {
        let chart = ChartPackage::inspect(path)?;
        match self.target.flavor {
            RegistryFlavor::Oci => self.push_oci(&chart).await,
            RegistryFlavor::RawUpload => self.push_raw(&chart).await,
            RegistryFlavor::LegacyIndex => Err(RegistryError::Validation(format!(
                "cannot push to legacy index repository {}",
                self.target.base_url()
            ))),
        }
    }

    async fn push_oci(&self, chart: &ChartPackage) -> Result<PushReceipt> {
        let output = self.client.output();
        let repository = self.target_repository(&chart.name);
        let auth = self
            .client
            .auth_broker()
            .authorize(
                &self.target,
                &repository,
                &chart.version,
                &self.target_creds,
                AccessScope::Push,
            )
            .await?;
        let blobs = self.client.blobs(&self.target, &repository, &auth);

        let config = chart.config_blob()?;
        let config_descriptor = Descriptor::new(
            HELM_CONFIG,
            DigestUtils::compute_digest(&config),
            config.len() as u64,
        );
        blobs
            .upload_blob(BlobSource::Bytes(config), &config_descriptor.digest, HELM_CONFIG)
            .await
            .map_err(|e| e.context("chart config"))?;

        let (digest, size) = chart.digest().await?;
        let content_descriptor = Descriptor::new(HELM_CHART_CONTENT, digest, size);
        blobs
            .upload_blob(
                BlobSource::File(chart.path.clone()),
                &content_descriptor.digest,
                HELM_CHART_CONTENT,
            )
            .await
            .map_err(|e| e.context("chart content"))?;

        let manifest = Manifest::oci(config_descriptor, vec![content_descriptor]);
        let reference = self
            .client
            .manifests(&self.target, &repository, &auth)
            .put_manifest(&chart.version, OCI_MANIFEST, manifest.to_json()?)
            .await?;

        let location = format!(
            "{}/{}:{}",
            self.target.root_url(),
            repository,
            chart.version
        );
        output.success(&format!("Pushed {}", location));
        Ok(PushReceipt {
            reference,
            message: location,
        })
    }

    async fn push_raw(&self, chart: &ChartPackage) -> Result<PushReceipt> {
        let output = self.client.output();
        let upload_url = format!(
            "{}/repository/{}/",
            self.target.base_url(),
            self.target_repo
        );
        let data = tokio::fs::read(&chart.path).await?;
        let file_name = ChartPackage::file_name(&chart.name, &chart.version);
        output.verbose(&format!(
            "Uploading {} ({}) to {}",
            file_name,
            output.format_size(data.len() as u64),
            upload_url
        ));

        let form = Form::new().part("file", Part::bytes(data).file_name(file_name));
        let request = self.client.http().post(&upload_url).multipart(form);
        let response = AuthHeaders::basic(&self.target_creds)
            .apply(request)
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, "raw upload"))?;
        if !response.status().is_success() {
            return Err(HttpErrorHandler::from_response(response, "raw repository upload").await);
        }

        output.success(&format!(
            "Pushed {}:{} to {}",
            chart.name, chart.version, upload_url
        ));
        Ok(PushReceipt {
            reference: format!("{}/{}/{}", self.target_repo, chart.name, chart.version),
            message: format!(
                "Successfully pushed {}:{} to raw repository",
                chart.name, chart.version
            ),
        })
    }
}

#[async_trait]
impl ArtifactHandler for ChartTransfer {
    fn artifact(&self) -> &Artifact {
        &self.artifact
    }

    async fn classify(&self) -> RegistryFlavor {
        RegistryClassifier::new(&self.client)
            .classify(&self.source, &AuthHeaders::basic(&self.source_creds))
            .await
            .pull_flavor()
    }

    async fn exists_on_target(&self) -> Result<bool> {
        if self.target.flavor != RegistryFlavor::Oci {
            return Ok(false);
        }
        let repository = self.target_repository(self.chart_name());
        let auth = self
            .client
            .auth_broker()
            .authorize(
                &self.target,
                &repository,
                &self.version,
                &self.target_creds,
                AccessScope::Push,
            )
            .await?;
        self.client
            .manifests(&self.target, &repository, &auth)
            .manifest_exists(&self.version, ExistenceProbe::OciGet)
            .await
    }

    async fn pull(&self, area: &WorkArea) -> Result<PathBuf> {
        self.pull_into(area.path()).await
    }

    async fn push(&self, staged: &Path) -> Result<PushReceipt> {
        self.push_package(staged).await
    }
}
