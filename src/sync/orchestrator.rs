//! Sequential sync of every configured resource
//!
//! Each image tag and chart version is one artifact: existence check, push policy, optional
//! gate, then pull into a fresh work area and push. Failures become result records and the
//! run moves on to the next artifact.

use crate::artifact::{Artifact, ArtifactHandler, ArtifactKind, PushReceipt, WorkArea};
use crate::chart::ChartTransfer;
use crate::cli::sync_config::{
    ChartResource, Credentials, GitResource, ImageResource, ResourceConfig, SyncConfig,
    TargetRepoType,
};
use crate::error::Result;
use crate::image::reference::ImageReference;
use crate::image::transfer::ImageTransfer;
use crate::logging::Logger;
use crate::registry::client::RegistryClient;
use crate::registry::endpoint::{RegistryEndpoint, RegistryFlavor};
use crate::sync::gate::{GateRegistry, PushGate};
use crate::sync::report::{SyncReport, SyncResult};
use std::sync::Arc;

pub struct SyncOrchestrator {
    client: RegistryClient,
    credentials: Credentials,
    gates: GateRegistry,
    output: Logger,
}

impl SyncOrchestrator {
    pub fn new(client: RegistryClient, credentials: Credentials) -> Self {
        let output = client.output().clone();
        Self {
            client,
            credentials,
            gates: GateRegistry::new(),
            output,
        }
    }

    pub fn with_gates(mut self, gates: GateRegistry) -> Self {
        self.gates = gates;
        self
    }

    /// Images first, then charts, then the ignored git resources
    pub async fn run(&self, config: &SyncConfig) -> SyncReport {
        let mut report = SyncReport::new();
        if !config.scanners.is_empty() {
            self.output.warning(&format!(
                "{} scanner definition(s) ignored; gates are registered programmatically",
                config.scanners.len()
            ));
        }

        for resource in &config.resources {
            if let ResourceConfig::Image(image) = resource {
                report.extend(self.sync_image(image).await);
            }
        }
        for resource in &config.resources {
            if let ResourceConfig::Helm(chart) = resource {
                report.extend(self.sync_chart(chart).await);
            }
        }
        for resource in &config.resources {
            if let ResourceConfig::Git(git) = resource {
                report.push(self.skip_git(git));
            }
        }
        report
    }

    pub async fn sync_image(&self, image: &ImageResource) -> Vec<SyncResult> {
        let kind = ArtifactKind::Image;
        self.output.subsection(&format!("image {}", image.source));

        let gate = match image.scan.as_deref().filter(|s| !s.is_empty()) {
            Some(name) => match self.gates.get(name) {
                Some(gate) => Some(gate),
                None => {
                    let msg =
                        format!("No scan config provided for scanning image: {}", image.source);
                    self.output.error(&msg);
                    return vec![SyncResult::failure(kind, &image.source, msg)];
                }
            },
            None => None,
        };

        if image.tags.is_empty() {
            let msg = format!("No tags specified for Docker image {}", image.source);
            self.output.error(&msg);
            return vec![SyncResult::failure(kind, &image.source, msg)];
        }

        let (source, target) = match (
            ImageReference::parse(&image.source),
            ImageReference::parse(&image.target),
        ) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(e), _) | (_, Err(e)) => {
                self.output.error(&e.to_string());
                return vec![SyncResult::from_error(kind, &image.source, &e)];
            }
        };
        let source_creds = self.credentials.image(&source.credential_aliases());
        let target_creds = self.credentials.image(&target.credential_aliases());

        let mut results = Vec::with_capacity(image.tags.len());
        for tag in &image.tags {
            let reference = format!("{}:{}", image.source, tag);
            self.output.step(&format!("processing image tag: {}", reference));
            let source = source.with_tag(tag);
            let target = target.with_tag(tag);
            let artifact = Artifact {
                kind,
                source_ref: image.source.clone(),
                target_ref: target.to_string(),
                version: tag.clone(),
                push_mode: image.push_mode,
            };
            let mut transfer = ImageTransfer::new(
                self.client.clone(),
                artifact,
                source.clone(),
                target,
                source_creds.clone(),
                target_creds.clone(),
            );
            if let Some(arch) = &image.architecture {
                transfer = transfer.with_architecture(arch.clone());
            }

            let skip_message = format!("skipping tag - already exists: {}", reference);
            let gate = gate.as_ref().map(|g| (g.clone(), source));
            results.push(
                self.process(&transfer, reference, skip_message, gate)
                    .await,
            );
        }
        results
    }

    pub async fn sync_chart(&self, chart: &ChartResource) -> Vec<SyncResult> {
        let kind = ArtifactKind::Chart;
        let resource_ref = format!("{} - {}", chart.source_registry, chart.source_chart);
        self.output.subsection(&format!("chart {}", chart.source_chart));

        if chart.versions.is_empty() {
            let msg = format!("No versions specified for Helm chart {}", chart.source_chart);
            self.output.error(&msg);
            return vec![SyncResult::failure(kind, resource_ref, msg)];
        }

        let endpoints = self.chart_endpoints(chart);
        let (source, target) = match endpoints {
            Ok(endpoints) => endpoints,
            Err(e) => {
                self.output.error(&e.to_string());
                return vec![SyncResult::from_error(kind, resource_ref, &e)];
            }
        };
        let source_creds = self.credentials.helm(source.hostname());
        let target_creds = self.credentials.helm(target.hostname());

        let mut results = Vec::with_capacity(chart.versions.len());
        for version in &chart.versions {
            let reference = format!("{}:{}", resource_ref, version);
            self.output.step(&format!(
                "processing chart version: {}:{}",
                chart.source_chart, version
            ));
            let artifact = Artifact {
                kind,
                source_ref: resource_ref.clone(),
                target_ref: format!("{}/{}", target.base_url(), chart.target_repo),
                version: version.clone(),
                push_mode: chart.push_mode,
            };
            let transfer = ChartTransfer::new(
                self.client.clone(),
                artifact,
                source.clone(),
                chart.source_chart.clone(),
                target.clone(),
                chart.target_repo.clone(),
                source_creds.clone(),
                target_creds.clone(),
            );
            let skip_message = format!(
                "skip chart upload - already exists: {} : {}",
                transfer.chart_name(),
                version
            );
            results.push(self.process(&transfer, reference, skip_message, None).await);
        }
        results
    }

    fn chart_endpoints(
        &self,
        chart: &ChartResource,
    ) -> Result<(RegistryEndpoint, RegistryEndpoint)> {
        // The source flavor is decided by classification at pull time
        let source = RegistryEndpoint::parse(&chart.source_registry, RegistryFlavor::Oci)?;
        let target_flavor = match chart.target_repo_type {
            TargetRepoType::Oci => RegistryFlavor::Oci,
            TargetRepoType::Nexus => RegistryFlavor::RawUpload,
        };
        let target = RegistryEndpoint::parse(&chart.target_registry, target_flavor)?;
        Ok((source, target))
    }

    fn skip_git(&self, git: &GitResource) -> SyncResult {
        let msg = format!("git resources are not synchronized: {}", git.source);
        self.output.warning(&msg);
        SyncResult::success(ArtifactKind::Git, &git.source, msg).uncounted()
    }

    /// Drive one artifact through check, policy, gate, pull and push
    async fn process(
        &self,
        handler: &dyn ArtifactHandler,
        reference: String,
        skip_message: String,
        gate: Option<(Arc<dyn PushGate>, ImageReference)>,
    ) -> SyncResult {
        let artifact = handler.artifact();
        let kind = artifact.kind;

        let exists = match handler.exists_on_target().await {
            Ok(exists) => exists,
            Err(e) => {
                self.output.error(&format!("existence check failed for {}: {}", reference, e));
                return SyncResult::from_error(kind, reference, &e);
            }
        };
        self.output.debug(&format!("{} exists on target: {}", reference, exists));

        if !artifact.push_mode.should_transfer(exists) {
            self.output.info(&skip_message);
            return SyncResult::success(kind, reference, skip_message);
        }

        if let Some((gate, image)) = gate {
            match gate.evaluate(&image, &artifact.version).await {
                Ok(verdict) if verdict.allowed => {
                    self.output.detail(&format!("gate passed: {}", verdict.message));
                }
                Ok(verdict) => {
                    self.output.error(&format!("gate denied {}: {}", reference, verdict.message));
                    return SyncResult::failure(kind, reference, verdict.message);
                }
                Err(e) => return SyncResult::from_error(kind, reference, &e),
            }
        }

        match self.transfer(handler).await {
            Ok(receipt) => {
                self.output.success(&receipt.message);
                SyncResult::success(kind, reference, receipt.message)
                    .with_target(receipt.reference)
            }
            Err(e) => {
                self.output.error(&format!("{}: {}", reference, e));
                SyncResult::from_error(kind, reference, &e)
            }
        }
    }

    async fn transfer(&self, handler: &dyn ArtifactHandler) -> Result<PushReceipt> {
        let area = WorkArea::acquire(&self.client.transport().work_dir)?;
        let outcome = match handler.pull(&area).await {
            Ok(staged) => handler.push(&staged).await,
            Err(e) => Err(e),
        };
        area.release(&self.output);
        let receipt = outcome?;
        self.output.verbose(&format!("target reference: {}", receipt.reference));
        Ok(receipt)
    }
}
