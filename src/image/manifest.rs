//! Manifest model shared by images and charts
//!
//! Docker v2 and OCI manifests have the same shape for our purposes: a config descriptor
//! and an ordered list of layer descriptors. Lists/indexes enumerate per-platform manifests.

use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DOCKER_MANIFEST_V2: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

pub const HELM_CONFIG: &str = "application/vnd.cncf.helm.config.v1+json";
pub const HELM_CHART_CONTENT: &str = "application/vnd.cncf.helm.chart.content.v1.tar+gzip";
pub const HELM_PROVENANCE: &str = "application/vnd.cncf.helm.chart.provenance.v1.prov";

/// `Accept` header value listing every manifest type we can resolve
pub const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestType {
    DockerV2,
    DockerList,
    OciManifest,
    OciIndex,
    Unknown,
}

impl ManifestType {
    pub fn from_media_type(media_type: &str) -> Self {
        // Content-Type headers may carry parameters
        let media_type = media_type.split(';').next().unwrap_or("").trim();
        match media_type {
            DOCKER_MANIFEST_V2 => ManifestType::DockerV2,
            DOCKER_MANIFEST_LIST => ManifestType::DockerList,
            OCI_MANIFEST => ManifestType::OciManifest,
            OCI_INDEX => ManifestType::OciIndex,
            _ => ManifestType::Unknown,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, ManifestType::DockerList | ManifestType::OciIndex)
    }

    /// Single-artifact manifests that can be transferred
    pub fn is_supported_manifest(&self) -> bool {
        matches!(self, ManifestType::DockerV2 | ManifestType::OciManifest)
    }
}

/// Pointer to a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, digest: impl Into<String>, size: u64) -> Self {
        Self {
            media_type: media_type.into(),
            digest: digest.into(),
            size,
            annotations: None,
        }
    }

    /// Digests come from remote documents and end up in file names
    pub fn validate(&self) -> Result<()> {
        check_digest(&self.digest)
    }
}

fn check_digest(digest: &str) -> Result<()> {
    if DigestUtils::is_valid_digest(digest) {
        Ok(())
    } else {
        Err(RegistryError::Parse(format!("invalid digest '{}'", digest)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
}

impl Manifest {
    /// OCI image manifest with the given config and layers
    pub fn oci(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: Some(OCI_MANIFEST.to_string()),
            config: Some(config),
            layers,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != 2 {
            return Err(RegistryError::UnsupportedFormat(format!(
                "unsupported manifest schema version {}",
                self.schema_version
            )));
        }
        for descriptor in self.config.iter().chain(&self.layers) {
            descriptor.validate()?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformManifest {
    #[serde(default)]
    pub media_type: Option<String>,
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestIndex {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: Option<String>,
    pub manifests: Vec<PlatformManifest>,
}

impl ManifestIndex {
    /// First entry for `architecture` in document order; no fallback to another platform
    pub fn select_platform(&self, architecture: &str) -> Result<&PlatformManifest> {
        let entry = self
            .manifests
            .iter()
            .find(|m| {
                m.platform
                    .as_ref()
                    .is_some_and(|p| p.architecture == architecture)
            })
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "no matching manifest for architecture {}",
                    architecture
                ))
            })?;
        check_digest(&entry.digest)?;
        Ok(entry)
    }
}

/// A parsed manifest response
#[derive(Debug, Clone)]
pub enum ManifestDocument {
    Single(Manifest),
    Index(ManifestIndex),
}

/// Effective media type: the document's own field, else the response Content-Type, else an
/// OCI image manifest
pub fn effective_media_type(data: &[u8], content_type: Option<&str>) -> Result<String> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Declared {
        #[serde(default)]
        media_type: Option<String>,
    }

    let declared: Declared = serde_json::from_slice(data)
        .map_err(|e| RegistryError::Parse(format!("manifest is not valid JSON: {}", e)))?;
    let from_header = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_string())
        .filter(|ct| !ct.is_empty());
    Ok(declared
        .media_type
        .or(from_header)
        .unwrap_or_else(|| OCI_MANIFEST.to_string()))
}

impl ManifestDocument {
    pub fn parse(data: &[u8], media_type: &str) -> Result<Self> {
        let parsed = if ManifestType::from_media_type(media_type).is_index() {
            ManifestDocument::Index(serde_json::from_slice(data).map_err(|e| {
                RegistryError::Parse(format!("invalid manifest list: {}", e))
            })?)
        } else {
            ManifestDocument::Single(
                serde_json::from_slice(data)
                    .map_err(|e| RegistryError::Parse(format!("invalid manifest: {}", e)))?,
            )
        };
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"{
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.index.v1+json",
        "manifests": [
            {"digest": "sha256:AAA", "platform": {"architecture": "amd64", "os": "linux"}},
            {"digest": "sha256:BBB", "platform": {"architecture": "arm64", "os": "linux"}},
            {"digest": "sha256:CCC", "platform": {"architecture": "arm64", "os": "linux", "variant": "v8"}},
            {"digest": "sha256:aaaaaaaaaaaééé", "platform": {"architecture": "s390x", "os": "linux"}}
        ]
    }"#;

    fn digest(c: char) -> String {
        format!("sha256:{}", c.to_string().repeat(64))
    }

    fn index() -> ManifestIndex {
        let json = INDEX
            .replace("sha256:AAA", &digest('a'))
            .replace("sha256:BBB", &digest('b'))
            .replace("sha256:CCC", &digest('c'));
        match ManifestDocument::parse(json.as_bytes(), OCI_INDEX).unwrap() {
            ManifestDocument::Index(index) => index,
            other => panic!("expected index, got {:?}", other),
        }
    }

    #[test]
    fn selects_first_matching_platform() {
        assert_eq!(index().select_platform("arm64").unwrap().digest, digest('b'));
    }

    #[test]
    fn malformed_entry_digest_is_rejected() {
        let err = index().select_platform("s390x").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn malformed_layer_digest_fails_validation() {
        let good = Manifest::oci(
            Descriptor::new(HELM_CONFIG, digest('c'), 10),
            vec![Descriptor::new(HELM_CHART_CONTENT, digest('d'), 20)],
        );
        assert!(good.validate().is_ok());

        let mut bad = good.clone();
        bad.layers[0].digest = "sha256:../../etc/passwd".to_string();
        assert_eq!(bad.validate().unwrap_err().kind(), crate::error::ErrorKind::Parse);
    }

    #[test]
    fn missing_platform_fails_closed() {
        let err = index().select_platform("riscv64").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn media_type_falls_back_to_content_type() {
        let body = br#"{"schemaVersion":2,"layers":[]}"#;
        assert_eq!(
            effective_media_type(body, Some(&format!("{}; charset=utf-8", DOCKER_MANIFEST_V2)))
                .unwrap(),
            DOCKER_MANIFEST_V2
        );
        assert_eq!(
            effective_media_type(br#"{"mediaType":"x/y"}"#, Some(OCI_MANIFEST)).unwrap(),
            "x/y"
        );
        assert_eq!(effective_media_type(body, None).unwrap(), OCI_MANIFEST);
        assert_eq!(effective_media_type(body, Some("")).unwrap(), OCI_MANIFEST);
    }

    #[test]
    fn manifest_type_classification() {
        assert!(ManifestType::from_media_type(DOCKER_MANIFEST_LIST).is_index());
        assert!(ManifestType::from_media_type(OCI_MANIFEST).is_supported_manifest());
        assert!(!ManifestType::from_media_type(
            "application/vnd.docker.distribution.manifest.v1+prettyjws"
        )
        .is_supported_manifest());
    }

    #[test]
    fn oci_manifest_serializes_camel_case() {
        let manifest = Manifest::oci(
            Descriptor::new(HELM_CONFIG, "sha256:c", 10),
            vec![Descriptor::new(HELM_CHART_CONTENT, "sha256:l", 20)],
        );
        let value: serde_json::Value =
            serde_json::from_slice(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(value["schemaVersion"], 2);
        assert_eq!(value["mediaType"], OCI_MANIFEST);
        assert_eq!(value["layers"][0]["mediaType"], HELM_CHART_CONTENT);
        assert!(value["config"].get("annotations").is_none());
    }
}
