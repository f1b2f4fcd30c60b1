//! Legacy Helm repository index (`index.yaml`)

use crate::common::deserialize_scalar;
use crate::error::{RegistryError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct HelmIndex {
    #[serde(default)]
    pub entries: HashMap<String, Vec<IndexEntry>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexEntry {
    #[serde(deserialize_with = "deserialize_scalar")]
    pub version: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

impl HelmIndex {
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| RegistryError::Parse(format!("invalid index.yaml: {}", e)))
    }

    /// Exact-match lookup of a chart version
    pub fn find(&self, chart: &str, version: &str) -> Result<&IndexEntry> {
        let versions = self.entries.get(chart).ok_or_else(|| {
            RegistryError::NotFound(format!("chart {} not found in repository", chart))
        })?;
        versions.iter().find(|e| e.version == version).ok_or_else(|| {
            RegistryError::NotFound(format!("version {} not found for chart {}", version, chart))
        })
    }
}

impl IndexEntry {
    /// The first download URL, resolved against the repository base when relative
    pub fn download_url(&self, repo_base: &str) -> Result<String> {
        let url = self.urls.first().ok_or_else(|| {
            RegistryError::NotFound(format!("version {} lists no download URL", self.version))
        })?;
        resolve_chart_url(repo_base, url)
    }
}

pub fn resolve_chart_url(repo_base: &str, url: &str) -> Result<String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        return Ok(url.to_string());
    }
    // Trailing slash keeps the last base segment when joining
    let base = Url::parse(&format!("{}/", repo_base.trim_end_matches('/')))?;
    Ok(base.join(url.trim_start_matches("./"))?.to_string())
}
