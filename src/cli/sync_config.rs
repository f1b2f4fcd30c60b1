//! Sync configuration and credential files
//!
//! Both come either as one YAML file or as a folder whose `*.yaml`/`*.yml` files are merged
//! in file-name order.

use crate::artifact::PushMode;
use crate::cli::config::AuthConfig;
use crate::common::deserialize_scalar_list;
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_image_push_mode() -> PushMode {
    PushMode::Force
}

fn default_chart_push_mode() -> PushMode {
    PushMode::Skip
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageResource {
    pub source: String,
    /// Fully qualified target name without tag
    pub target: String,
    #[serde(default = "default_image_push_mode")]
    pub push_mode: PushMode,
    /// Name of the push gate to consult
    #[serde(default)]
    pub scan: Option<String>,
    #[serde(default, deserialize_with = "deserialize_scalar_list")]
    pub tags: Vec<String>,
    /// Overrides the run-wide architecture
    #[serde(default)]
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetRepoType {
    #[default]
    Oci,
    /// Raw-upload artifact repository
    Nexus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChartResource {
    pub source_registry: String,
    pub source_chart: String,
    pub target_registry: String,
    pub target_repo: String,
    #[serde(default)]
    pub target_repo_type: TargetRepoType,
    #[serde(default, deserialize_with = "deserialize_scalar_list")]
    pub versions: Vec<String>,
    #[serde(default = "default_chart_push_mode")]
    pub push_mode: PushMode,
}

/// Accepted so existing files load; not synchronized
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GitResource {
    #[serde(default)]
    pub source: String,
    #[serde(flatten)]
    pub rest: serde_yaml::Mapping,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceConfig {
    Image(ImageResource),
    Helm(ChartResource),
    Git(GitResource),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScannerConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(flatten)]
    pub settings: serde_yaml::Mapping,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
    #[serde(default)]
    pub scanners: Vec<ScannerConfig>,
}

impl SyncConfig {
    pub fn parse(text: &str) -> Result<Self> {
        // An empty document is an empty config
        let parsed: Option<SyncConfig> = serde_yaml::from_str(text)?;
        Ok(parsed.unwrap_or_default())
    }

    pub fn load_file(path: &Path, output: &Logger) -> Result<Self> {
        output.info(&format!("loading config file: {}", path.display()));
        let text = read_text(path)?;
        let config = Self::parse(&text).map_err(|e| e.context(&path.display().to_string()))?;
        if config.resources.is_empty() && config.scanners.is_empty() {
            output.warning(&format!("config file {} is empty", path.display()));
        }
        Ok(config)
    }

    pub fn load_folder(dir: &Path, output: &Logger) -> Result<Self> {
        let mut merged = SyncConfig::default();
        for path in yaml_files(dir)? {
            let config = Self::load_file(&path, output)?;
            merged.resources.extend(config.resources);
            merged.scanners.extend(config.scanners);
        }
        Ok(merged)
    }

    /// Drop repeated resources (same image source; same chart registry and chart)
    pub fn dedup_resources(&mut self, output: &Logger) {
        let mut kept: Vec<ResourceConfig> = Vec::with_capacity(self.resources.len());
        for resource in self.resources.drain(..) {
            let duplicate = kept.iter().any(|k| match (k, &resource) {
                (ResourceConfig::Image(a), ResourceConfig::Image(b)) => a.source == b.source,
                (ResourceConfig::Helm(a), ResourceConfig::Helm(b)) => {
                    a.source_registry == b.source_registry && a.source_chart == b.source_chart
                }
                _ => false,
            });
            if duplicate {
                let name = match &resource {
                    ResourceConfig::Image(i) => i.source.clone(),
                    ResourceConfig::Helm(c) => {
                        format!("{} - {}", c.source_registry, c.source_chart)
                    }
                    ResourceConfig::Git(g) => g.source.clone(),
                };
                output.warning(&format!("duplicate resource ignored: {}", name));
            } else {
                kept.push(resource);
            }
        }
        self.resources = kept;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NamedCredential {
    pub name: String,
    #[serde(flatten)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CredentialsFile {
    #[serde(default)]
    pub image: Vec<NamedCredential>,
    #[serde(default)]
    pub helm: Vec<NamedCredential>,
    #[serde(default)]
    pub git: Vec<serde_yaml::Value>,
    #[serde(default)]
    pub scanners: Vec<serde_yaml::Value>,
}

impl CredentialsFile {
    pub fn parse(text: &str) -> Result<Self> {
        let parsed: Option<CredentialsFile> = serde_yaml::from_str(text)?;
        Ok(parsed.unwrap_or_default())
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = read_text(path)?;
        Self::parse(&text).map_err(|e| e.context(&path.display().to_string()))
    }

    pub fn load_folder(dir: &Path) -> Result<Self> {
        let mut merged = CredentialsFile::default();
        for path in yaml_files(dir)? {
            let file = Self::load_file(&path)?;
            merged.image.extend(file.image);
            merged.helm.extend(file.helm);
            merged.git.extend(file.git);
            merged.scanners.extend(file.scanners);
        }
        Ok(merged)
    }
}

/// Credential lookup by registry alias
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    image: Vec<NamedCredential>,
    helm: Vec<NamedCredential>,
}

impl Credentials {
    /// First definition of a name wins; later ones are reported and ignored
    pub fn from_file(file: CredentialsFile, output: &Logger) -> Self {
        let keep_first = |entries: Vec<NamedCredential>, kind: &str| {
            let mut kept: Vec<NamedCredential> = Vec::new();
            for entry in entries {
                if kept.iter().any(|k| k.name == entry.name) {
                    output.warning(&format!(
                        "ignoring duplicate {} credential: {}",
                        kind, entry.name
                    ));
                } else {
                    kept.push(entry);
                }
            }
            kept
        };
        Self {
            image: keep_first(file.image, "image"),
            helm: keep_first(file.helm, "helm"),
        }
    }

    /// Anonymous when no alias matches
    pub fn image(&self, aliases: &[String]) -> AuthConfig {
        lookup(&self.image, aliases)
    }

    pub fn helm(&self, hostname: &str) -> AuthConfig {
        lookup(&self.helm, &[hostname.to_string()])
    }
}

fn lookup(entries: &[NamedCredential], aliases: &[String]) -> AuthConfig {
    aliases
        .iter()
        .find_map(|alias| entries.iter().find(|c| &c.name == alias))
        .map(|c| c.auth.clone())
        .unwrap_or_default()
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| RegistryError::Config(format!("cannot read {}: {}", path.display(), e)))
}

fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        RegistryError::Config(format!("cannot read folder {}: {}", dir.display(), e))
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
resources:
  - type: image
    source: nginx
    target: harbor.local/mirror/nginx
    tags: ["1.27", latest]
  - type: helm
    source_registry: https://charts.example.com
    source_chart: demo
    target_registry: nexus.local
    target_repo: helm-hosted
    target_repo_type: nexus
    versions: [9.9.9, 1.0]
  - type: git
    source: git@example.com:org/repo.git
    target: git@mirror.local:org/repo.git
scanners:
  - name: trivy
    type: neuvector
    url: https://scanner.local
"#;

    #[test]
    fn parses_all_resource_kinds_with_defaults() {
        let config = SyncConfig::parse(CONFIG).unwrap();
        assert_eq!(config.resources.len(), 3);
        match &config.resources[0] {
            ResourceConfig::Image(image) => {
                assert_eq!(image.push_mode, PushMode::Force);
                assert_eq!(image.tags, vec!["1.27", "latest"]);
                assert_eq!(image.scan, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &config.resources[1] {
            ResourceConfig::Helm(chart) => {
                assert_eq!(chart.push_mode, PushMode::Skip);
                assert_eq!(chart.target_repo_type, TargetRepoType::Nexus);
                assert_eq!(chart.versions, vec!["9.9.9", "1.0"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(config.resources[2], ResourceConfig::Git(_)));
        assert_eq!(config.scanners[0].name, "trivy");
    }

    #[test]
    fn empty_document_is_empty_config() {
        assert_eq!(SyncConfig::parse("").unwrap(), SyncConfig::default());
    }

    #[test]
    fn duplicates_are_dropped() {
        let mut config = SyncConfig::parse(CONFIG).unwrap();
        let again = SyncConfig::parse(CONFIG).unwrap();
        config.resources.extend(again.resources);
        config.dedup_resources(&Logger::new_quiet());
        // git resources are never considered duplicates
        assert_eq!(config.resources.len(), 4);
    }

    #[test]
    fn folder_merges_yaml_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), CONFIG).unwrap();
        std::fs::write(
            dir.path().join("b.yml"),
            "resources:\n  - type: image\n    source: redis\n    target: h/redis\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "resources: nope").unwrap();
        let config = SyncConfig::load_folder(dir.path(), &Logger::new_quiet()).unwrap();
        assert_eq!(config.resources.len(), 4);
    }

    #[test]
    fn credential_lookup_first_wins_and_defaults_to_anonymous() {
        let file = CredentialsFile::parse(
            r#"
image:
  - {name: harbor.local, username: a, password: one}
  - {name: harbor.local, username: b, password: two}
helm:
  - {name: charts.example.com, username: h, password: p}
"#,
        )
        .unwrap();
        let creds = Credentials::from_file(file, &Logger::new_quiet());
        assert_eq!(creds.image(&["harbor.local".to_string()]).username, "a");
        assert_eq!(creds.helm("charts.example.com").password, "p");
        assert_eq!(creds.helm("unknown"), AuthConfig::anonymous());
    }
}
