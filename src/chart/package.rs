//! Helm chart packages
//!
//! A chart package is a gzipped tarball with a `Chart.yaml` somewhere inside (normally
//! `<name>/Chart.yaml`). OCI-hosted charts arrive as one or more tar layers which are merged
//! back into a single package.

use crate::common::{PathUtils, scalar_string};
use crate::digest::DigestUtils;
use crate::error::{RegistryError, Result};
use crate::image::manifest::{HELM_CONFIG, HELM_PROVENANCE};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// A chart package on disk with its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartPackage {
    pub path: PathBuf,
    pub name: String,
    pub version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HelmConfig<'a> {
    media_type: &'a str,
    schema_version: u32,
    software: Software<'a>,
}

#[derive(Serialize)]
struct Software<'a> {
    name: &'a str,
    version: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

impl ChartPackage {
    /// Read name and version from the first `Chart.yaml` member
    pub fn inspect(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(RegistryError::Validation(format!(
                "chart file not found at {}",
                path.display()
            )));
        }
        if path.extension().and_then(|e| e.to_str()) != Some("tgz") {
            return Err(RegistryError::Validation(format!(
                "chart file must be a .tgz archive, got {}",
                path.display()
            )));
        }

        let file = File::open(path)?;
        let mut archive = tar::Archive::new(GzDecoder::new(BufReader::new(file)));
        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.path()?.to_string_lossy().ends_with("Chart.yaml") {
                continue;
            }
            let mut content = String::new();
            entry.read_to_string(&mut content)?;
            let doc: serde_yaml::Value = serde_yaml::from_str(&content)?;
            let field = |key: &str| {
                doc.get(key).and_then(scalar_string).ok_or_else(|| {
                    RegistryError::Parse(format!("Chart.yaml in {} has no {}", path.display(), key))
                })
            };
            return Ok(Self {
                path: path.to_path_buf(),
                name: field("name")?,
                version: field("version")?,
            });
        }

        Err(RegistryError::Parse(format!(
            "could not find Chart.yaml in {}",
            path.display()
        )))
    }

    /// `{name}-{version}.tgz`
    pub fn file_name(name: &str, version: &str) -> String {
        format!("{}-{}.tgz", name, version)
    }

    /// Synthetic OCI config blob describing this chart
    pub fn config_blob(&self) -> Result<Vec<u8>> {
        let config = HelmConfig {
            media_type: HELM_CONFIG,
            schema_version: 2,
            software: Software {
                name: &self.name,
                version: &self.version,
                kind: "helm",
            },
        };
        Ok(serde_json::to_vec(&config)?)
    }

    /// Digest and size of the package file
    pub async fn digest(&self) -> Result<(String, u64)> {
        DigestUtils::compute_file_digest(&self.path).await
    }
}

/// A downloaded chart layer and its media type
#[derive(Debug, Clone)]
pub struct ChartLayer {
    pub path: PathBuf,
    pub media_type: String,
}

/// Merge every member of every layer, in layer order, into one gzipped tarball.
///
/// Paths are not de-duplicated across layers. Provenance layers are not tar streams and
/// are left out.
pub fn assemble_layers(layers: &[ChartLayer], output: &Path) -> Result<usize> {
    if let Some(parent) = output.parent() {
        PathUtils::ensure_dir_exists(parent)?;
    }
    let file = File::create(output)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    let mut members = 0;

    for layer in layers.iter().filter(|l| l.media_type != HELM_PROVENANCE) {
        let mut magic = [0u8; 2];
        let gzipped = File::open(&layer.path)?
            .read(&mut magic)
            .map(|n| PathUtils::is_gzipped(&magic[..n]))?;
        let reader: Box<dyn Read> = if gzipped {
            Box::new(GzDecoder::new(BufReader::new(File::open(&layer.path)?)))
        } else {
            Box::new(BufReader::new(File::open(&layer.path)?))
        };

        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.into_owned();
            let mut header = entry.header().clone();
            builder.append_data(&mut header, &path, &mut entry)?;
            members += 1;
        }
    }

    builder.into_inner()?.finish()?;
    Ok(members)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::image::manifest::HELM_CHART_CONTENT;

    /// Write a gzipped chart with the given members
    pub(crate) fn write_chart(path: &Path, members: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn member_names(path: &Path) -> Vec<String> {
        let file = File::open(path).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(file));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn inspect_reads_chart_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo-1.0.tgz");
        write_chart(
            &path,
            &[
                ("demo/values.yaml", "replicas: 1\n"),
                ("demo/Chart.yaml", "apiVersion: v2\nname: demo\nversion: 1.0\n"),
            ],
        );
        let chart = ChartPackage::inspect(&path).unwrap();
        assert_eq!(chart.name, "demo");
        assert_eq!(chart.version, "1.0");
    }

    #[test]
    fn inspect_requires_tgz_and_chart_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let wrong_ext = dir.path().join("demo.tar");
        std::fs::write(&wrong_ext, b"").unwrap();
        assert_eq!(
            ChartPackage::inspect(&wrong_ext).unwrap_err().kind(),
            crate::error::ErrorKind::Validation
        );

        let no_meta = dir.path().join("x-1.tgz");
        write_chart(&no_meta, &[("x/values.yaml", "a: 1\n")]);
        assert_eq!(
            ChartPackage::inspect(&no_meta).unwrap_err().kind(),
            crate::error::ErrorKind::Parse
        );
    }

    #[test]
    fn config_blob_shape() {
        let chart = ChartPackage {
            path: PathBuf::from("mychart-1.2.3.tgz"),
            name: "mychart".to_string(),
            version: "1.2.3".to_string(),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&chart.config_blob().unwrap()).unwrap();
        assert_eq!(value["mediaType"], HELM_CONFIG);
        assert_eq!(value["schemaVersion"], 2);
        assert_eq!(value["software"]["name"], "mychart");
        assert_eq!(value["software"]["version"], "1.2.3");
        assert_eq!(value["software"]["type"], "helm");
    }

    #[test]
    fn layers_merge_in_order_without_dedup() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("l1");
        let second = dir.path().join("l2");
        write_chart(&first, &[("demo/Chart.yaml", "name: demo\nversion: 1\n"), ("demo/a", "1")]);
        write_chart(&second, &[("demo/b", "2"), ("demo/a", "3")]);
        let prov = dir.path().join("prov");
        std::fs::write(&prov, b"-----BEGIN PGP SIGNED MESSAGE-----").unwrap();

        let out = dir.path().join("out/demo-1.tgz");
        let layers = vec![
            ChartLayer {
                path: first,
                media_type: HELM_CHART_CONTENT.to_string(),
            },
            ChartLayer {
                path: prov,
                media_type: HELM_PROVENANCE.to_string(),
            },
            ChartLayer {
                path: second,
                media_type: HELM_CHART_CONTENT.to_string(),
            },
        ];
        assert_eq!(assemble_layers(&layers, &out).unwrap(), 4);
        assert_eq!(
            member_names(&out),
            vec!["demo/Chart.yaml", "demo/a", "demo/b", "demo/a"]
        );
    }
}
