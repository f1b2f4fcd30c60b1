//! Artifacts and the per-kind handler interface
//!
//! The orchestrator builds one [`Artifact`] per declared resource and version/tag, and
//! drives it through an [`ArtifactHandler`]: existence check, pull into a [`WorkArea`],
//! then push.

pub mod work_area;

pub use work_area::WorkArea;

use crate::error::Result;
use crate::registry::endpoint::RegistryFlavor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArtifactKind {
    Image,
    Chart,
    /// Accepted in config files, never transferred
    Git,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Chart => "helm",
            ArtifactKind::Git => "git",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do when the target already holds the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushMode {
    Skip,
    Push,
    Force,
    Overwrite,
}

impl PushMode {
    /// Transfer unless the target has it and we were told to skip
    pub fn should_transfer(&self, exists_on_target: bool) -> bool {
        !exists_on_target || *self != PushMode::Skip
    }
}

impl fmt::Display for PushMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PushMode::Skip => "skip",
            PushMode::Push => "push",
            PushMode::Force => "force",
            PushMode::Overwrite => "overwrite",
        };
        f.write_str(name)
    }
}

/// One resource at one version/tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub source_ref: String,
    pub target_ref: String,
    pub version: String,
    pub push_mode: PushMode,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_ref, self.version)
    }
}

/// Result of a successful push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReceipt {
    /// Content digest or repository path the target now serves
    pub reference: String,
    pub message: String,
}

/// Capability interface implemented once per artifact kind
#[async_trait]
pub trait ArtifactHandler: Send + Sync {
    fn artifact(&self) -> &Artifact;

    /// Backend flavor of the source
    async fn classify(&self) -> RegistryFlavor;

    /// Whether the target already holds this version/tag
    async fn exists_on_target(&self) -> Result<bool>;

    /// Stage the artifact under `area`, returning what `push` consumes
    async fn pull(&self, area: &WorkArea) -> Result<PathBuf>;

    async fn push(&self, staged: &Path) -> Result<PushReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_policy() {
        assert!(PushMode::Skip.should_transfer(false));
        assert!(!PushMode::Skip.should_transfer(true));
        assert!(PushMode::Force.should_transfer(true));
        assert!(PushMode::Overwrite.should_transfer(true));
    }

    #[test]
    fn push_mode_from_yaml() {
        let mode: PushMode = serde_yaml::from_str("overwrite").unwrap();
        assert_eq!(mode, PushMode::Overwrite);
    }
}
