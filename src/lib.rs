//! Airgap Mirror Library
//!
//! Mirrors container images and Helm charts from source registries into air-gapped targets
//! over the OCI distribution protocol, legacy Helm `index.yaml` repositories and raw-upload
//! artifact repositories.

pub mod artifact;
pub mod chart;
pub mod cli;
pub mod common;
pub mod digest;
pub mod error;
pub mod image;
pub mod logging;
pub mod registry;
pub mod sync;

pub use cli::config::{AuthConfig, TransportConfig};
pub use error::{RegistryError, Result};
pub use logging::Logger;
