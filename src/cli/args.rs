//! Command-line argument parsing

use crate::cli::config::TransportConfig;
use crate::error::{RegistryError, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "airgap-mirror")]
#[command(about = "Mirror container images and Helm charts into air-gapped registries")]
#[command(version)]
pub struct Args {
    #[arg(long = "config-file", help = "Path to a YAML sync config file")]
    pub config_file: Option<PathBuf>,

    #[arg(
        long = "config-folder",
        help = "Path to a folder containing YAML sync config files"
    )]
    pub config_folder: Option<PathBuf>,

    #[arg(long = "credentials-file", help = "Path to a YAML credentials file")]
    pub credentials_file: Option<PathBuf>,

    #[arg(
        long = "credentials-folder",
        help = "Path to a folder containing YAML credential files"
    )]
    pub credentials_folder: Option<PathBuf>,

    #[arg(long = "debug", help = "Enable debug logging")]
    pub debug: bool,

    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    #[arg(
        long = "work-dir",
        help = "Root directory for staged artifacts [env: AIRGAP_WORK_DIR]"
    )]
    pub work_dir: Option<PathBuf>,

    #[arg(
        long = "arch",
        help = "Architecture picked from multi-platform images [env: AIRGAP_ARCH]"
    )]
    pub arch: Option<String>,

    #[arg(
        long = "timeout",
        short = 't',
        help = "Timeout in seconds for registry metadata calls [env: AIRGAP_TIMEOUT]"
    )]
    pub timeout: Option<u64>,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Exactly one source for credentials and one for the sync config
    pub fn validate(&self) -> Result<()> {
        if self.credentials_file.is_some() == self.credentials_folder.is_some() {
            return Err(RegistryError::Validation(
                "You must provide exactly one of --credentials-file or --credentials-folder."
                    .to_string(),
            ));
        }
        if self.config_file.is_some() == self.config_folder.is_some() {
            return Err(RegistryError::Validation(
                "You must provide exactly one of --config-file or --config-folder.".to_string(),
            ));
        }
        if self.timeout == Some(0) {
            return Err(RegistryError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Layer the flags over `base` (defaults plus environment); a given flag always wins
    pub fn transport_config(&self, mut base: TransportConfig) -> TransportConfig {
        if let Some(dir) = &self.work_dir {
            base.work_dir = dir.clone();
        }
        if let Some(arch) = &self.arch {
            base.architecture = arch.clone();
        }
        if let Some(timeout) = self.timeout {
            base.metadata_timeout = timeout;
        }
        base.skip_tls |= self.skip_tls;
        base.debug |= self.debug;
        base
    }
}
