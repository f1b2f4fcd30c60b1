//! Sync runner: load configuration, build the client, run every resource, report

use crate::cli::args::Args;
use crate::cli::config::TransportConfig;
use crate::cli::sync_config::{Credentials, CredentialsFile, SyncConfig};
use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use crate::registry::client::{RegistryClient, RegistryClientBuilder};
use crate::sync::{GateRegistry, SyncOrchestrator, SyncReport};

pub struct Runner {
    args: Args,
    transport: TransportConfig,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Result<Self> {
        args.validate()?;
        let transport = args.transport_config(TransportConfig::from_env());
        transport.validate()?;
        let output = Logger::new(transport.debug);
        Ok(Self {
            args,
            transport,
            output,
        })
    }

    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    /// Run with no push gates registered
    pub async fn run(&self) -> Result<SyncReport> {
        self.run_with_gates(GateRegistry::new()).await
    }

    pub async fn run_with_gates(&self, gates: GateRegistry) -> Result<SyncReport> {
        self.output.section("Airgap Mirror");
        self.output.info(&format!(
            "work dir: {} | arch: {} | timeout: {}s",
            self.transport.work_dir.display(),
            self.transport.architecture,
            self.transport.metadata_timeout
        ));

        let credentials = self.load_credentials()?;
        let config = self.load_config()?;
        let client = self.create_registry_client()?;

        self.output.section("Synchronizing resources");
        let report = SyncOrchestrator::new(client, credentials)
            .with_gates(gates)
            .run(&config)
            .await;

        self.output.section("Summary");
        self.output.print_lines(&report.summary());
        let elapsed = self.output.elapsed();
        if report.ok() {
            self.output.success(&format!(
                "Sync completed in {}",
                self.output.format_duration(elapsed)
            ));
        } else {
            self.output.error(&format!(
                "Sync finished with {} failure(s) in {}",
                report.failed(),
                self.output.format_duration(elapsed)
            ));
        }
        Ok(report)
    }

    fn load_credentials(&self) -> Result<Credentials> {
        self.output.subsection("Loading credentials");
        let file = match (&self.args.credentials_file, &self.args.credentials_folder) {
            (Some(path), _) => CredentialsFile::load_file(path)?,
            (None, Some(dir)) => CredentialsFile::load_folder(dir)?,
            (None, None) => {
                return Err(RegistryError::Config(
                    "no credentials source given".to_string(),
                ));
            }
        };
        self.output.step(&format!(
            "{} image and {} helm credential(s)",
            file.image.len(),
            file.helm.len()
        ));
        Ok(Credentials::from_file(file, &self.output))
    }

    fn load_config(&self) -> Result<SyncConfig> {
        self.output.subsection("Loading sync config");
        let mut config = match (&self.args.config_file, &self.args.config_folder) {
            (Some(path), _) => SyncConfig::load_file(path, &self.output)?,
            (None, Some(dir)) => SyncConfig::load_folder(dir, &self.output)?,
            (None, None) => {
                return Err(RegistryError::Config("no config source given".to_string()));
            }
        };
        config.dedup_resources(&self.output);
        if config.resources.is_empty() {
            return Err(RegistryError::Config("no resources specified".to_string()));
        }
        self.output.step(&format!("{} resource(s) to sync", config.resources.len()));
        Ok(config)
    }

    fn create_registry_client(&self) -> Result<RegistryClient> {
        RegistryClientBuilder::new(self.transport.clone())
            .with_output(self.output.clone())
            .build()
    }
}
